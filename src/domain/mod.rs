// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types that define the core concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Typed errors callers can match on
pub mod error;

// Prompt/response token sequences
pub mod sentence_pair;

// Core abstractions (traits) that other layers implement
pub mod traits;

// Token <-> index mapping with frequency trimming
pub mod vocabulary;
