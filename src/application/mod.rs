// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Coordinates the other layers for one goal each:
//
//   train_use_case.rs — corpora → prepared pairs → training loop
//   chat_use_case.rs  — checkpoint → interactive greedy replies
//
// No model math and no argument parsing here; printing is
// limited to the chat transcript written to the given output.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow
pub mod train_use_case;

// The interactive chat workflow
pub mod chat_use_case;
