// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Seams between the core and its collaborators:
//   - PairSource  → a corpus that yields raw dialogue pairs
//   - Normalizer  → text clean-up before whitespace tokenisation
//   - Responder   → anything that answers a chat line
//
// The application layer only talks to these traits, so a new
// corpus format or language is one more impl, nothing else.

use anyhow::Result;

use crate::domain::sentence_pair::RawPair;

// ─── PairSource ───────────────────────────────────────────────────────────────
/// Any corpus that can produce (prompt, response) text pairs.
///
/// Implementations:
///   - CornellLoader → movie dialogue line/conversation files
///   - ConvAi2Loader → crowd-sourced JSON dialogue logs
///   - NuccLoader    → transcribed Japanese conversations
pub trait PairSource {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Load every pair, in corpus order. A missing or unreadable
    /// source is an error, never an empty corpus.
    fn load_pairs(&self) -> Result<Vec<RawPair>>;
}

// ─── Normalizer ───────────────────────────────────────────────────────────────
/// Turns a raw sentence into space-separated tokens.
/// The same normaliser must be used for training data and live input.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

// ─── Responder ────────────────────────────────────────────────────────────────
pub trait Responder {
    /// Reply to one line of user input.
    fn respond(&self, line: &str) -> Result<String>;
}
