// ============================================================
// Layer 3 — Sentence Pairs
// ============================================================
// A dialogue turn as the core sees it: an ordered (prompt,
// response) pair, each side already normalised and split on
// whitespace.
//
// Example:
//   RawPair:      ("How are you?", "Fine, thanks.")
//   SentencePair: (["how", "are", "you", "?"], ["fine", "thanks", "."])

use serde::{Deserialize, Serialize};

use crate::domain::vocabulary::Vocabulary;

/// Un-tokenised (prompt, response) text as produced by a corpus loader.
pub type RawPair = (String, String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    pub prompt:   Vec<String>,
    pub response: Vec<String>,
}

impl SentencePair {
    pub fn new(prompt: Vec<String>, response: Vec<String>) -> Self {
        Self { prompt, response }
    }

    /// Split both sides on whitespace.
    pub fn from_text(prompt: &str, response: &str) -> Self {
        Self {
            prompt:   tokenize(prompt),
            response: tokenize(response),
        }
    }

    /// Both sides hold strictly fewer than `max_length` tokens.
    pub fn within_length(&self, max_length: usize) -> bool {
        self.prompt.len() < max_length && self.response.len() < max_length
    }

    /// Every token of both sides has an index in `vocab`.
    pub fn is_covered_by(&self, vocab: &Vocabulary) -> bool {
        self.prompt.iter().chain(&self.response).all(|t| vocab.contains(t))
    }

    pub fn is_empty(&self) -> bool {
        self.prompt.is_empty() || self.response.is_empty()
    }
}

/// Whitespace tokenisation applied after normalisation.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
