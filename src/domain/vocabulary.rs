// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Bidirectional mapping between tokens and dense indices.
//
// Index layout:
//   0 → PAD   (right-padding inside a batch)
//   1 → SOS   (first decoder input)
//   2 → EOS   (appended to every indexed sentence)
//   3.. → corpus tokens in first-seen order
//
// Lifecycle:
//   1. add_sentence() over every prepared pair (counts grow)
//   2. trim(min_count) exactly once (indices are reassigned)
//   3. frozen: only lookups from here on
//
// The reserved names are NOT entries of the token map, so a
// corpus token spelled "PAD" gets an ordinary index of its own.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::ChatError;

pub const PAD_TOKEN: usize = 0;
pub const SOS_TOKEN: usize = 1;
pub const EOS_TOKEN: usize = 2;

const RESERVED: [&str; 3] = ["PAD", "SOS", "EOS"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    token_to_index: HashMap<String, usize>,
    token_counts:   HashMap<String, usize>,
    /// Position == index. The first three slots hold the reserved names.
    index_to_token: Vec<String>,
    trimmed:        bool,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self {
            token_to_index: HashMap::new(),
            token_counts:   HashMap::new(),
            index_to_token: RESERVED.iter().map(|s| s.to_string()).collect(),
            trimmed:        false,
        }
    }

    /// Number of assigned indices, reserved ones included.
    pub fn num_words(&self) -> usize {
        self.index_to_token.len()
    }

    pub fn is_trimmed(&self) -> bool {
        self.trimmed
    }

    /// Count one occurrence of `token`, assigning the next index if unseen.
    pub fn add_token(&mut self, token: &str) {
        if let Some(count) = self.token_counts.get_mut(token) {
            *count += 1;
            return;
        }
        let index = self.index_to_token.len();
        self.token_to_index.insert(token.to_string(), index);
        self.token_counts.insert(token.to_string(), 1);
        self.index_to_token.push(token.to_string());
    }

    pub fn add_sentence<S: AsRef<str>>(&mut self, tokens: &[S]) {
        for token in tokens {
            self.add_token(token.as_ref());
        }
    }

    /// Drop every token seen fewer than `min_count` times and rebuild the
    /// index from scratch, keeping survivors in their original order.
    ///
    /// One-shot: a second call returns immediately without touching state.
    /// Survivors restart with a count of 1, as if added once.
    pub fn trim(&mut self, min_count: usize) {
        if self.trimmed {
            return;
        }
        self.trimmed = true;

        let before = self.token_to_index.len();
        let keep: Vec<String> = self.index_to_token[RESERVED.len()..]
            .iter()
            .filter(|t| self.token_counts.get(*t).copied().unwrap_or(0) >= min_count)
            .cloned()
            .collect();

        tracing::info!(
            "keep_words {} / {} = {:.4}",
            keep.len(),
            before,
            keep.len() as f64 / before.max(1) as f64,
        );

        self.token_to_index.clear();
        self.token_counts.clear();
        self.index_to_token.truncate(RESERVED.len());
        for token in &keep {
            self.add_token(token);
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_index.contains_key(token)
    }

    /// Occurrence count of a corpus token (0 when absent).
    pub fn count(&self, token: &str) -> usize {
        self.token_counts.get(token).copied().unwrap_or(0)
    }

    pub fn token_to_index(&self, token: &str) -> Result<usize, ChatError> {
        self.token_to_index
            .get(token)
            .copied()
            .ok_or_else(|| ChatError::UnknownToken(token.to_string()))
    }

    pub fn index_to_token(&self, index: usize) -> Option<&str> {
        self.index_to_token.get(index).map(String::as_str)
    }

    /// Map every token to its index and append EOS.
    pub fn indices_from_sentence<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<usize>, ChatError> {
        let mut indices = tokens
            .iter()
            .map(|t| self.token_to_index(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        indices.push(EOS_TOKEN);
        Ok(indices)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}
