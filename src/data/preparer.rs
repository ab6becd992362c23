// ============================================================
// Layer 4 — Pair Preparation
// ============================================================
// Turns raw corpus text into the filtered pair list and the
// frozen vocabulary used for the rest of the run:
//
//   raw (prompt, response) text
//       │  normalise both sides, split on whitespace
//       ▼
//   drop pairs with an empty side
//       │
//       ▼
//   length filter: both sides < max_length tokens
//       │
//       ▼
//   count every token into a fresh Vocabulary
//       │
//       ▼
//   trim(min_count), then keep only pairs whose every token
//   survived the trim

use crate::domain::sentence_pair::{RawPair, SentencePair};
use crate::domain::traits::Normalizer;
use crate::domain::vocabulary::Vocabulary;

/// Normalise and tokenise raw pairs, dropping any with an empty side.
pub fn normalize_pairs(raw: &[RawPair], normalizer: &dyn Normalizer) -> Vec<SentencePair> {
    raw.iter()
        .map(|(p, r)| SentencePair::from_text(&normalizer.normalize(p), &normalizer.normalize(r)))
        .filter(|pair| !pair.is_empty())
        .collect()
}

pub fn filter_pairs(pairs: Vec<SentencePair>, max_length: usize) -> Vec<SentencePair> {
    pairs.into_iter().filter(|p| p.within_length(max_length)).collect()
}

/// Trim the vocabulary and drop pairs that reference trimmed tokens.
pub fn trim_rare_words(
    vocab:     &mut Vocabulary,
    pairs:     Vec<SentencePair>,
    min_count: usize,
) -> Vec<SentencePair> {
    vocab.trim(min_count);
    let before = pairs.len();
    let kept: Vec<SentencePair> = pairs.into_iter().filter(|p| p.is_covered_by(vocab)).collect();

    tracing::info!(
        "Trimmed from {} pairs to {}, {:.4} of total",
        before,
        kept.len(),
        kept.len() as f64 / before.max(1) as f64,
    );
    kept
}

/// Full preparation pass over already-tokenised pairs.
pub fn prepare_pairs(
    pairs:      Vec<SentencePair>,
    max_length: usize,
    min_count:  usize,
) -> (Vocabulary, Vec<SentencePair>) {
    tracing::info!("Read {} sentence pairs", pairs.len());
    let pairs = filter_pairs(pairs, max_length);
    tracing::info!("Trimmed to {} sentence pairs", pairs.len());

    let mut vocab = Vocabulary::new();
    for pair in &pairs {
        vocab.add_sentence(&pair.prompt);
        vocab.add_sentence(&pair.response);
    }
    tracing::info!("Counted words: {}", vocab.num_words());

    let pairs = trim_rare_words(&mut vocab, pairs, min_count);
    (vocab, pairs)
}
