// ============================================================
// Layer 4 — Text Normalisers
// ============================================================
// Raw corpus sentences and live chat input go through one of
// these before whitespace tokenisation.
//
// LatinNormalizer (movie dialogue, ConvAI2):
//   1. lowercase + trim
//   2. NFD decomposition, then drop combining marks ("é" → "e")
//   3. detach sentence punctuation: "hi!" → "hi !"
//   4. anything outside [a-zA-Z.!?] becomes a space
//   5. collapse runs of whitespace
//
// CjkNormalizer (NUCC transcripts):
//   1. NFKC (full-width digits/letters → ASCII)
//   2. every Han / hiragana / hangul character is its own token
//   3. katakana runs and ASCII alphanumeric runs stay together
//   4. remaining symbols are single-character tokens
//
// The Unicode work is delegated to the normalisers shipped in the
// `tokenizers` crate.
//
// Reference: Unicode Standard Annex #15 (Normalization Forms)

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokenizers::normalizers::StripAccents;
use tokenizers::{NormalizedString, Normalizer as _};

use crate::domain::traits::Normalizer;

// ─── NormalizerKind ───────────────────────────────────────────────────────────
/// Which normaliser a trained model expects. Persisted in the
/// training config so chat input is treated like the corpus was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizerKind {
    Latin,
    Cjk,
}

impl NormalizerKind {
    pub fn build(self) -> Result<Box<dyn Normalizer>> {
        Ok(match self {
            NormalizerKind::Latin => Box::new(LatinNormalizer::new()?),
            NormalizerKind::Cjk   => Box::new(CjkNormalizer),
        })
    }
}

// ─── LatinNormalizer ──────────────────────────────────────────────────────────
pub struct LatinNormalizer {
    punctuation: Regex,
    non_letters: Regex,
    whitespace:  Regex,
}

impl LatinNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            punctuation: Regex::new(r"([.!?])").context("punctuation pattern")?,
            non_letters: Regex::new(r"[^a-zA-Z.!?]+").context("letter pattern")?,
            whitespace:  Regex::new(r"\s+").context("whitespace pattern")?,
        })
    }
}

impl Normalizer for LatinNormalizer {
    fn normalize(&self, text: &str) -> String {
        let lowered = text.trim().to_lowercase();
        let ascii   = strip_accents(&lowered);

        let spaced  = self.punctuation.replace_all(&ascii, " $1");
        let letters = self.non_letters.replace_all(&spaced, " ");
        self.whitespace.replace_all(&letters, " ").trim().to_string()
    }
}

/// NFD-decompose and remove combining marks.
fn strip_accents(text: &str) -> String {
    let mut normalized = NormalizedString::from(text);
    normalized.nfd();
    if let Err(e) = StripAccents.normalize(&mut normalized) {
        tracing::warn!("Accent stripping failed, keeping decomposed text: {e}");
    }
    normalized.get().to_string()
}

// ─── CjkNormalizer ────────────────────────────────────────────────────────────
pub struct CjkNormalizer;

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Space,
    Word,
    Katakana,
    Single,
}

fn classify(c: char) -> CharClass {
    match c {
        c if c.is_whitespace() => CharClass::Space,
        c if c.is_ascii_alphanumeric() => CharClass::Word,
        // katakana block + prolonged sound mark
        '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' => CharClass::Katakana,
        _ => CharClass::Single,
    }
}

impl Normalizer for CjkNormalizer {
    fn normalize(&self, text: &str) -> String {
        let mut normalized = NormalizedString::from(text.trim());
        normalized.nfkc();
        normalized.lowercase();

        let mut tokens: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_class = CharClass::Space;

        for c in normalized.get().chars() {
            let class = classify(c);
            let joins = class == current_class
                && matches!(class, CharClass::Word | CharClass::Katakana);
            if !joins && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            if class != CharClass::Space {
                current.push(c);
            }
            current_class = class;
        }
        if !current.is_empty() {
            tokens.push(current);
        }

        tokens.join(" ")
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_lowercases_and_detaches_punctuation() {
        let n = LatinNormalizer::new().unwrap();
        assert_eq!(n.normalize("  Hello, World!  "), "hello world !");
    }

    #[test]
    fn test_latin_strips_accents() {
        let n = LatinNormalizer::new().unwrap();
        assert_eq!(n.normalize("Café déjà vu"), "cafe deja vu");
    }

    #[test]
    fn test_latin_drops_digits_and_symbols() {
        let n = LatinNormalizer::new().unwrap();
        assert_eq!(n.normalize("I'm 42 years old?"), "i m years old ?");
    }

    #[test]
    fn test_cjk_splits_characters() {
        let n = CjkNormalizer;
        assert_eq!(n.normalize("今日は"), "今 日 は");
    }

    #[test]
    fn test_cjk_keeps_katakana_and_ascii_runs() {
        let n = CjkNormalizer;
        assert_eq!(n.normalize("コーヒーとtea２杯"), "コーヒー と tea2 杯");
    }

    #[test]
    fn test_cjk_punctuation_is_a_token() {
        let n = CjkNormalizer;
        assert_eq!(n.normalize("はい。"), "は い 。");
    }
}
