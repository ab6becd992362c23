use burn::data::dataset::Dataset;

use crate::domain::sentence_pair::SentencePair;
use crate::domain::vocabulary::Vocabulary;

/// The prepared corpus: filtered pairs plus the frozen vocabulary
/// every batch is indexed against.
pub struct PairDataset {
    pairs: Vec<SentencePair>,
    vocab: Vocabulary,
}

impl PairDataset {
    pub fn new(pairs: Vec<SentencePair>, vocab: Vocabulary) -> Self {
        Self { pairs, vocab }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn pairs(&self) -> &[SentencePair] {
        &self.pairs
    }
}

impl Dataset<SentencePair> for PairDataset {
    fn get(&self, index: usize) -> Option<SentencePair> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}
