// ============================================================
// Layer 4 — Epoch Iterator
// ============================================================
// One shuffled pass over the corpus, yielding batches lazily.
//
//   indices = [0, 1, ..., N-1]  → Fisher-Yates shuffle (optional)
//   batch i = pairs[indices[i*B .. (i+1)*B]]  → make_training_batch
//
// The last batch may be short. An iterator is spent after one
// pass; the next epoch builds a new one (and reshuffles).
//
// The RNG is passed in by the caller so shuffles are
// reproducible from a seed.
//
// Reference: rand crate documentation (SliceRandom)

use burn::data::dataset::Dataset;
use rand::{seq::SliceRandom, Rng};

use crate::data::batcher::{make_training_batch, TrainingBatch};
use crate::data::dataset::PairDataset;
use crate::domain::error::ChatError;

pub struct EpochIterator<'a> {
    dataset:    &'a PairDataset,
    indices:    Vec<usize>,
    batch_size: usize,
    next_batch: usize,
}

impl<'a> EpochIterator<'a> {
    /// Fails with `InvalidModelConfig` when `batch_size` is zero.
    pub fn new<R: Rng + ?Sized>(
        dataset:    &'a PairDataset,
        batch_size: usize,
        shuffle:    bool,
        rng:        &mut R,
    ) -> Result<Self, ChatError> {
        if batch_size == 0 {
            return Err(ChatError::InvalidModelConfig("batch_size must be positive".into()));
        }
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        if shuffle {
            indices.shuffle(rng);
        }
        Ok(Self { dataset, indices, batch_size, next_batch: 0 })
    }

    /// ceil(corpus size / batch size)
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }
}

impl Iterator for EpochIterator<'_> {
    type Item = Result<TrainingBatch, ChatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_batch >= self.num_batches() {
            return None;
        }
        let start = self.next_batch * self.batch_size;
        let end   = (start + self.batch_size).min(self.indices.len());
        self.next_batch += 1;

        let pairs = self.indices[start..end]
            .iter()
            .filter_map(|&i| self.dataset.get(i))
            .collect();
        Some(make_training_batch(self.dataset.vocab(), pairs))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_batches() - self.next_batch;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EpochIterator<'_> {}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preparer::prepare_pairs;
    use crate::domain::sentence_pair::SentencePair;
    use rand::{rngs::StdRng, SeedableRng};

    fn dataset(n: usize) -> PairDataset {
        let pairs = (0..n)
            .map(|i| SentencePair::from_text(&format!("p{i}"), &format!("r{i}")))
            .collect();
        let (vocab, pairs) = prepare_pairs(pairs, 10, 1);
        PairDataset::new(pairs, vocab)
    }

    #[test]
    fn test_batch_count_rounds_up() {
        let ds   = dataset(10);
        let mut rng = StdRng::seed_from_u64(0);
        let iter = EpochIterator::new(&ds, 4, true, &mut rng).unwrap();
        assert_eq!(iter.num_batches(), 3);
        assert_eq!(iter.len(), 3);

        let sizes: Vec<usize> = iter.map(|b| b.unwrap().batch_size()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_every_pair_seen_once() {
        let ds = dataset(7);
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen: Vec<usize> = EpochIterator::new(&ds, 3, true, &mut rng)
            .unwrap()
            .flat_map(|b| b.unwrap().inputs.row(0).to_vec())
            .collect();
        seen.sort();
        // every prompt token index 3, 5, 7, ... (p_i, r_i interleaved)
        let expected: Vec<usize> = (0..7).map(|i| 3 + 2 * i).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_unshuffled_keeps_corpus_order() {
        let ds = dataset(5);
        let mut rng = StdRng::seed_from_u64(0);
        let first = EpochIterator::new(&ds, 2, false, &mut rng).unwrap().next().unwrap().unwrap();
        assert_eq!(first.inputs.row(0), &[3, 5]);
    }

    #[test]
    fn test_same_seed_same_order() {
        let ds = dataset(20);
        let order = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            EpochIterator::new(&ds, 5, true, &mut rng)
                .unwrap()
                .map(|b| b.unwrap().inputs.row(0).to_vec())
                .collect::<Vec<_>>()
        };
        assert_eq!(order(11), order(11));
    }

    #[test]
    fn test_exhausted_after_one_pass() {
        let ds = dataset(3);
        let mut rng = StdRng::seed_from_u64(0);
        let mut iter = EpochIterator::new(&ds, 2, true, &mut rng).unwrap();
        assert!(iter.next().is_some());
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_empty_corpus_has_no_batches() {
        let ds = PairDataset::new(vec![], Default::default());
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(EpochIterator::new(&ds, 8, true, &mut rng).unwrap().count(), 0);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let ds = dataset(3);
        let mut rng = StdRng::seed_from_u64(0);
        let result = EpochIterator::new(&ds, 0, true, &mut rng);
        assert!(matches!(result, Err(ChatError::InvalidModelConfig(_))));
    }
}
