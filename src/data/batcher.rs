// ============================================================
// Layer 4 — Batch Builder
// ============================================================
// Converts a list of sentence pairs into padded, masked,
// length-sorted matrices, then into Burn tensors.
//
// Layout is sequence-major: row = position, column = pair.
//
//   prompts (sorted by length, EOS appended):
//     "a b c d" → [4, 5, 6, 7, EOS]
//     "e f"     → [8, 9, EOS]
//
//   input matrix [5 × 2]      lengths
//     4   8                   [5, 3]
//     5   9
//     6   EOS
//     7   PAD
//     EOS PAD
//
// The target matrix is padded the same way and comes with a
// same-shaped mask that is false exactly at PAD positions.
//
// The host-side half (TrainingBatch) has no Burn types so it can
// be checked without a device; Seq2SeqBatcher moves it onto one.
//
// Reference: Burn Book §4 (Batcher)

use burn::{prelude::*, tensor::TensorData};

use crate::domain::error::ChatError;
use crate::domain::sentence_pair::SentencePair;
use crate::domain::vocabulary::{Vocabulary, PAD_TOKEN};

// ─── PaddedMatrix ─────────────────────────────────────────────────────────────
/// Row-major [seq_len × batch_size] matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedMatrix<T> {
    values:     Vec<T>,
    seq_len:    usize,
    batch_size: usize,
}

impl<T: Copy> PaddedMatrix<T> {
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn get(&self, position: usize, column: usize) -> T {
        self.values[position * self.batch_size + column]
    }

    pub fn row(&self, position: usize) -> &[T] {
        &self.values[position * self.batch_size..(position + 1) * self.batch_size]
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    fn map<U>(&self, f: impl Fn(T) -> U) -> PaddedMatrix<U> {
        PaddedMatrix {
            values:     self.values.iter().map(|&v| f(v)).collect(),
            seq_len:    self.seq_len,
            batch_size: self.batch_size,
        }
    }
}

/// Right-pad every sequence with PAD to the longest one and transpose
/// into sequence-major order.
fn zero_padding(sequences: &[Vec<usize>]) -> PaddedMatrix<usize> {
    let seq_len    = sequences.iter().map(Vec::len).max().unwrap_or(0);
    let batch_size = sequences.len();

    let mut values = vec![PAD_TOKEN; seq_len * batch_size];
    for (column, seq) in sequences.iter().enumerate() {
        for (position, &index) in seq.iter().enumerate() {
            values[position * batch_size + column] = index;
        }
    }
    PaddedMatrix { values, seq_len, batch_size }
}

/// true wherever the padded matrix holds a real token.
fn binary_matrix(padded: &PaddedMatrix<usize>) -> PaddedMatrix<bool> {
    padded.map(|index| index != PAD_TOKEN)
}

// ─── Host-side builders ───────────────────────────────────────────────────────
/// Index every sentence (EOS appended) and pad.
/// Returns the padded matrix and the pre-pad lengths.
pub fn build_input_tensor(
    sentences: &[&[String]],
    vocab:     &Vocabulary,
) -> Result<(PaddedMatrix<usize>, Vec<usize>), ChatError> {
    let indexed = sentences
        .iter()
        .map(|s| vocab.indices_from_sentence(s))
        .collect::<Result<Vec<_>, _>>()?;
    let lengths = indexed.iter().map(Vec::len).collect();
    Ok((zero_padding(&indexed), lengths))
}

/// Index every sentence (EOS appended) and pad.
/// Returns the padded matrix, its PAD mask and the longest length.
pub fn build_target_tensor(
    sentences: &[&[String]],
    vocab:     &Vocabulary,
) -> Result<(PaddedMatrix<usize>, PaddedMatrix<bool>, usize), ChatError> {
    let indexed = sentences
        .iter()
        .map(|s| vocab.indices_from_sentence(s))
        .collect::<Result<Vec<_>, _>>()?;
    let max_target_len = indexed.iter().map(Vec::len).max().unwrap_or(0);
    let padded = zero_padding(&indexed);
    let mask   = binary_matrix(&padded);
    Ok((padded, mask, max_target_len))
}

/// Everything one training step needs, still on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingBatch {
    pub inputs:         PaddedMatrix<usize>,
    pub lengths:        Vec<usize>,
    pub targets:        PaddedMatrix<usize>,
    pub mask:           PaddedMatrix<bool>,
    pub max_target_len: usize,
}

impl TrainingBatch {
    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// Number of real (non-PAD) target tokens at each decode step.
    pub fn unmasked_counts(&self) -> Vec<usize> {
        (0..self.mask.seq_len())
            .map(|step| self.mask.row(step).iter().filter(|&&m| m).count())
            .collect()
    }
}

/// Sort pairs by prompt length (longest first, ties keep input order),
/// then build input and target matrices.
pub fn make_training_batch(
    vocab: &Vocabulary,
    mut pairs: Vec<SentencePair>,
) -> Result<TrainingBatch, ChatError> {
    if pairs.is_empty() {
        return Err(ChatError::EmptyBatch);
    }
    // sort_by is stable
    pairs.sort_by(|a, b| b.prompt.len().cmp(&a.prompt.len()));

    let prompts:   Vec<&[String]> = pairs.iter().map(|p| p.prompt.as_slice()).collect();
    let responses: Vec<&[String]> = pairs.iter().map(|p| p.response.as_slice()).collect();

    let (inputs, lengths)                = build_input_tensor(&prompts, vocab)?;
    let (targets, mask, max_target_len) = build_target_tensor(&responses, vocab)?;

    Ok(TrainingBatch { inputs, lengths, targets, mask, max_target_len })
}

// ─── Seq2SeqBatch ─────────────────────────────────────────────────────────────
/// A TrainingBatch on a Burn device.
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// [max_input_len, batch] token indices
    pub inputs: Tensor<B, 2, Int>,
    /// True prompt lengths (EOS included), longest first
    pub lengths: Vec<usize>,
    /// [max_target_len, batch] token indices
    pub targets: Tensor<B, 2, Int>,
    /// [max_target_len, batch] — false at PAD positions
    pub mask: Tensor<B, 2, Bool>,
    /// Unmasked tokens per decode step
    pub step_counts: Vec<usize>,
    pub max_target_len: usize,
}

#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn batch(&self, batch: &TrainingBatch) -> Seq2SeqBatch<B> {
        let inputs  = index_tensor(&batch.inputs, &self.device);
        let targets = index_tensor(&batch.targets, &self.device);
        let mask    = Tensor::<B, 2, Bool>::from_data(
            TensorData::new(batch.mask.values().to_vec(), [batch.mask.seq_len(), batch.mask.batch_size()]),
            &self.device,
        );

        Seq2SeqBatch {
            inputs,
            lengths:        batch.lengths.clone(),
            targets,
            mask,
            step_counts:    batch.unmasked_counts(),
            max_target_len: batch.max_target_len,
        }
    }
}

/// Sequence-major index matrix → Int tensor [seq_len, batch].
pub fn index_tensor<B: Backend>(matrix: &PaddedMatrix<usize>, device: &B::Device) -> Tensor<B, 2, Int> {
    let flat: Vec<i32> = matrix.values().iter().map(|&x| x as i32).collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device)
        .reshape([matrix.seq_len(), matrix.batch_size()])
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn vocab_for(pairs: &[SentencePair]) -> Vocabulary {
        let mut v = Vocabulary::new();
        for p in pairs {
            v.add_sentence(&p.prompt);
            v.add_sentence(&p.response);
        }
        v
    }

    fn pair(p: &str, r: &str) -> SentencePair {
        SentencePair::from_text(p, r)
    }

    #[test]
    fn test_input_padding_and_lengths() {
        // Token counts 4, 2, 1 → EOS-inclusive lengths 5, 3, 2
        let pairs = vec![pair("a b c d", "x"), pair("e f", "y"), pair("g", "z")];
        let vocab = vocab_for(&pairs);
        let prompts: Vec<&[String]> = pairs.iter().map(|p| p.prompt.as_slice()).collect();

        let (matrix, lengths) = build_input_tensor(&prompts, &vocab).unwrap();
        assert_eq!(lengths, vec![5, 3, 2]);
        assert_eq!(matrix.seq_len(), 5);
        assert_eq!(matrix.batch_size(), 3);
        assert_eq!(matrix.get(2, 1), crate::domain::vocabulary::EOS_TOKEN);
        for pos in 2..5 {
            assert_eq!(matrix.get(pos, 2), PAD_TOKEN);
        }
    }

    #[test]
    fn test_target_mask_false_at_padding() {
        let pairs = vec![pair("q", "a b c d"), pair("q", "e f"), pair("q", "g")];
        let vocab = vocab_for(&pairs);
        let responses: Vec<&[String]> = pairs.iter().map(|p| p.response.as_slice()).collect();

        let (targets, mask, max_len) = build_target_tensor(&responses, &vocab).unwrap();
        assert_eq!(max_len, 5);
        assert_eq!(targets.seq_len(), 5);
        // the 2-long sentence is unmasked at 0..2 only
        assert!(mask.get(0, 2) && mask.get(1, 2));
        for pos in 2..5 {
            assert!(!mask.get(pos, 2));
        }
        assert!((0..5).all(|pos| mask.get(pos, 0)));
    }

    #[test]
    fn test_batch_sorted_descending_and_stable() {
        let pairs = vec![
            pair("one", "r1"),
            pair("two words", "r2"),
            pair("uno", "r3"),
            pair("three words here", "r4"),
        ];
        let vocab = vocab_for(&pairs);
        let batch = make_training_batch(&vocab, pairs).unwrap();

        assert_eq!(batch.lengths, vec![4, 3, 2, 2]);
        // ties ("one", "uno") keep their input order → r1 before r3
        let r1 = vocab.token_to_index("r1").unwrap();
        let r3 = vocab.token_to_index("r3").unwrap();
        assert_eq!(batch.targets.row(0), &[vocab.token_to_index("r4").unwrap(), vocab.token_to_index("r2").unwrap(), r1, r3]);
    }

    #[test]
    fn test_unmasked_counts_per_step() {
        let pairs = vec![pair("q", "a b"), pair("q", "c")];
        let vocab = vocab_for(&pairs);
        let batch = make_training_batch(&vocab, pairs).unwrap();
        // step 0: both, step 1: first + EOS of second, step 2: EOS of first
        assert_eq!(batch.unmasked_counts(), vec![2, 2, 1]);
        assert_eq!(batch.max_target_len, 3);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let vocab = Vocabulary::new();
        assert!(matches!(make_training_batch(&vocab, vec![]), Err(ChatError::EmptyBatch)));
    }

    #[test]
    fn test_unknown_token_propagates() {
        let vocab = vocab_for(&[pair("a", "b")]);
        let result = make_training_batch(&vocab, vec![pair("a", "nope")]);
        assert!(matches!(result, Err(ChatError::UnknownToken(t)) if t == "nope"));
    }

    #[test]
    fn test_tensor_batch_shapes() {
        let pairs = vec![pair("a b c", "x y"), pair("d", "z")];
        let vocab = vocab_for(&pairs);
        let batch = make_training_batch(&vocab, pairs).unwrap();

        let device  = Default::default();
        let batcher = Seq2SeqBatcher::<NdArray>::new(device);
        let tensors = batcher.batch(&batch);

        assert_eq!(tensors.inputs.dims(), [4, 2]);
        assert_eq!(tensors.targets.dims(), [3, 2]);
        assert_eq!(tensors.mask.dims(), [3, 2]);
        assert_eq!(tensors.step_counts, vec![2, 2, 1]);
        let mask: Vec<bool> = tensors.mask.into_data().to_vec::<bool>().unwrap();
        assert_eq!(mask, vec![true, true, true, true, true, false]);
    }
}
