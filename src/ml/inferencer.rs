// ============================================================
// Layer 5 — Greedy Inferencer
// ============================================================
// Autoregressive decoding of a single prompt:
//
//   encode prompt [len, 1]
//   hidden ← encoder_hidden[0..decoder_layers],  input ← SOS
//   repeat max_length times:
//       probs        = decoder(input, hidden)
//       score, token = max over vocab
//       input        ← token
//
// There is no early stop at EOS; the output always has exactly
// max_length tokens and callers strip EOS / PAD themselves.
// Runs on a non-autodiff backend, so dropout is inactive.

use anyhow::Result;
use burn::{prelude::*, tensor::{Element, TensorData}};

use crate::domain::{
    error::ChatError,
    vocabulary::{Vocabulary, SOS_TOKEN},
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::Seq2Seq;

pub type InferBackend = burn::backend::Wgpu;

/// Parallel token / probability sequences of one greedy decode.
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyOutput {
    pub tokens: Vec<usize>,
    pub scores: Vec<f32>,
}

/// `input` already ends with EOS.
pub fn greedy_decode<B: Backend>(
    model:      &Seq2Seq<B>,
    input:      &[usize],
    max_length: usize,
    device:     &B::Device,
) -> Result<GreedyOutput, ChatError> {
    if max_length == 0 {
        return Ok(GreedyOutput { tokens: vec![], scores: vec![] });
    }
    let ids: Vec<i32> = input.iter().map(|&i| i as i32).collect();
    let inputs = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device).reshape([input.len(), 1]);

    let encoded     = model.encode(inputs, &[input.len()]);
    let mut hidden  = model.initial_decoder_hidden(encoded.hidden);
    let mut decoder_input = Tensor::<B, 1, Int>::full([1], SOS_TOKEN as i64, device);

    let mut all_tokens = Vec::with_capacity(max_length);
    let mut all_scores = Vec::with_capacity(max_length);

    for _ in 0..max_length {
        let (probs, next_hidden) = model.decode_step(decoder_input, hidden, encoded.outputs.clone());
        hidden = next_hidden;

        // [1, vocab] → [1, 1] each
        let (score, token) = probs.max_dim_with_indices(1);
        let token = token.reshape([1]);

        all_tokens.push(token.clone());
        all_scores.push(score.reshape([1]));
        decoder_input = token;
    }

    let tokens = host_vec::<i64>(Tensor::cat(all_tokens, 0).into_data().convert::<i64>())?
        .into_iter()
        .map(|t| t as usize)
        .collect();
    let scores = host_vec::<f32>(Tensor::cat(all_scores, 0).into_data().convert::<f32>())?;

    Ok(GreedyOutput { tokens, scores })
}

fn host_vec<E: Element>(data: TensorData) -> Result<Vec<E>, ChatError> {
    data.to_vec::<E>().map_err(|e| ChatError::TensorData(format!("{e:?}")))
}

// ─── Inferencer ───────────────────────────────────────────────────────────────
/// A trained model bundled with the vocabulary it was trained on.
pub struct Inferencer<B: Backend> {
    model:      Seq2Seq<B>,
    vocab:      Vocabulary,
    max_length: usize,
    device:     B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: Seq2Seq<B>, vocab: Vocabulary, max_length: usize, device: B::Device) -> Self {
        Self { model, vocab, max_length, device }
    }

    /// Rebuilds the model from the saved config and vocabulary, then loads
    /// `epoch` (or the latest one).
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        epoch:        Option<usize>,
        max_length:   usize,
        device:       B::Device,
    ) -> Result<Self> {
        let cfg   = ckpt_manager.load_config()?;
        let vocab = ckpt_manager.load_vocab()?;

        let model: Seq2Seq<B> = cfg.model_config(vocab.num_words()).init(&device)?;
        let epoch = match epoch {
            Some(epoch) => epoch,
            None        => ckpt_manager.latest_epoch()?,
        };
        let model = ckpt_manager.load_epoch(model, epoch, &device)?;
        tracing::info!("Model loaded from checkpoint epoch {}", epoch);

        Ok(Self::new(model, vocab, max_length, device))
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Greedy reply to an already-normalised token sequence.
    /// Fails with `UnknownToken` if any token is outside the vocabulary.
    pub fn decode_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<String>, ChatError> {
        let indices = self.vocab.indices_from_sentence(tokens)?;
        let output  = greedy_decode(&self.model, &indices, self.max_length, &self.device)?;
        tracing::debug!("decoded {:?} with scores {:?}", output.tokens, output.scores);

        Ok(output
            .tokens
            .iter()
            .filter_map(|&i| self.vocab.index_to_token(i))
            .map(str::to_string)
            .collect())
    }
}
