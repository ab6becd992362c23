// ============================================================
// Layer 5 — Encoder-Decoder Model
// ============================================================
// Bidirectional GRU encoder + Luong-attention GRU decoder:
//
//   tokens [seq, batch] → embedding → BiGRU
//       outputs = fwd + bwd                      [seq, batch, h]
//       hidden  = (layer, direction) states      [2L, batch, h]
//
//   decoder step t:
//       embed(prev token) → dropout → GRU step   → rnn_out [batch, h]
//       attention(rnn_out, outputs)              → weights [batch, seq]
//       context = weights · outputs              → [batch, h]
//       tanh(W [rnn_out ; context]) → Linear → softmax → [batch, vocab]
//
// The embedding table is shared: the encoder owns it and the
// decoder reads it through `Seq2Seq::decode_step`.
//
// Reference: Sutskever et al. (2014), Luong et al. (2015)

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

use crate::domain::error::ChatError;
use crate::ml::attention::{Attention, AttentionConfig};
use crate::ml::gru::{BiGru, BiGruConfig, Gru, GruConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally. Do not add them again or the impls conflict.
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub vocab_size: usize,
    /// "dot", "general" or "concat"
    pub attention:  String,
    #[config(default = 500)]
    pub hidden_size: usize,
    #[config(default = 2)]
    pub encoder_layers: usize,
    #[config(default = 2)]
    pub decoder_layers: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl Seq2SeqConfig {
    /// Validates everything up front so a bad config never yields a
    /// half-built model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Seq2Seq<B>, ChatError> {
        let attention = AttentionConfig::new(self.attention.clone(), self.hidden_size).init(device)?;

        if self.encoder_layers == 0 || self.decoder_layers == 0 {
            return Err(ChatError::InvalidModelConfig("layer counts must be positive".into()));
        }
        // the decoder is seeded from the first rows of the encoder's
        // (layer, direction) final states
        if self.decoder_layers > 2 * self.encoder_layers {
            return Err(ChatError::InvalidModelConfig(format!(
                "{} decoder layers cannot be seeded from {} bidirectional encoder layers",
                self.decoder_layers, self.encoder_layers,
            )));
        }

        let h = self.hidden_size;
        let encoder = EncoderRnn {
            embedding: EmbeddingConfig::new(self.vocab_size, h).init(device),
            gru: BiGruConfig::new(h, h)
                .with_n_layers(self.encoder_layers)
                .with_dropout(self.dropout)
                .init(device),
        };
        let decoder = AttnDecoderRnn {
            embedding_dropout: DropoutConfig::new(self.dropout).init(),
            gru: GruConfig::new(h, h)
                .with_n_layers(self.decoder_layers)
                .with_dropout(self.dropout)
                .init(device),
            attention,
            concat: LinearConfig::new(2 * h, h).init(device),
            out:    LinearConfig::new(h, self.vocab_size).init(device),
        };
        Ok(Seq2Seq { encoder, decoder })
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────
/// Owns the token embedding table. The decoder borrows it on every
/// step, so both forward paths accumulate into the same gradient
/// and only the encoder's optimiser updates it.
#[derive(Module, Debug)]
pub struct EncoderRnn<B: Backend> {
    pub embedding: Embedding<B>,
    pub gru:       BiGru<B>,
}

pub struct EncoderOutput<B: Backend> {
    /// [seq, batch, hidden], forward + backward, zero at padding
    pub outputs: Tensor<B, 3>,
    /// [2 · encoder_layers, batch, hidden]
    pub hidden:  Tensor<B, 3>,
}

impl<B: Backend> EncoderRnn<B> {
    /// inputs: [seq, batch] token indices, `lengths[b]` real tokens in column b.
    pub fn forward(&self, inputs: Tensor<B, 2, Int>, lengths: &[usize]) -> EncoderOutput<B> {
        let [seq, batch] = inputs.dims();
        let device = inputs.device();

        // embedding expects [batch, seq]
        let embedded = self.embedding.forward(inputs.swap_dims(0, 1)).swap_dims(0, 1);

        let mask: Vec<f32> = (0..seq)
            .flat_map(|t| lengths.iter().map(move |&len| if t < len { 1.0 } else { 0.0 }))
            .collect();
        let mask = Tensor::<B, 2>::from_data(TensorData::new(mask, [seq, batch]), &device);

        let out = self.gru.forward(embedded, mask);
        EncoderOutput { outputs: out.forward + out.backward, hidden: out.hidden }
    }
}

// ─── Decoder ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct AttnDecoderRnn<B: Backend> {
    pub embedding_dropout: Dropout,
    pub gru:               Gru<B>,
    pub attention:         Attention<B>,
    pub concat:            Linear<B>,
    pub out:               Linear<B>,
}

impl<B: Backend> AttnDecoderRnn<B> {
    pub fn n_layers(&self) -> usize {
        self.gru.n_layers()
    }

    /// One output position.
    ///
    /// input: [batch] previous tokens, hidden: [layers, batch, h],
    /// encoder_outputs: [seq, batch, h]
    /// → (next-token distribution [batch, vocab], new hidden)
    pub fn forward(
        &self,
        embedding:       &Embedding<B>,
        input:           Tensor<B, 1, Int>,
        hidden:          Tensor<B, 3>,
        encoder_outputs: Tensor<B, 3>,
    ) -> (Tensor<B, 2>, Tensor<B, 3>) {
        let [batch] = input.dims();
        let [_, _, h] = encoder_outputs.dims();

        let embedded = embedding.forward(input.reshape([batch, 1])).reshape([batch, h]);
        let embedded = self.embedding_dropout.forward(embedded);

        let (rnn_output, hidden) = self.gru.step(embedded, hidden);

        // [batch, 1, seq] x [batch, seq, h] → [batch, 1, h]
        let weights = self.attention.forward(rnn_output.clone(), encoder_outputs.clone());
        let context = weights
            .unsqueeze_dim::<3>(1)
            .matmul(encoder_outputs.swap_dims(0, 1))
            .reshape([batch, h]);

        let concat_output = self
            .concat
            .forward(Tensor::cat(vec![rnn_output, context], 1))
            .tanh();
        let probs = softmax(self.out.forward(concat_output), 1);

        (probs, hidden)
    }
}

// ─── Seq2Seq ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Seq2Seq<B: Backend> {
    pub encoder: EncoderRnn<B>,
    pub decoder: AttnDecoderRnn<B>,
}

impl<B: Backend> Seq2Seq<B> {
    pub fn encode(&self, inputs: Tensor<B, 2, Int>, lengths: &[usize]) -> EncoderOutput<B> {
        self.encoder.forward(inputs, lengths)
    }

    /// First `decoder_layers` rows of the encoder's final states.
    pub fn initial_decoder_hidden(&self, encoder_hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, batch, h] = encoder_hidden.dims();
        encoder_hidden.slice([0..self.decoder.n_layers(), 0..batch, 0..h])
    }

    /// Decoder step reading the encoder's embedding table.
    pub fn decode_step(
        &self,
        input:           Tensor<B, 1, Int>,
        hidden:          Tensor<B, 3>,
        encoder_outputs: Tensor<B, 3>,
    ) -> (Tensor<B, 2>, Tensor<B, 3>) {
        self.decoder.forward(&self.encoder.embedding, input, hidden, encoder_outputs)
    }
}
