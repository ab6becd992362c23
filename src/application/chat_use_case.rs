// ============================================================
// Layer 2 — Chat Use Case
// ============================================================
// Answers one line at a time with a trained checkpoint:
//
//   line → normaliser → whitespace tokens → greedy decode
//        → drop EOS / PAD → join with spaces
//
// The interactive loop keeps going after an unknown word; any
// other failure ends the session.

use std::io::{BufRead, Write};

use anyhow::Result;
use burn::prelude::Backend;

use crate::domain::{
    error::ChatError,
    sentence_pair::tokenize,
    traits::{Normalizer, Responder},
    vocabulary::{EOS_TOKEN, PAD_TOKEN},
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{InferBackend, Inferencer};

const PROMPT: &str = "> ";
const UNKNOWN_WORD_REPLY: &str = "Error: Encountered unknown word.";

pub struct ChatUseCase<B: Backend = InferBackend> {
    normalizer: Box<dyn Normalizer>,
    inferencer: Inferencer<B>,
}

impl ChatUseCase<InferBackend> {
    /// Loads config, vocabulary and weights from `checkpoint_dir`.
    pub fn from_checkpoint(
        checkpoint_dir: &std::path::Path,
        epoch:          Option<usize>,
        max_length:     usize,
    ) -> Result<Self> {
        let ckpt   = CheckpointManager::new(checkpoint_dir)?;
        let cfg    = ckpt.load_config()?;
        let device = burn::backend::wgpu::WgpuDevice::default();

        let inferencer = Inferencer::from_checkpoint(&ckpt, epoch, max_length, device)?;
        Ok(Self::new(cfg.normalizer.build()?, inferencer))
    }
}

impl<B: Backend> ChatUseCase<B> {
    pub fn new(normalizer: Box<dyn Normalizer>, inferencer: Inferencer<B>) -> Self {
        Self { normalizer, inferencer }
    }

    /// Reads lines until `q`, `quit` or end of input.
    pub fn run_interactive<R: BufRead, W: Write>(&self, input: R, output: &mut W) -> Result<()> {
        let mut lines = input.lines();
        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;

            let Some(line) = lines.next() else { break };
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line == "q" || line == "quit" {
                break;
            }

            match self.respond(line) {
                Ok(reply) => writeln!(output, "Bot: {reply}")?,
                Err(e) if matches!(e.downcast_ref::<ChatError>(), Some(ChatError::UnknownToken(_))) => {
                    tracing::debug!("{e}");
                    writeln!(output, "{UNKNOWN_WORD_REPLY}")?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<B: Backend> Responder for ChatUseCase<B> {
    fn respond(&self, line: &str) -> Result<String> {
        let tokens = tokenize(&self.normalizer.normalize(line));
        let words  = self.inferencer.decode_tokens(&tokens)?;

        let vocab = self.inferencer.vocab();
        let eos = vocab.index_to_token(EOS_TOKEN);
        let pad = vocab.index_to_token(PAD_TOKEN);

        Ok(words
            .into_iter()
            .filter(|w| Some(w.as_str()) != eos && Some(w.as_str()) != pad)
            .collect::<Vec<_>>()
            .join(" "))
    }
}
