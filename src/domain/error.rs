// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Typed failure conditions that callers need to tell apart.
// Everything else travels as anyhow::Error with context.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// A token has no index in the (frozen) vocabulary.
    /// Expected at chat time for unseen input; recoverable.
    #[error("unknown token: {0:?}")]
    UnknownToken(String),

    #[error("{0:?} is not an appropriate attention method (expected dot, general or concat)")]
    InvalidAttentionMethod(String),

    #[error("invalid model configuration: {0}")]
    InvalidModelConfig(String),

    /// Every position of a target step is padding; the masked mean is undefined.
    #[error("decode step {step} has no unmasked positions")]
    EmptyMaskStep { step: usize },

    #[error("cannot build a batch from zero sentence pairs")]
    EmptyBatch,

    /// Tensor contents could not be read back as the expected element type.
    #[error("cannot read tensor data: {0}")]
    TensorData(String),

    #[error("corpus unavailable at '{}': {reason}", path.display())]
    CorpusUnavailable { path: PathBuf, reason: String },
}

impl ChatError {
    pub fn corpus_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CorpusUnavailable { path: path.into(), reason: reason.to_string() }
    }
}
