// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load raw pairs from every corpus    (Layer 4 - data)
//   Step 2: Normalise with the corpus' normaliser (Layer 4 - data)
//   Step 3: Length filter, vocabulary, trim     (Layer 4 - data)
//   Step 4: Build the Burn dataset              (Layer 4 - data)
//   Step 5: Save config + vocabulary            (Layer 6 - infra)
//   Step 6: Run training loop                   (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::PairDataset,
    loader::CorpusSource,
    normalizer::NormalizerKind,
    preparer::{normalize_pairs, prepare_pairs},
};
use crate::domain::sentence_pair::SentencePair;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    model::Seq2SeqConfig,
    trainer::{run_training, TrainSummary},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved next to the checkpoints so chat can rebuild the same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub corpora:                Vec<CorpusSource>,
    /// Normaliser applied to chat input
    pub normalizer:             NormalizerKind,
    pub checkpoint_dir:         PathBuf,
    pub max_length:             usize,
    pub min_count:              usize,
    pub batch_size:             usize,
    pub epochs:                 usize,
    pub learning_rate:          f64,
    pub decoder_learning_ratio: f64,
    pub teacher_forcing_ratio:  f64,
    pub clip:                   f64,
    pub hidden_size:            usize,
    pub encoder_layers:         usize,
    pub decoder_layers:         usize,
    pub dropout:                f64,
    pub attention:              String,
    pub seed:                   u64,
    pub log_every:              usize,
    pub shuffle:                bool,
    /// Resume from this saved epoch
    pub load_epoch:             Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            corpora:                Vec::new(),
            normalizer:             NormalizerKind::Latin,
            checkpoint_dir:         PathBuf::from("weights"),
            max_length:             32,
            min_count:              3,
            batch_size:             64,
            epochs:                 10,
            learning_rate:          1e-4,
            decoder_learning_ratio: 5.0,
            teacher_forcing_ratio:  0.5,
            clip:                   50.0,
            hidden_size:            500,
            encoder_layers:         2,
            decoder_layers:         2,
            dropout:                0.1,
            attention:              "dot".to_string(),
            seed:                   42,
            log_every:              10,
            shuffle:                true,
            load_epoch:             None,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self, vocab_size: usize) -> Seq2SeqConfig {
        Seq2SeqConfig::new(vocab_size, self.attention.clone())
            .with_hidden_size(self.hidden_size)
            .with_encoder_layers(self.encoder_layers)
            .with_decoder_layers(self.decoder_layers)
            .with_dropout(self.dropout)
    }

    /// Catches settings that would only fail deep inside the loop.
    pub fn validate(&self) -> Result<()> {
        if self.corpora.is_empty() {
            bail!("No corpus configured. Pass at least one of --cornell-dir, --convai2-dir, --nucc-dir");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if !(0.0..=1.0).contains(&self.teacher_forcing_ratio) {
            bail!("teacher_forcing_ratio must be within [0, 1], got {}", self.teacher_forcing_ratio);
        }
        if self.clip <= 0.0 {
            bail!("clip must be positive, got {}", self.clip);
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Steps 1-2: Load and normalise every corpus ────────────────────────
        let pairs = load_corpora(&cfg.corpora)?;

        // ── Step 3: Filter, count, trim ───────────────────────────────────────
        let (vocab, pairs) = prepare_pairs(pairs, cfg.max_length, cfg.min_count);
        if pairs.is_empty() {
            bail!("No sentence pairs left after filtering (max_length={}, min_count={})",
                cfg.max_length, cfg.min_count);
        }

        // ── Step 4: Burn dataset ──────────────────────────────────────────────
        let dataset = PairDataset::new(pairs, vocab);

        // ── Step 5: Save what chat needs to rebuild the model ─────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        ckpt_manager.save_vocab(dataset.vocab())?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, &dataset, &ckpt_manager, &metrics)
    }
}

/// Loads each corpus and normalises it with the normaliser its language needs.
fn load_corpora(corpora: &[CorpusSource]) -> Result<Vec<SentencePair>> {
    let mut all = Vec::new();
    for corpus in corpora {
        let source     = corpus.open()?;
        let normalizer = corpus.normalizer_kind().build()?;

        tracing::info!("Loading {} corpus from '{}'", source.name(), corpus.dir.display());
        let raw   = source.load_pairs()?;
        let pairs = normalize_pairs(&raw, normalizer.as_ref());
        tracing::info!("{}: {} raw pairs, {} after normalisation", source.name(), raw.len(), pairs.len());

        all.extend(pairs);
    }
    Ok(all)
}
