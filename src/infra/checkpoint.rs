// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores Seq2Seq weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. <epoch:03>.mpk.gz     — full Seq2Seq record after each epoch
//                               (encoder incl. shared embedding + decoder)
//   2. latest_epoch.json     — number of the last saved epoch
//   3. train_config.json     — TrainConfig, written before training
//   4. vocab.json            — the frozen, trimmed Vocabulary
//
// The config and vocabulary are enough to rebuild a model of the
// right shape before loading weights into it; chat never needs
// to re-read the corpora.
//
// File layout:
//   checkpoints/
//     001.mpk.gz
//     002.mpk.gz
//     ...
//     latest_epoch.json
//     train_config.json
//     vocab.json
//     metrics.csv
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::vocabulary::Vocabulary;
use crate::ml::model::Seq2Seq;

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const CONFIG_FILE:       &str = "train_config.json";
const VOCAB_FILE:        &str = "vocab.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it does not exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Weights path for `epoch`, without the extension the recorder adds.
    pub fn epoch_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{epoch:03}"))
    }

    /// Writes `<dir>/<epoch:03>` and moves the latest-epoch pointer.
    pub fn save_model<B: Backend>(&self, model: &Seq2Seq<B>, epoch: usize) -> Result<()> {
        let path = self.epoch_path(epoch);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(LATEST_EPOCH_FILE), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_EPOCH_FILE}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// `model` must have the architecture the checkpoint was saved with.
    pub fn load_epoch<B: Backend>(
        &self,
        model:  Seq2Seq<B>,
        epoch:  usize,
        device: &B::Device,
    ) -> Result<Seq2Seq<B>> {
        let path = self.epoch_path(epoch);
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Number stored in latest_epoch.json.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_EPOCH_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        Ok(serde_json::from_str::<usize>(s.trim())?)
    }

    // ─── JSON sidecars ────────────────────────────────────────────────────────

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json(CONFIG_FILE, cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        self.read_json(CONFIG_FILE)
    }

    pub fn save_vocab(&self, vocab: &Vocabulary) -> Result<()> {
        self.write_json(VOCAB_FILE, vocab)
    }

    pub fn load_vocab(&self) -> Result<Vocabulary> {
        self.read_json(VOCAB_FILE)
    }

    fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read '{}'. Make sure you have run 'train' before 'chat'.", path.display())
        })?;
        serde_json::from_str(&json).with_context(|| format!("Malformed JSON in '{}'", path.display()))
    }
}
