// ============================================================
// Layer 4 — ConvAI2 Dialogue-Log Loader
// ============================================================
// Reads summer_wild_evaluation_dialogs.json:
//
//   [
//     { "dialog": [ { "sender": "...", "text": "hi" },
//                   { "sender": "...", "text": "hello" }, ... ],
//       ...other fields ignored... },
//     ...
//   ]
//
// Consecutive utterances of one dialogue become pairs.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::error::ChatError;
use crate::domain::sentence_pair::RawPair;
use crate::domain::traits::PairSource;

const DIALOGS_FILE: &str = "summer_wild_evaluation_dialogs.json";

#[derive(Debug, Deserialize)]
struct Dialogue {
    #[serde(default)]
    dialog: Vec<Utterance>,
}

#[derive(Debug, Deserialize)]
struct Utterance {
    text: String,
}

pub struct ConvAi2Loader {
    dir: PathBuf,
}

impl ConvAi2Loader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PairSource for ConvAi2Loader {
    fn name(&self) -> &str {
        "convai2"
    }

    fn load_pairs(&self) -> Result<Vec<RawPair>> {
        let path = self.dir.join(DIALOGS_FILE);
        let json = fs::read_to_string(&path).map_err(|e| ChatError::corpus_unavailable(&path, e))?;
        let dialogues: Vec<Dialogue> = serde_json::from_str(&json)
            .with_context(|| format!("Malformed ConvAI2 log '{}'", path.display()))?;

        let pairs: Vec<RawPair> = dialogues
            .iter()
            .flat_map(|d| {
                d.dialog
                    .windows(2)
                    .map(|w| (w[0].text.clone(), w[1].text.clone()))
            })
            .collect();

        tracing::info!("ConvAI2: {} dialogues → {} pairs", dialogues.len(), pairs.len());
        Ok(pairs)
    }
}
