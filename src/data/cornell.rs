// ============================================================
// Layer 4 — Cornell Movie-Dialogs Loader
// ============================================================
// Reads the two files of the Cornell corpus:
//
//   movie_lines.txt
//     L1045 +++$+++ u0 +++$+++ m0 +++$+++ BIANCA +++$+++ They do not!
//     lineID       characterID  movieID     character    text
//
//   movie_conversations.txt
//     u0 +++$+++ u2 +++$+++ m0 +++$+++ ['L194', 'L195', 'L196']
//     character1ID  character2ID  movieID     utteranceIDs
//
// Each conversation is re-assembled from its line ids; every two
// consecutive non-empty lines become one (prompt, response) pair.
// The files are ISO-8859-1, where every byte is one char.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;

use crate::domain::error::ChatError;
use crate::domain::sentence_pair::RawPair;
use crate::domain::traits::PairSource;

const FIELD_SEPARATOR: &str = " +++$+++ ";
const LINES_FILE: &str = "movie_lines.txt";
const CONVERSATIONS_FILE: &str = "movie_conversations.txt";

pub struct CornellLoader {
    dir: PathBuf,
}

impl CornellLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PairSource for CornellLoader {
    fn name(&self) -> &str {
        "cornell"
    }

    fn load_pairs(&self) -> Result<Vec<RawPair>> {
        let lines_text = read_latin1(&self.dir.join(LINES_FILE))?;
        let convs_text = read_latin1(&self.dir.join(CONVERSATIONS_FILE))?;

        let lines = parse_lines(&lines_text);
        tracing::debug!("Cornell: {} movie lines", lines.len());

        let mut pairs = Vec::new();
        for utterance_ids in parse_conversations(&convs_text) {
            let texts: Vec<&str> = utterance_ids
                .iter()
                .filter_map(|id| match lines.get(id.as_str()) {
                    Some(text) => Some(text.as_str()),
                    None => {
                        tracing::warn!("Cornell: conversation references unknown line {id}");
                        None
                    }
                })
                .collect();

            for window in texts.windows(2) {
                let (input, target) = (window[0].trim(), window[1].trim());
                if !input.is_empty() && !target.is_empty() {
                    pairs.push((input.to_string(), target.to_string()));
                }
            }
        }

        tracing::info!("Cornell: extracted {} pairs", pairs.len());
        Ok(pairs)
    }
}

fn read_latin1(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| ChatError::corpus_unavailable(path, e))?;
    Ok(bytes.iter().map(|&b| b as char).collect())
}

/// lineID → text
fn parse_lines(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.splitn(5, FIELD_SEPARATOR).collect();
            match fields.as_slice() {
                [id, _, _, _, text] => Some((id.trim().to_string(), text.to_string())),
                _ => {
                    tracing::warn!("Cornell: skipping malformed line {line:?}");
                    None
                }
            }
        })
        .collect()
}

/// One Vec of line ids per conversation.
fn parse_conversations(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter_map(|line| {
            let ids = line.split(FIELD_SEPARATOR).nth(3)?;
            Some(parse_id_list(ids))
        })
        .collect()
}

/// "['L194', 'L195']" → ["L194", "L195"]
fn parse_id_list(list: &str) -> Vec<String> {
    list.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|id| id.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|id| !id.is_empty())
        .collect()
}
