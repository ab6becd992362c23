// ============================================================
// Layer 4 — NUCC Transcript Loader
// ============================================================
// Reads the Nagoya University Conversation Corpus: one *.txt
// transcript per conversation.
//
//   ＠データ：data001        ← metadata, skipped
//   ％com：...               ← comment, skipped
//   F107：ほんとに         ← speaker tag starts an utterance
//   続くの？               ← continuation of the same utterance
//   M023：（笑い）うん。    ← （…） and ＜…＞ annotations are removed
//
// Consecutive utterances become pairs unless either one contains
// the anonymisation marker ＊＊＊. The extracted pairs are cached
// as tab-separated lines in formated_lines.txt; when the cache
// exists it is read instead of the transcripts.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use regex::Regex;

use crate::domain::error::ChatError;
use crate::domain::sentence_pair::RawPair;
use crate::domain::traits::PairSource;

const CACHE_FILE: &str = "formated_lines.txt";
const MASKED: &str = "＊＊＊";

pub struct NuccLoader {
    dir:         PathBuf,
    speaker_tag: Regex,
    annotations: [Regex; 2],
}

impl NuccLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            dir:         dir.into(),
            speaker_tag: Regex::new(r"^[FM]\d\d\d：").context("speaker tag pattern")?,
            annotations: [
                Regex::new(r"（.+）").context("annotation pattern")?,
                Regex::new(r"＜.+＞").context("annotation pattern")?,
            ],
        })
    }

    fn sanitize(&self, text: &str) -> String {
        let once = self.annotations[0].replace_all(text, "");
        self.annotations[1].replace_all(&once, "").into_owned()
    }

    /// Split one transcript into utterances.
    fn utterances(&self, transcript: &str) -> Vec<String> {
        let mut utterances = Vec::new();
        let mut text = String::new();

        for line in transcript.lines() {
            if line.starts_with('＠') || line.starts_with('％') {
                continue;
            }
            match self.speaker_tag.find(line) {
                Some(tag) => {
                    if !text.is_empty() {
                        utterances.push(self.sanitize(&text));
                    }
                    text = line[tag.end()..].to_string();
                }
                None => text.push_str(line),
            }
        }
        if !text.is_empty() {
            utterances.push(self.sanitize(&text));
        }
        utterances
    }

    fn parse_transcripts(&self) -> Result<Vec<RawPair>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ChatError::corpus_unavailable(&self.dir, e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
            .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some(CACHE_FILE))
            .collect();
        files.sort();

        let mut pairs = Vec::new();
        for path in &files {
            let transcript = fs::read_to_string(path)
                .with_context(|| format!("Cannot read transcript '{}'", path.display()))?;
            let utterances = self.utterances(&transcript);
            tracing::debug!("NUCC: {} → {} utterances", path.display(), utterances.len());

            pairs.extend(
                utterances
                    .windows(2)
                    .filter(|w| !w[0].contains(MASKED) && !w[1].contains(MASKED))
                    .map(|w| (w[0].clone(), w[1].clone())),
            );
        }
        Ok(pairs)
    }
}

impl PairSource for NuccLoader {
    fn name(&self) -> &str {
        "nucc"
    }

    fn load_pairs(&self) -> Result<Vec<RawPair>> {
        let cache = self.dir.join(CACHE_FILE);
        if cache.exists() {
            tracing::info!("NUCC: reading cached pairs from '{}'", cache.display());
            return read_cache(&cache);
        }

        let pairs = self.parse_transcripts()?;
        write_cache(&cache, &pairs)?;
        tracing::info!("NUCC: extracted {} pairs, cached to '{}'", pairs.len(), cache.display());
        Ok(pairs)
    }
}

fn read_cache(path: &Path) -> Result<Vec<RawPair>> {
    let text = fs::read_to_string(path).map_err(|e| ChatError::corpus_unavailable(path, e))?;
    Ok(text
        .lines()
        .filter_map(|line| {
            let (prompt, response) = line.split_once('\t')?;
            Some((prompt.to_string(), response.to_string()))
        })
        .collect())
}

fn write_cache(path: &Path, pairs: &[RawPair]) -> Result<()> {
    let body: String = pairs
        .iter()
        .map(|(p, r)| format!("{}\t{}\n", flatten(p), flatten(r)))
        .collect();
    fs::write(path, body).with_context(|| format!("Cannot write NUCC cache '{}'", path.display()))
}

fn flatten(text: &str) -> String {
    text.replace(['\t', '\n'], " ")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = "＠データ：data001\n\
        ％com：test\n\
        F107：ほんとに\n\
        続くの？\n\
        M023：（笑い）うん。\n\
        F107：＊＊＊さんが\n\
        M023：＜間＞そう。\n";

    #[test]
    fn test_utterances_join_continuations_and_strip_annotations() {
        let loader = NuccLoader::new("unused").unwrap();
        assert_eq!(
            loader.utterances(TRANSCRIPT),
            vec!["ほんとに続くの？", "うん。", "＊＊＊さんが", "そう。"]
        );
    }

    #[test]
    fn test_masked_utterances_are_not_paired_and_cache_is_written() {
        let dir = std::env::temp_dir().join(format!("seq2seq-chat-nucc-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::remove_file(dir.join(CACHE_FILE)).ok();
        fs::write(dir.join("data001.txt"), TRANSCRIPT).unwrap();

        let loader = NuccLoader::new(&dir).unwrap();
        let pairs  = loader.load_pairs().unwrap();
        assert_eq!(pairs, vec![("ほんとに続くの？".to_string(), "うん。".to_string())]);

        // Second load comes from the cache and is identical
        assert!(dir.join(CACHE_FILE).exists());
        assert_eq!(loader.load_pairs().unwrap(), pairs);
        fs::remove_dir_all(dir).ok();
    }
}
