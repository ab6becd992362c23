// ============================================================
// Layer 4 — Corpus Registry
// ============================================================
// Maps a corpus kind + directory onto the matching PairSource
// implementation and the normaliser its text needs.
//
//   cornell  → CornellLoader  + LatinNormalizer
//   convai2  → ConvAi2Loader  + LatinNormalizer
//   nucc     → NuccLoader     + CjkNormalizer

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    convai2::ConvAi2Loader,
    cornell::CornellLoader,
    normalizer::NormalizerKind,
    nucc::NuccLoader,
};
use crate::domain::traits::PairSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusKind {
    Cornell,
    ConvAi2,
    Nucc,
}

/// One configured corpus directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSource {
    pub kind: CorpusKind,
    pub dir:  PathBuf,
}

impl CorpusSource {
    pub fn new(kind: CorpusKind, dir: impl Into<PathBuf>) -> Self {
        Self { kind, dir: dir.into() }
    }

    pub fn normalizer_kind(&self) -> NormalizerKind {
        match self.kind {
            CorpusKind::Cornell | CorpusKind::ConvAi2 => NormalizerKind::Latin,
            CorpusKind::Nucc => NormalizerKind::Cjk,
        }
    }

    pub fn open(&self) -> Result<Box<dyn PairSource>> {
        Ok(match self.kind {
            CorpusKind::Cornell => Box::new(CornellLoader::new(&self.dir)),
            CorpusKind::ConvAi2 => Box::new(ConvAi2Loader::new(&self.dir)),
            CorpusKind::Nucc    => Box::new(NuccLoader::new(&self.dir)?),
        })
    }
}
