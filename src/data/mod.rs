// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from corpus files to device-ready batches:
//
//   corpus directory
//       │
//       ▼
//   CornellLoader / ConvAi2Loader / NuccLoader → raw text pairs
//       │
//       ▼
//   Normalizer (Latin / CJK)                    → token sequences
//       │
//       ▼
//   prepare_pairs                               → length filter,
//       │                                         vocabulary, trim
//       ▼
//   PairDataset                                 → Burn Dataset
//       │
//       ▼
//   EpochIterator                               → shuffled slices
//       │
//       ▼
//   make_training_batch / Seq2SeqBatcher        → padded tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Padded matrices, masks and their tensor form
pub mod batcher;

/// Cornell movie-dialogs corpus
pub mod cornell;

/// ConvAI2 JSON dialogue logs
pub mod convai2;

/// Burn Dataset over prepared pairs
pub mod dataset;

/// One shuffled pass over the dataset
pub mod epoch;

/// Corpus kind → loader + normaliser
pub mod loader;

/// Latin and CJK text normalisation
pub mod normalizer;

/// NUCC conversation transcripts
pub mod nucc;

/// Length filter, vocabulary build and rare-word trim
pub mod preparer;
