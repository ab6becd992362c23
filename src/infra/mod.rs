// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File persistence shared by training and chat:
//
//   checkpoint.rs — per-epoch Seq2Seq weights (CompactRecorder)
//                   plus the TrainConfig and Vocabulary as JSON,
//                   so chat can rebuild the exact model
//
//   metrics.rs    — one CSV row of loss / batch / token counts
//                   per epoch
//
// Reference: Burn Book §5 (Checkpointing)
//            Rust Book §9 (Error Handling with anyhow)

/// Model checkpoint and sidecar JSON saving / loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
