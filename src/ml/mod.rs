// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, loss and optimisation code lives here.
//
//   gru.rs        — GRU cell, masked bidirectional stack (encoder)
//                   and single-step stack (decoder)
//
//   attention.rs  — Luong dot / general / concat scorer
//
//   model.rs      — EncoderRnn + AttnDecoderRnn sharing one
//                   embedding table, wrapped as Seq2Seq
//
//   loss.rs       — masked negative log-likelihood per step
//
//   clip.rs       — global gradient-norm clipping per module
//
//   trainer.rs    — one optimiser update per batch (teacher
//                   forcing, two Adam states) and the epoch loop
//
//   inferencer.rs — greedy fixed-length decoding
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Luong et al. (2015)

/// GRU cells and stacks
pub mod gru;

/// Luong attention scorer
pub mod attention;

/// Encoder-decoder architecture
pub mod model;

/// Masked NLL loss
pub mod loss;

/// Gradient-norm clipping
pub mod clip;

/// Training step and epoch loop
pub mod trainer;

/// Greedy decoding
pub mod inferencer;
