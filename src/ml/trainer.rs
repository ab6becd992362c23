// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One optimiser update per batch:
//
//   1. encode the padded prompts once
//   2. seed the decoder with hidden[0..decoder_layers] and SOS
//   3. draw ONE Bernoulli(teacher_forcing_ratio) for the batch
//   4. for t in 0..max_target_len:
//        probs_t = decoder(input_t)
//        loss   += masked_nll(probs_t, target_t)
//        input  ← target_t        (teacher forcing)
//               | argmax probs_t  (free running)
//   5. backward, split gradients per side, clip each side's
//      global norm, step both Adam optimisers
//
// The decoder's learning rate is lr · decoder_learning_ratio.
// The shared embedding belongs to the encoder side.
//
// Key Burn insight:
//   - Training uses Autodiff<Wgpu>; grads come back on the inner
//     backend and are split per module with from_module
//   - Each optimiser step consumes its grads, so nothing needs zeroing
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::marker::PhantomData;

use anyhow::Result;
use burn::{
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{Seq2SeqBatch, Seq2SeqBatcher},
    dataset::PairDataset,
    epoch::EpochIterator,
};
use crate::domain::{error::ChatError, vocabulary::SOS_TOKEN};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    clip::clip_grad_norm,
    loss::masked_nll_counted,
    model::{AttnDecoderRnn, EncoderRnn, Seq2Seq},
};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Result of one optimiser update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Σ_t loss_t · n_t / Σ_t n_t, for reporting only
    pub loss:   f64,
    /// Unmasked target tokens in the batch
    pub tokens: usize,
    pub teacher_forced: bool,
}

// ─── Seq2SeqTrainer ───────────────────────────────────────────────────────────
pub struct Seq2SeqTrainer<B, OE, OD>
where
    B:  AutodiffBackend,
    OE: Optimizer<EncoderRnn<B>, B>,
    OD: Optimizer<AttnDecoderRnn<B>, B>,
{
    encoder_optim:          OE,
    decoder_optim:          OD,
    learning_rate:          f64,
    decoder_learning_ratio: f64,
    teacher_forcing_ratio:  f64,
    clip:                   f64,
    _backend:               PhantomData<B>,
}

impl<B, OE, OD> Seq2SeqTrainer<B, OE, OD>
where
    B:  AutodiffBackend,
    OE: Optimizer<EncoderRnn<B>, B>,
    OD: Optimizer<AttnDecoderRnn<B>, B>,
{
    pub fn new(
        encoder_optim:          OE,
        decoder_optim:          OD,
        learning_rate:          f64,
        decoder_learning_ratio: f64,
        teacher_forcing_ratio:  f64,
        clip:                   f64,
    ) -> Self {
        Self {
            encoder_optim,
            decoder_optim,
            learning_rate,
            decoder_learning_ratio,
            teacher_forcing_ratio,
            clip,
            _backend: PhantomData,
        }
    }

    /// Runs one teacher-forced or free-running pass over `batch` and
    /// applies both optimiser steps. Returns the updated model.
    pub fn optimize<R: Rng + ?Sized>(
        &mut self,
        model: Seq2Seq<B>,
        batch: &Seq2SeqBatch<B>,
        rng:   &mut R,
    ) -> Result<(Seq2Seq<B>, StepOutcome), ChatError> {
        let [_, batch_size] = batch.targets.dims();
        let device = batch.targets.device();

        let encoded    = model.encode(batch.inputs.clone(), &batch.lengths);
        let mut hidden = model.initial_decoder_hidden(encoded.hidden);
        let mut input  = Tensor::<B, 1, Int>::full([batch_size], SOS_TOKEN as i64, &device);

        let teacher_forced = rng.gen::<f64>() < self.teacher_forcing_ratio;

        let mut loss: Option<Tensor<B, 1>>     = None;
        let mut weighted: Option<Tensor<B, 1>> = None;
        let mut tokens = 0usize;

        for t in 0..batch.max_target_len {
            let (probs, next_hidden) = model.decode_step(input, hidden, encoded.outputs.clone());
            hidden = next_hidden;

            let target_t = batch.targets.clone().slice([t..t + 1, 0..batch_size]).reshape([batch_size]);
            let mask_t   = batch.mask.clone().slice([t..t + 1, 0..batch_size]).reshape([batch_size]);

            let n_t  = batch.step_counts.get(t).copied().unwrap_or(0);
            let step = masked_nll_counted(probs.clone(), target_t.clone(), mask_t, n_t, t)?;
            let step_loss = step.loss;
            let reported  = step_loss.clone().detach().mul_scalar(step.n_total as f64);
            tokens += step.n_total;

            weighted = Some(match weighted {
                Some(acc) => acc + reported,
                None      => reported,
            });
            loss = Some(match loss {
                Some(acc) => acc + step_loss,
                None      => step_loss,
            });

            input = if teacher_forced {
                target_t
            } else {
                probs.argmax(1).reshape([batch_size])
            };
        }

        let (Some(loss), Some(weighted)) = (loss, weighted) else {
            return Err(ChatError::EmptyBatch);
        };
        let reported = weighted.into_scalar().elem::<f64>() / tokens as f64;

        // ── Backward + per-side clipping ──────────────────────────────────────
        let mut grads         = loss.backward();
        let mut encoder_grads = GradientsParams::from_module(&mut grads, &model.encoder);
        let mut decoder_grads = GradientsParams::from_module(&mut grads, &model.decoder);

        let encoder_norm = clip_grad_norm::<B, _>(&model.encoder, &mut encoder_grads, self.clip);
        let decoder_norm = clip_grad_norm::<B, _>(&model.decoder, &mut decoder_grads, self.clip);
        tracing::trace!("grad norms: encoder={:.3} decoder={:.3}", encoder_norm, decoder_norm);

        // ── Adam updates ──────────────────────────────────────────────────────
        let Seq2Seq { encoder, decoder } = model;
        let encoder = self.encoder_optim.step(self.learning_rate, encoder, encoder_grads);
        let decoder = self.decoder_optim.step(
            self.learning_rate * self.decoder_learning_ratio,
            decoder,
            decoder_grads,
        );

        Ok((
            Seq2Seq { encoder, decoder },
            StepOutcome { loss: reported, tokens, teacher_forced },
        ))
    }
}

// ─── Epoch loop ───────────────────────────────────────────────────────────────
/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub epochs_run: usize,
    pub last_epoch: Option<usize>,
    pub last_loss:  Option<f64>,
}

pub fn run_training(
    cfg:          &TrainConfig,
    dataset:      &PairDataset,
    ckpt_manager: &CheckpointManager,
    metrics:      &MetricsLogger,
) -> Result<TrainSummary> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<MyBackend>(cfg, dataset, ckpt_manager, metrics, device)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    dataset:      &PairDataset,
    ckpt_manager: &CheckpointManager,
    metrics:      &MetricsLogger,
    device:       B::Device,
) -> Result<TrainSummary> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    // ── Build (or restore) model ──────────────────────────────────────────────
    let model_cfg = cfg.model_config(dataset.vocab().num_words());
    let mut model: Seq2Seq<B> = model_cfg.init(&device)?;

    let first_epoch = match cfg.load_epoch {
        Some(epoch) => {
            model = ckpt_manager.load_epoch(model, epoch, &device)?;
            epoch + 1
        }
        None => 1,
    };
    tracing::info!(
        "Model ready: hidden={}, encoder_layers={}, decoder_layers={}, attention={}, {} parameters",
        cfg.hidden_size, cfg.encoder_layers, cfg.decoder_layers, cfg.attention, model.num_params(),
    );

    // ── Two Adam optimisers ───────────────────────────────────────────────────
    let mut trainer = Seq2SeqTrainer::new(
        AdamConfig::new().init::<B, EncoderRnn<B>>(),
        AdamConfig::new().init::<B, AttnDecoderRnn<B>>(),
        cfg.learning_rate,
        cfg.decoder_learning_ratio,
        cfg.teacher_forcing_ratio,
        cfg.clip,
    );
    let batcher = Seq2SeqBatcher::<B>::new(device.clone());

    let mut summary = TrainSummary { epochs_run: 0, last_epoch: None, last_loss: None };

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in first_epoch..=cfg.epochs {
        let batches = EpochIterator::new(dataset, cfg.batch_size, cfg.shuffle, &mut rng)?;
        let n_batches = batches.len();

        let mut loss_sum   = 0.0f64;
        let mut batch_count = 0usize;
        let mut token_count = 0usize;

        for (i, batch) in batches.enumerate() {
            let batch = batcher.batch(&batch?);
            let (updated, outcome) = trainer.optimize(model, &batch, &mut rng)?;
            model = updated;

            loss_sum    += outcome.loss;
            batch_count += 1;
            token_count += outcome.tokens;

            if cfg.log_every > 0 && i % cfg.log_every == 0 {
                tracing::info!("[Epoch: {}, {}/{}] loss: {:.6}", epoch, i, n_batches, outcome.loss);
            }
        }

        let mean_loss = if batch_count > 0 { loss_sum / batch_count as f64 } else { f64::NAN };

        ckpt_manager.save_model(&model, epoch)?;
        metrics.log(&EpochMetrics::new(epoch, mean_loss, batch_count, token_count))?;
        tracing::info!("Epoch {} done: mean loss {:.4}, checkpoint saved", epoch, mean_loss);

        summary.epochs_run += 1;
        summary.last_epoch = Some(epoch);
        summary.last_loss  = Some(mean_loss);
    }

    tracing::info!("Training complete!");
    Ok(summary)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use crate::data::batcher::make_training_batch;
    use crate::data::preparer::prepare_pairs;
    use crate::domain::{sentence_pair::SentencePair, vocabulary::PAD_TOKEN};
    use crate::ml::{loss::masked_nll, model::Seq2SeqConfig};

    type B = Autodiff<NdArray>;

    fn dataset() -> PairDataset {
        let pairs = vec![
            SentencePair::from_text("hello there", "hi"),
            SentencePair::from_text("how are you", "i am fine"),
            SentencePair::from_text("hello", "hi there"),
            SentencePair::from_text("are you fine", "i am"),
        ];
        let (vocab, pairs) = prepare_pairs(pairs, 10, 1);
        PairDataset::new(pairs, vocab)
    }

    fn batch(ds: &PairDataset) -> Seq2SeqBatch<B> {
        let tb = make_training_batch(ds.vocab(), ds.pairs().to_vec()).unwrap();
        Seq2SeqBatcher::<B>::new(Default::default()).batch(&tb)
    }

    fn model(ds: &PairDataset) -> Seq2Seq<B> {
        Seq2SeqConfig::new(ds.vocab().num_words(), "dot".into())
            .with_hidden_size(8)
            .with_encoder_layers(1)
            .with_decoder_layers(1)
            .with_dropout(0.0)
            .init(&Default::default())
            .unwrap()
    }

    fn trainer(
        ratio: f64,
        lr:    f64,
    ) -> Seq2SeqTrainer<B, impl Optimizer<EncoderRnn<B>, B>, impl Optimizer<AttnDecoderRnn<B>, B>> {
        Seq2SeqTrainer::new(
            AdamConfig::new().init::<B, EncoderRnn<B>>(),
            AdamConfig::new().init::<B, AttnDecoderRnn<B>>(),
            lr,
            5.0,
            ratio,
            50.0,
        )
    }

    /// Replays the forward pass of `optimize` and returns its reported loss.
    fn replayed_loss(model: &Seq2Seq<B>, batch: &Seq2SeqBatch<B>, teacher_forced: bool) -> f64 {
        let [_, b] = batch.targets.dims();
        let device = batch.targets.device();

        let encoded    = model.encode(batch.inputs.clone(), &batch.lengths);
        let mut hidden = model.initial_decoder_hidden(encoded.hidden);
        let mut input  = Tensor::<B, 1, Int>::full([b], SOS_TOKEN as i64, &device);

        let (mut sum, mut n) = (0.0f64, 0usize);
        for t in 0..batch.max_target_len {
            let (probs, next) = model.decode_step(input, hidden, encoded.outputs.clone());
            hidden = next;

            let target = batch.targets.clone().slice([t..t + 1, 0..b]).reshape([b]);
            let mask   = batch.mask.clone().slice([t..t + 1, 0..b]).reshape([b]);
            let step   = masked_nll(probs.clone(), target.clone(), mask, t).unwrap();
            sum += step.loss.into_scalar().elem::<f64>() * step.n_total as f64;
            n   += step.n_total;

            input = if teacher_forced { target } else { probs.argmax(1).reshape([b]) };
        }
        sum / n as f64
    }

    #[test]
    fn test_step_reports_finite_loss_and_token_count() {
        let ds = dataset();
        let batch = batch(&ds);
        let expected_tokens: usize = batch.step_counts.iter().sum();

        let mut rng = StdRng::seed_from_u64(0);
        let (_, outcome) = trainer(1.0, 1e-3).optimize(model(&ds), &batch, &mut rng).unwrap();

        assert!(outcome.loss.is_finite() && outcome.loss > 0.0);
        assert_eq!(outcome.tokens, expected_tokens);
        assert!(outcome.teacher_forced);
    }

    #[test]
    fn test_teacher_forcing_ratio_zero_runs_free() {
        let ds = dataset();
        let batch = batch(&ds);
        let mut rng = StdRng::seed_from_u64(0);
        let (_, outcome) = trainer(0.0, 1e-3).optimize(model(&ds), &batch, &mut rng).unwrap();
        assert!(!outcome.teacher_forced);
        assert!(outcome.loss.is_finite());
    }

    #[test]
    fn test_free_running_feeds_back_argmax() {
        let ds = dataset();
        let batch = batch(&ds);
        assert!(batch.max_target_len > 1);
        let model = model(&ds);

        let expected = replayed_loss(&model, &batch, false);
        let mut rng = StdRng::seed_from_u64(0);
        let (_, outcome) = trainer(0.0, 1e-3).optimize(model, &batch, &mut rng).unwrap();

        assert!((outcome.loss - expected).abs() < 1e-4, "{} vs {}", outcome.loss, expected);
    }

    #[test]
    fn test_teacher_forcing_feeds_back_targets() {
        let ds = dataset();
        let batch = batch(&ds);
        let model = model(&ds);

        let expected = replayed_loss(&model, &batch, true);
        let mut rng = StdRng::seed_from_u64(0);
        let (_, outcome) = trainer(1.0, 1e-3).optimize(model, &batch, &mut rng).unwrap();

        assert!((outcome.loss - expected).abs() < 1e-4, "{} vs {}", outcome.loss, expected);
    }

    #[test]
    fn test_one_teacher_forcing_draw_per_batch() {
        let ds = dataset();
        let batch = batch(&ds);
        assert!(batch.max_target_len > 1);

        let mut trainer = trainer(0.5, 1e-3);
        let mut model   = model(&ds);
        let mut rng       = StdRng::seed_from_u64(21);
        let mut reference = rng.clone();

        for _ in 0..8 {
            let (updated, outcome) = trainer.optimize(model, &batch, &mut rng).unwrap();
            model = updated;
            assert_eq!(outcome.teacher_forced, reference.gen::<f64>() < 0.5);
        }
        // both streams consumed exactly one value per batch
        assert_eq!(rng.gen::<u64>(), reference.gen::<u64>());
    }

    #[test]
    fn test_decoder_gradient_reaches_shared_embedding() {
        let ds = dataset();
        let model  = model(&ds);
        let device = Default::default();

        // prompt never uses SOS, so only the decoder can touch that row
        let prompt  = Tensor::<B, 1, Int>::from_ints([3], &device).reshape([1, 1]);
        let encoded = model.encode(prompt, &[1]);
        let hidden  = model.initial_decoder_hidden(encoded.hidden);
        let sos     = Tensor::<B, 1, Int>::full([1], SOS_TOKEN as i64, &device);
        let (probs, _) = model.decode_step(sos, hidden, encoded.outputs);

        let target = Tensor::<B, 1, Int>::from_ints([4], &device);
        let mask   = Tensor::<B, 1, Bool>::from_data(TensorData::new(vec![true], [1]), &device);
        let loss   = masked_nll(probs, target, mask, 0).unwrap().loss;

        let mut grads     = loss.backward();
        let encoder_grads = GradientsParams::from_module(&mut grads, &model.encoder);
        let table = encoder_grads
            .get::<<B as AutodiffBackend>::InnerBackend, 2>(model.encoder.embedding.weight.id)
            .unwrap();
        let [_, width] = table.dims();
        let row_norm = |row: usize| -> f64 {
            table.clone().slice([row..row + 1, 0..width]).powf_scalar(2.0).sum().into_scalar().elem()
        };

        assert!(row_norm(SOS_TOKEN) > 0.0);
        assert_eq!(row_norm(PAD_TOKEN), 0.0);
    }

    #[test]
    fn test_repeated_steps_reduce_loss() {
        let ds = dataset();
        let batch = batch(&ds);
        let mut rng = StdRng::seed_from_u64(7);
        let mut trainer = trainer(1.0, 1e-2);
        let mut model = model(&ds);

        let mut losses = Vec::new();
        for _ in 0..30 {
            let (updated, outcome) = trainer.optimize(model, &batch, &mut rng).unwrap();
            model = updated;
            losses.push(outcome.loss);
        }
        let first = losses[0];
        let last  = losses[losses.len() - 1];
        assert!(last < first, "loss went from {first} to {last}");
    }

    #[test]
    fn test_both_sides_are_updated() {
        let ds = dataset();
        let batch = batch(&ds);
        let mut rng = StdRng::seed_from_u64(1);
        let model = model(&ds);

        let embedding_before = model.encoder.embedding.weight.val().into_data();
        let out_before       = model.decoder.out.weight.val().into_data();

        let (model, _) = trainer(1.0, 1e-2).optimize(model, &batch, &mut rng).unwrap();

        assert_ne!(model.encoder.embedding.weight.val().into_data(), embedding_before);
        assert_ne!(model.decoder.out.weight.val().into_data(), out_before);
    }

    #[test]
    fn test_train_loop_writes_checkpoints_and_metrics() {
        let dir = std::env::temp_dir().join(format!("seq2seq_train_loop_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let ds = dataset();
        let cfg = TrainConfig {
            checkpoint_dir: dir.clone(),
            batch_size:     2,
            epochs:         2,
            hidden_size:    8,
            encoder_layers: 1,
            decoder_layers: 1,
            dropout:        0.0,
            ..TrainConfig::default()
        };
        let ckpt    = CheckpointManager::new(&dir).unwrap();
        let metrics = MetricsLogger::new(&dir).unwrap();

        let summary = train_loop::<B>(&cfg, &ds, &ckpt, &metrics, Default::default()).unwrap();

        assert_eq!(summary.epochs_run, 2);
        assert_eq!(summary.last_epoch, Some(2));
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);
        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_train_loop_rejects_zero_batch_size() {
        let dir = std::env::temp_dir().join(format!("seq2seq_zero_batch_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let ds  = dataset();
        let cfg = TrainConfig {
            checkpoint_dir: dir.clone(),
            batch_size:     0,
            hidden_size:    8,
            encoder_layers: 1,
            decoder_layers: 1,
            ..TrainConfig::default()
        };
        let ckpt    = CheckpointManager::new(&dir).unwrap();
        let metrics = MetricsLogger::new(&dir).unwrap();

        let err = train_loop::<B>(&cfg, &ds, &ckpt, &metrics, Default::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<ChatError>(), Some(ChatError::InvalidModelConfig(_))));
        assert!(ckpt.latest_epoch().is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
