// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Trains the two model variants on the copy task, one after
// the other, with the same hyper-parameters:
//
//   Step 1: Save config                  (Layer 6 - infra)
//   Step 2: For each variant (attention, no attention):
//     a. build a fresh model             (Layer 5 - ml)
//     b. build a seeded copy-task source (Layer 4 - data)
//     c. run the training loop           (Layer 5 - ml)
//     d. save the weights                (Layer 6 - infra)
//
// Every step's loss goes to loss_history.csv. An interrupt stops
// the variant being trained; the next one starts with a cleared
// flag.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::generator::CopyTask;
use crate::infra::{
    checkpoint::CheckpointManager,
    interrupt::InterruptFlag,
    metrics::LossLogger,
};
use crate::ml::{
    cell::{CellConfig, CellKind},
    inferencer::{ATTENTION_VARIANT, PLAIN_VARIANT},
    loss::LossMask,
    model::Seq2SeqConfig,
    trainer::{train_on_copy_task, TrainOptions, TrainingReport},
    TrainBackend,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved to disk and reloaded for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub checkpoint_dir:   String,

    // model
    pub cell:             CellKind,
    pub encoder_hidden:   usize,
    pub decoder_hidden:   usize,
    pub vocab_size:       usize,
    pub embedding_size:   usize,
    pub bidirectional:    bool,
    pub share_bidirectional_cell: bool,
    pub loss_mask:        LossMask,
    pub max_decode_steps: usize,

    // copy task
    pub length_from:      usize,
    pub length_to:        usize,
    pub vocab_lower:      u32,
    pub vocab_upper:      u32,

    // loop
    pub batch_size:       usize,
    pub max_batches:      usize,
    pub batches_in_epoch: usize,
    pub learning_rate:    f64,
    pub seed:             Option<u64>,
    pub verbose:          bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir:   "checkpoints".to_string(),
            cell:             CellKind::Lstm,
            encoder_hidden:   10,
            decoder_hidden:   10,
            vocab_size:       10,
            embedding_size:   10,
            bidirectional:    false,
            share_bidirectional_cell: false,
            loss_mask:        LossMask::TrainLength,
            max_decode_steps: 100,
            length_from:      3,
            length_to:        8,
            vocab_lower:      2,
            vocab_upper:      10,
            batch_size:       100,
            max_batches:      5000,
            batches_in_epoch: 1000,
            learning_rate:    1e-3,
            seed:             None,
            verbose:          true,
        }
    }
}

impl TrainConfig {
    /// Model config for one variant of this run
    pub fn model_config(&self, attention: bool) -> Seq2SeqConfig {
        Seq2SeqConfig::new(
            CellConfig::new(self.encoder_hidden).with_kind(self.cell),
            CellConfig::new(self.decoder_hidden).with_kind(self.cell),
            self.vocab_size,
            self.embedding_size,
        )
        .with_bidirectional(self.bidirectional)
        .with_share_bidirectional_cell(self.share_bidirectional_cell)
        .with_attention(attention)
        .with_loss_mask(self.loss_mask)
        .with_max_decode_steps(self.max_decode_steps)
    }

    pub fn train_options(&self, variant: &str) -> TrainOptions {
        TrainOptions {
            max_batches:      self.max_batches,
            batches_in_epoch: self.batches_in_epoch,
            learning_rate:    self.learning_rate,
            verbose:          self.verbose,
            variant:          variant.to_string(),
        }
    }

    /// Generator for the copy task; the same seed gives both variants the same data
    pub fn copy_task(&self) -> Result<CopyTask> {
        let task = CopyTask::new(
            self.length_from,
            self.length_to,
            self.vocab_lower,
            self.vocab_upper,
            self.batch_size,
        )?;
        Ok(match self.seed {
            Some(seed) => task.with_seed(seed),
            None       => task,
        })
    }
}

/// Outcome of training one variant
#[derive(Debug, Clone)]
pub struct VariantReport {
    pub variant: String,
    pub report:  TrainingReport,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:    TrainConfig,
    interrupt: InterruptFlag,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig, interrupt: InterruptFlag) -> Self {
        Self { config, interrupt }
    }

    /// Train the attention variant, then the plain one.
    pub fn execute(&self) -> Result<Vec<VariantReport>> {
        let cfg = &self.config;

        // ── Step 1: Save config for inference ────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt.save_config(cfg)?;
        let mut logger = LossLogger::new(ckpt.dir())?;

        // ── Step 2: Train each variant ───────────────────────────────────────
        let mut reports = Vec::with_capacity(2);
        for (variant, attention) in [(ATTENTION_VARIANT, true), (PLAIN_VARIANT, false)] {
            self.interrupt.reset();
            let report = self.train_variant(&ckpt, &mut logger, variant, attention)?;
            reports.push(VariantReport { variant: variant.to_string(), report });
        }

        Ok(reports)
    }

    fn train_variant(
        &self,
        ckpt:      &CheckpointManager,
        logger:    &mut LossLogger,
        variant:   &str,
        attention: bool,
    ) -> Result<TrainingReport> {
        let cfg    = &self.config;
        let device = Default::default();

        let model_cfg = cfg.model_config(attention);
        let model     = model_cfg.init::<TrainBackend>(&device)?;
        let batcher   = model_cfg.batcher::<TrainBackend>(device);
        let mut source = cfg.copy_task()?;

        let (model, report) = train_on_copy_task(
            model,
            &batcher,
            &mut source,
            &cfg.train_options(variant),
            &self.interrupt,
            Some(logger),
        )?;

        ckpt.save_model(&model, variant)?;
        Ok(report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::metrics::{read_history, LOSS_CSV};

    #[test]
    fn test_default_model_matches_reference_construction() {
        let cfg = TrainConfig::default();
        let attention = cfg.model_config(true);
        let reference = Seq2SeqConfig::reference();

        assert_eq!(attention.vocab_size, reference.vocab_size);
        assert_eq!(attention.embedding_size, reference.embedding_size);
        assert_eq!(attention.bidirectional, reference.bidirectional);
        assert_eq!(attention.attention, reference.attention);
        assert!(!cfg.model_config(false).attention);
        assert!(attention.validate().is_ok());
    }

    #[test]
    fn test_bad_copy_task_range_is_rejected() {
        let cfg = TrainConfig { length_from: 9, length_to: 3, ..TrainConfig::default() };
        assert!(cfg.copy_task().is_err());
    }

    #[test]
    fn test_both_variants_train_and_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            checkpoint_dir:   dir.path().to_string_lossy().into_owned(),
            encoder_hidden:   4,
            decoder_hidden:   4,
            embedding_size:   3,
            length_from:      2,
            length_to:        3,
            batch_size:       3,
            max_batches:      2,
            seed:             Some(5),
            verbose:          false,
            ..TrainConfig::default()
        };

        let reports = TrainUseCase::new(cfg.clone(), InterruptFlag::new()).execute().unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].variant, ATTENTION_VARIANT);
        assert_eq!(reports[1].variant, PLAIN_VARIANT);
        assert!(reports.iter().all(|r| r.report.loss_track.len() == 3));

        let ckpt = CheckpointManager::new(dir.path());
        assert!(ckpt.has_model(ATTENTION_VARIANT));
        assert!(ckpt.has_model(PLAIN_VARIANT));
        assert_eq!(ckpt.load_config().unwrap(), cfg);

        let history = read_history(dir.path().join(LOSS_CSV)).unwrap();
        assert_eq!(history.len(), 6);
    }
}
