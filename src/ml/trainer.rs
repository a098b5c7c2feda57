// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Trains a model on batches drawn from a SequenceSource with
// Adam and teacher forcing.
//
// The loop is a two-state machine:
//
//   Running ──step ok──────────────► Running
//   Running ──max_batches+1 steps──► Stopped(Completed)
//   Running ──interrupt raised─────► Stopped(Interrupted)
//
// The interrupt flag is checked between steps only, so every
// recorded loss belongs to a fully applied update. Any error
// inside a step ends the run and propagates.
//
// Each step:
//   1. draw (inputs, targets) from the source
//   2. build the padded feed
//   3. loss = masked cross-entropy of the teacher-forced logits
//   4. backward pass + one Adam update
//   5. record the loss (and log it to CSV if a logger is given)
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::{Seq2SeqBatcher, TrainInputs};
use crate::domain::traits::SequenceSource;
use crate::infra::interrupt::InterruptFlag;
use crate::infra::metrics::{LossLogger, LossRecord};
use crate::ml::model::Seq2SeqModel;

/// Samples shown per diagnostic report
const DIAGNOSTIC_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

/// What a training run hands back besides the model
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Loss of every completed step, in order
    pub loss_track: Vec<f64>,
    pub stop:       StopReason,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.loss_track.last().copied()
    }

    pub fn examples_seen(&self, batch_size: usize) -> usize {
        self.loss_track.len() * batch_size
    }

    pub fn was_interrupted(&self) -> bool {
        self.stop == StopReason::Interrupted
    }
}

#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// The loop runs max_batches + 1 steps
    pub max_batches:      usize,
    /// Diagnostics at step 0 and every this many steps; 0 means step 0 only
    pub batches_in_epoch: usize,
    pub learning_rate:    f64,
    pub verbose:          bool,
    /// Name written to the loss CSV
    pub variant:          String,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_batches:      5000,
            batches_in_epoch: 1000,
            learning_rate:    1e-3,
            verbose:          true,
            variant:          "model".to_string(),
        }
    }
}

pub fn train_on_copy_task<B: AutodiffBackend>(
    model:      Seq2SeqModel<B>,
    batcher:    &Seq2SeqBatcher<B>,
    source:     &mut dyn SequenceSource,
    options:    &TrainOptions,
    interrupt:  &InterruptFlag,
    mut logger: Option<&mut LossLogger>,
) -> Result<(Seq2SeqModel<B>, TrainingReport)> {
    let total_steps = options.max_batches + 1;
    tracing::info!(
        "Training '{}': {} steps, lr={}, attention={}",
        options.variant, total_steps, options.learning_rate, model.has_attention(),
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new()
        .with_epsilon(1e-8)
        .init::<B, Seq2SeqModel<B>>();

    let mut model      = model;
    let mut loss_track = Vec::with_capacity(total_steps);
    let mut state      = LoopState::Running;

    while state == LoopState::Running {
        let batch = loss_track.len();

        if interrupt.is_raised() {
            tracing::warn!("training interrupted after {} steps", batch);
            state = LoopState::Stopped(StopReason::Interrupted);
            continue;
        }
        if batch == total_steps {
            state = LoopState::Stopped(StopReason::Completed);
            continue;
        }

        let (inputs, targets) = source.next_pairs()?;
        let feed = batcher.make_train_inputs(&inputs, &targets)?;

        let loss = model.forward_loss(&feed)?;
        let loss_value = loss.clone().into_scalar().elem::<f64>();

        // Backward pass + Adam update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(options.learning_rate, model, grads);

        loss_track.push(loss_value);
        if let Some(logger) = logger.as_deref_mut() {
            logger.log(&LossRecord::new(options.variant.as_str(), batch, loss_value))?;
        }

        let due = batch == 0
            || (options.batches_in_epoch > 0 && batch % options.batches_in_epoch == 0);
        if options.verbose && due {
            report_progress(&model, &feed, batch)?;
        }
    }

    if let Some(logger) = logger {
        logger.flush()?;
    }

    let stop = match state {
        LoopState::Stopped(reason) => reason,
        LoopState::Running => StopReason::Completed,
    };
    tracing::info!("Training '{}' stopped ({:?}) after {} steps", options.variant, stop, loss_track.len());

    Ok((model, TrainingReport { loss_track, stop }))
}

/// Minibatch loss after the update, then a few encoder inputs next to
/// their teacher-forced predictions.
fn report_progress<B: Backend>(model: &Seq2SeqModel<B>, feed: &TrainInputs<B>, batch: usize) -> Result<()> {
    let loss = model.forward_loss(feed)?.into_scalar().elem::<f64>();
    let predicted = model.predict_train(feed)?;

    tracing::info!("batch {}", batch);
    tracing::info!("  minibatch loss: {}", loss);

    let samples = feed.inputs.batch_size().min(DIAGNOSTIC_SAMPLES);
    for i in 0..samples {
        let prediction: Vec<u32> = predicted.iter().map(|row| row[i]).collect();
        tracing::info!("  sample {}:", i + 1);
        tracing::info!("    enc input           > {:?}", feed.inputs.column(i));
        tracing::info!("    dec train predicted > {:?}", prediction);
    }
    Ok(())
}
