// ============================================================
// Layer 2 — InferUseCase
// ============================================================
// The two read-only entry points:
//
//   debug_check — builds the reference model in debug mode and
//                 runs the teacher-forced prediction twice on
//                 the fixed literal batch (a graph smoke test)
//
//   run_demo    — greedy decoding of a few input sequences,
//                 with trained weights when a checkpoint
//                 exists, fresh weights otherwise

use anyhow::Result;
use std::path::Path;

use crate::domain::tokens::TokenSequence;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    inferencer::{Inferencer, ATTENTION_VARIANT},
    model::{Seq2SeqConfig, Seq2SeqModel},
    InferBackend,
};

/// Sequences decoded when the user gives none
pub fn demo_inputs() -> Vec<TokenSequence> {
    vec![vec![5, 4, 6, 7], vec![6, 6]]
}

/// What the demo decoded, time-major like the decoder emits it
#[derive(Debug, Clone)]
pub struct DemoOutput {
    pub time_major: Vec<Vec<u32>>,
    pub sequences:  Vec<TokenSequence>,
    pub from_checkpoint: bool,
}

pub struct InferUseCase {
    checkpoint_dir: Option<String>,
    variant:        String,
}

impl InferUseCase {
    pub fn new(checkpoint_dir: Option<String>) -> Self {
        Self { checkpoint_dir, variant: ATTENTION_VARIANT.to_string() }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    /// Two teacher-forced predictions on the debug batch; returns the
    /// second one, [train_steps][batch].
    pub fn debug_check(&self) -> Result<Vec<Vec<u32>>> {
        let device = Default::default();
        let config = Seq2SeqConfig::reference().with_debug(true);
        let model: Seq2SeqModel<InferBackend> = config.init(&device)?;
        let feed = config.batcher::<InferBackend>(device).make_train_inputs(&[], &[])?;

        let first  = model.predict_train(&feed)?;
        let second = model.predict_train(&feed)?;
        tracing::info!(
            "debug graph ok: {} train steps x {} instances",
            second.len(), second.first().map_or(0, Vec::len),
        );
        if first != second {
            tracing::warn!("repeated debug predictions differ");
        }
        Ok(second)
    }

    /// Greedy decoding of `inputs` (the demo pair when empty).
    pub fn run_demo(&self, inputs: &[TokenSequence]) -> Result<DemoOutput> {
        let inputs = if inputs.is_empty() { demo_inputs() } else { inputs.to_vec() };
        let (inferencer, from_checkpoint) = self.inferencer()?;

        let trace = inferencer.predict(&inputs)?;
        Ok(DemoOutput {
            sequences:  trace.sequences(),
            time_major: trace.tokens,
            from_checkpoint,
        })
    }

    fn inferencer(&self) -> Result<(Inferencer<InferBackend>, bool)> {
        let device = Default::default();

        if let Some(dir) = self.checkpoint_dir.as_deref().filter(|d| Path::new(d).is_dir()) {
            let ckpt = CheckpointManager::new(dir);
            if ckpt.has_model(&self.variant) {
                return Ok((Inferencer::from_checkpoint(&ckpt, &self.variant, device)?, true));
            }
            tracing::info!("No '{}' checkpoint in '{}', using fresh weights", self.variant, dir);
        }

        Ok((Inferencer::from_config(&Seq2SeqConfig::reference(), device)?, false))
    }
}
