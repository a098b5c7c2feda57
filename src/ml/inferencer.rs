// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Greedy decoding of raw token sequences with a built or
// checkpointed model. Each output is cut right after its EOS.

use anyhow::Result;
use burn::prelude::*;

use crate::data::batcher::Seq2SeqBatcher;
use crate::domain::tokens::TokenSequence;
use crate::domain::traits::SequenceTranslator;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::decoder::GreedyTrace;
use crate::ml::model::{Seq2SeqConfig, Seq2SeqModel};

pub struct Inferencer<B: Backend> {
    model:   Seq2SeqModel<B>,
    batcher: Seq2SeqBatcher<B>,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: Seq2SeqModel<B>, batcher: Seq2SeqBatcher<B>) -> Self {
        Self { model, batcher }
    }

    /// Fresh, untrained weights
    pub fn from_config(config: &Seq2SeqConfig, device: B::Device) -> Result<Self> {
        let model = config.init(&device)?;
        Ok(Self::new(model, config.batcher(device)))
    }

    /// Rebuild the `variant` architecture from the saved config and load its weights.
    pub fn from_checkpoint(ckpt: &CheckpointManager, variant: &str, device: B::Device) -> Result<Self> {
        let cfg = ckpt.load_config()?;
        let model_cfg = cfg.model_config(variant_has_attention(variant)?);
        let model: Seq2SeqModel<B> = model_cfg.init(&device)?;
        let model = ckpt.load_model(model, variant, &device)?;
        tracing::info!("Model '{}' loaded from checkpoint", variant);
        Ok(Self::new(model, model_cfg.batcher(device)))
    }

    /// Full greedy trace: time-major tokens, lengths and logits
    pub fn predict(&self, inputs: &[TokenSequence]) -> Result<GreedyTrace<B>> {
        let feed  = self.batcher.make_inference_inputs(inputs)?;
        let trace = self.model.infer(&feed)?;
        tracing::debug!(
            "decoded {} sequences in {} steps",
            trace.batch_size(), trace.steps(),
        );
        Ok(trace)
    }
}

impl<B: Backend> SequenceTranslator for Inferencer<B> {
    fn translate(&self, inputs: &[TokenSequence]) -> Result<Vec<TokenSequence>> {
        Ok(self.predict(inputs)?.sequences())
    }
}

/// Checkpoint variant names used by training
pub const ATTENTION_VARIANT: &str = "attention";
pub const PLAIN_VARIANT: &str = "no_attention";

fn variant_has_attention(variant: &str) -> Result<bool> {
    match variant {
        ATTENTION_VARIANT => Ok(true),
        PLAIN_VARIANT     => Ok(false),
        other => anyhow::bail!(
            "Unknown model variant '{other}', expected '{ATTENTION_VARIANT}' or '{PLAIN_VARIANT}'"
        ),
    }
}
