// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// One training run produces two model variants (with and
// without attention), so weights are keyed by variant name.
//
// File naming convention:
//   checkpoints/
//     model_attention.mpk         ← weights of the attention variant
//     model_no_attention.mpk      ← weights of the plain variant
//     train_config.json           ← hyper-parameters of the run
//     loss_history.csv            ← written by LossLogger
//
// The config is needed to rebuild the exact architecture before
// the weights can be loaded into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde_json;

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::Seq2SeqModel;

const CONFIG_FILE: &str = "train_config.json";

/// Extension CompactRecorder appends to a record path
const RECORD_EXTENSION: &str = "mpk";

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes {dir}/model_{variant}.mpk
    pub fn save_model<B: Backend>(&self, model: &Seq2SeqModel<B>, variant: &str) -> Result<()> {
        // the recorder adds the extension
        let path = self.model_path(variant);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        tracing::info!("Saved '{}' checkpoint to '{}'", variant, self.dir.display());
        Ok(())
    }

    /// Restore weights into a model of the same architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:   Seq2SeqModel<B>,
        variant: &str,
        device:  &B::Device,
    ) -> Result<Seq2SeqModel<B>> {
        let path = self.model_path(variant);
        tracing::info!("Loading '{}' checkpoint from '{}'", variant, self.dir.display());

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// True when weights for `variant` are on disk
    pub fn has_model(&self, variant: &str) -> bool {
        self.model_path(variant).with_extension(RECORD_EXTENSION).exists()
            && self.dir.join(CONFIG_FILE).exists()
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' first.",
                    path.display()
                )
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }

    fn model_path(&self, variant: &str) -> PathBuf {
        self.dir.join(format!("model_{variant}"))
    }
}
