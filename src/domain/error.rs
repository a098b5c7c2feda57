// ============================================================
// Layer 3 — Model Errors
// ============================================================
// Everything the model core can reject. Construction problems
// fail fast as `Configuration`; batch problems surface as
// `ShapeMismatch` or one of the more specific variants.
//
// An interrupted training run is NOT an error: the training
// loop reports it as a stop reason and returns normally.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("invalid model configuration: {0}")]
    Configuration(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("token {token} is outside the vocabulary (vocab_size={vocab_size})")]
    TokenOutOfRange { token: i64, vocab_size: usize },

    #[error("input batch has {inputs} sequences but target batch has {targets}")]
    BatchSizeMismatch { inputs: usize, targets: usize },

    #[error("cannot batch an empty collection of sequences")]
    EmptyBatch,

    #[error("sequence {index} has length {length}, longer than the batch limit {max}")]
    SequenceTooLong { index: usize, length: usize, max: usize },

    #[error("invalid range: {0}")]
    InvalidRange(String),
}

/// Result type for model-core operations
pub type Result<T> = std::result::Result<T, ModelError>;
