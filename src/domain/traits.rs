// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop and the application layer only talk to
// these traits, so a new data source or a different decoding
// backend can be dropped in without touching them.

use anyhow::Result;
use crate::domain::tokens::TokenSequence;

// ─── SequenceSource ───────────────────────────────────────────────────────────
/// Anything that can hand out training batches of
/// (input, target) sequence pairs.
///
/// Implementations:
///   - CopyTask → random sequences whose target is the input itself
pub trait SequenceSource {
    /// Produce the next batch. The two vectors have the same length.
    fn next_pairs(&mut self) -> Result<(Vec<TokenSequence>, Vec<TokenSequence>)>;
}

// ─── SequenceTranslator ───────────────────────────────────────────────────────
/// Anything that maps input sequences to output sequences.
///
/// Implementations:
///   - Inferencer → greedy decoding with a trained model
pub trait SequenceTranslator {
    /// Translate every input sequence. Outputs end with EOS unless
    /// the decoder hit its step limit first.
    fn translate(&self, inputs: &[TokenSequence]) -> Result<Vec<TokenSequence>>;
}
