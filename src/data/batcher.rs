// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Converts raw sequences into the tensor feeds the model runs on.
//
//   make_train_inputs(inputs, targets) → TrainInputs
//     encoder_inputs          [max_len, batch]       Int
//     decoder_train_inputs    [train_steps, batch]   Int   (EOS row first)
//     decoder_train_targets   [train_steps, batch]   Int   (EOS at length)
//     loss_weights            [train_steps, batch]   Float
//
//   make_inference_inputs(inputs) → InferenceInputs
//     encoder_inputs          [max_len, batch]       Int
//
// train_steps = max(decoder_train_length) = longest target + 1.
//
// The host-side batches travel with the tensors so lengths and
// diagnostics never need a device round trip.
//
// In debug mode both operations ignore their arguments and feed
// a fixed literal batch, which is enough to smoke-test every
// tensor shape in the graph.

use burn::prelude::*;

use crate::data::batch::{batch, Batch, TENSOR_ID_LIMIT};
use crate::domain::error::{ModelError, Result};
use crate::domain::tokens::TokenSequence;
use crate::ml::loss::LossMask;

/// Fixed time-major batch used in debug mode: 3 instances, lengths [2, 4, 1]
pub const DEBUG_ROWS: [[u32; 3]; 4] = [
    [5, 6, 7],
    [7, 6, 0],
    [0, 7, 0],
    [0, 8, 0],
];
pub const DEBUG_LENGTHS: [usize; 3] = [2, 4, 1];

// ─── Feeds ────────────────────────────────────────────────────────────────────
/// Everything one teacher-forced training step needs.
#[derive(Debug, Clone)]
pub struct TrainInputs<B: Backend> {
    pub inputs:                Batch,
    pub targets:               Batch,
    pub encoder_inputs:        Tensor<B, 2, Int>,
    pub decoder_train_inputs:  Tensor<B, 2, Int>,
    pub decoder_train_targets: Tensor<B, 2, Int>,
    pub decoder_train_length:  Vec<usize>,
    pub loss_weights:          Tensor<B, 2>,
}

impl<B: Backend> TrainInputs<B> {
    /// Number of teacher-forced decoder steps
    pub fn train_steps(&self) -> usize {
        self.decoder_train_length.iter().copied().max().unwrap_or(0)
    }
}

/// Everything greedy decoding needs.
#[derive(Debug, Clone)]
pub struct InferenceInputs<B: Backend> {
    pub inputs:         Batch,
    pub encoder_inputs: Tensor<B, 2, Int>,
}

// ─── Seq2SeqBatcher ───────────────────────────────────────────────────────────
/// Holds the device the tensors are created on, plus the feed policies.
/// Without a vocabulary size only ids that fit an Int tensor are checked.
#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    pub device:     B::Device,
    pub debug:      bool,
    pub loss_mask:  LossMask,
    pub vocab_size: Option<usize>,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device, debug: false, loss_mask: LossMask::TrainLength, vocab_size: None }
    }

    pub fn with_vocab_size(mut self, vocab_size: usize) -> Self {
        self.vocab_size = Some(vocab_size);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_loss_mask(mut self, loss_mask: LossMask) -> Self {
        self.loss_mask = loss_mask;
        self
    }

    /// Feed for one training step. Inputs and targets must pair up one to one.
    pub fn make_train_inputs(
        &self,
        input_seq:  &[TokenSequence],
        target_seq: &[TokenSequence],
    ) -> Result<TrainInputs<B>> {
        let (inputs, targets) = if self.debug {
            (debug_batch()?, debug_batch()?)
        } else {
            if input_seq.len() != target_seq.len() {
                return Err(ModelError::BatchSizeMismatch {
                    inputs:  input_seq.len(),
                    targets: target_seq.len(),
                });
            }
            (batch(input_seq, None)?, batch(target_seq, None)?)
        };

        let decoder_train_length = targets.decoder_train_length();
        let steps = decoder_train_length.iter().copied().max().unwrap_or(0);
        let train_inputs  = targets.decoder_train_inputs().take_rows(steps);
        let train_targets = targets.decoder_train_targets().take_rows(steps);
        let weights       = targets.loss_weights(self.loss_mask);

        tracing::debug!(
            "train feed: encoder {}x{}, decoder {}x{}",
            inputs.max_len(), inputs.batch_size(), steps, targets.batch_size(),
        );

        Ok(TrainInputs {
            encoder_inputs:        self.int_tensor(&inputs)?,
            decoder_train_inputs:  self.int_tensor(&train_inputs)?,
            decoder_train_targets: self.int_tensor(&train_targets)?,
            loss_weights: Tensor::<B, 1>::from_floats(weights.as_slice(), &self.device)
                .reshape([steps, targets.batch_size()]),
            decoder_train_length,
            inputs,
            targets,
        })
    }

    /// Feed for greedy decoding; no targets needed.
    pub fn make_inference_inputs(&self, input_seq: &[TokenSequence]) -> Result<InferenceInputs<B>> {
        let inputs = if self.debug { debug_batch()? } else { batch(input_seq, None)? };
        Ok(InferenceInputs {
            encoder_inputs: self.int_tensor(&inputs)?,
            inputs,
        })
    }

    /// [max_len, batch] Int tensor from a host batch
    fn int_tensor(&self, b: &Batch) -> Result<Tensor<B, 2, Int>> {
        let limit = self.vocab_size.map_or(TENSOR_ID_LIMIT, |v| v.min(TENSOR_ID_LIMIT));
        let token = b.max_token();
        if token as usize >= limit {
            return Err(ModelError::TokenOutOfRange { token: token as i64, vocab_size: limit });
        }
        let ids = b.to_ints()?;
        Ok(Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device)
            .reshape([b.max_len(), b.batch_size()]))
    }
}

/// The debug literal as a validated batch
pub fn debug_batch() -> Result<Batch> {
    let rows: Vec<Vec<u32>> = DEBUG_ROWS.iter().map(|r| r.to_vec()).collect();
    Batch::from_time_major(&rows, DEBUG_LENGTHS.to_vec())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn ints(t: Tensor<TB, 2, Int>) -> Vec<i64> {
        t.into_data().iter::<i64>().collect()
    }

    #[test]
    fn test_train_feed_shapes() {
        let batcher = Seq2SeqBatcher::<TB>::new(Default::default());
        let seqs = vec![vec![5, 4, 6, 7], vec![6, 6]];
        let feed = batcher.make_train_inputs(&seqs, &seqs).unwrap();

        assert_eq!(feed.encoder_inputs.dims(), [4, 2]);
        assert_eq!(feed.decoder_train_inputs.dims(), [5, 2]);
        assert_eq!(feed.decoder_train_targets.dims(), [5, 2]);
        assert_eq!(feed.loss_weights.dims(), [5, 2]);
        assert_eq!(feed.decoder_train_length, vec![5, 3]);
        assert_eq!(feed.train_steps(), 5);

        // column 1 of the targets: 6 6 EOS PAD PAD
        let targets = ints(feed.decoder_train_targets);
        let col1: Vec<i64> = (0..5).map(|t| targets[t * 2 + 1]).collect();
        assert_eq!(col1, vec![6, 6, 1, 0, 0]);
    }

    #[test]
    fn test_mismatched_batches_rejected() {
        let batcher = Seq2SeqBatcher::<TB>::new(Default::default());
        let err = batcher
            .make_train_inputs(&[vec![5, 6]], &[vec![5, 6], vec![7]])
            .unwrap_err();
        assert_eq!(err, ModelError::BatchSizeMismatch { inputs: 1, targets: 2 });
    }

    #[test]
    fn test_inference_inputs_are_idempotent() {
        let batcher = Seq2SeqBatcher::<TB>::new(Default::default());
        let seqs = vec![vec![5, 4, 6, 7], vec![6, 6]];

        let a = batcher.make_inference_inputs(&seqs).unwrap();
        let b = batcher.make_inference_inputs(&seqs).unwrap();
        assert_eq!(a.inputs, b.inputs);
        assert_eq!(ints(a.encoder_inputs), ints(b.encoder_inputs));
    }

    #[test]
    fn test_debug_mode_uses_literal_batch() {
        let batcher = Seq2SeqBatcher::<TB>::new(Default::default()).with_debug(true);
        let feed = batcher.make_train_inputs(&[], &[]).unwrap();

        assert_eq!(feed.inputs.lengths(), &DEBUG_LENGTHS);
        assert_eq!(feed.encoder_inputs.dims(), [4, 3]);
        assert_eq!(feed.decoder_train_length, vec![3, 5, 2]);
        assert_eq!(feed.train_steps(), 5);

        let inference = batcher.make_inference_inputs(&[vec![9]]).unwrap();
        assert_eq!(inference.inputs.row(0), &[5, 6, 7]);
    }

    #[test]
    fn test_ids_are_checked_before_tensors_exist() {
        let plain = Seq2SeqBatcher::<TB>::new(Default::default());
        assert_eq!(
            plain.make_inference_inputs(&[vec![3, 3_000_000_000]]).unwrap_err(),
            ModelError::TokenOutOfRange { token: 3_000_000_000, vocab_size: TENSOR_ID_LIMIT },
        );

        let sized = Seq2SeqBatcher::<TB>::new(Default::default()).with_vocab_size(10);
        assert_eq!(
            sized.make_train_inputs(&[vec![5, 6]], &[vec![5, 10]]).unwrap_err(),
            ModelError::TokenOutOfRange { token: 10, vocab_size: 10 },
        );
        assert!(sized.make_inference_inputs(&[vec![9, 2]]).is_ok());
    }

    #[test]
    fn test_loss_mask_policy_reaches_weights() {
        let seqs = vec![vec![5, 4, 6, 7], vec![6]];
        let masked = Seq2SeqBatcher::<TB>::new(Default::default())
            .make_train_inputs(&seqs, &seqs)
            .unwrap();
        let full = Seq2SeqBatcher::<TB>::new(Default::default())
            .with_loss_mask(LossMask::AllPositions)
            .make_train_inputs(&seqs, &seqs)
            .unwrap();

        let sum = |t: Tensor<TB, 2>| t.sum().into_scalar().elem::<f32>();
        assert_eq!(sum(masked.loss_weights), 7.0);
        assert_eq!(sum(full.loss_weights), 10.0);
    }
}
