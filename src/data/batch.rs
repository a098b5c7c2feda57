// ============================================================
// Layer 4 — Padded Batches
// ============================================================
// Turns a collection of variable-length sequences into one
// rectangular, time-major batch plus a vector of true lengths.
//
// Time-major means the first axis is the time step and the
// second is the instance:
//
//   sequences: [5, 4, 6, 7]      batch (4 × 2):   5 6
//              [6, 6]                             4 6
//                                                 6 0
//                                                 7 0
//   lengths:   [4, 2]
//
// Invariant: for instance i, rows [0, len_i) hold real tokens
// and rows [len_i, max_len) hold PAD.
//
// The decoder feeds for teacher forcing are derived here too,
// on the host, before anything becomes a tensor.

use serde::{Deserialize, Serialize};

use crate::domain::error::{ModelError, Result};
use crate::domain::tokens::{TokenSequence, EOS, PAD};
use crate::ml::loss::LossMask;

/// One past the largest id an Int tensor can hold
pub const TENSOR_ID_LIMIT: usize = i32::MAX as usize + 1;

/// A padded, time-major batch of token ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Row-major storage of the (max_len × batch_size) matrix
    tokens:     Vec<u32>,
    max_len:    usize,
    batch_size: usize,
    lengths:    Vec<usize>,
}

/// Pad `seqs` into a time-major batch.
///
/// With `max_sequence_length = None` the batch is as long as the
/// longest sequence. An explicit limit shorter than some sequence
/// is an error rather than a silent truncation.
pub fn batch(seqs: &[TokenSequence], max_sequence_length: Option<usize>) -> Result<Batch> {
    if seqs.is_empty() {
        return Err(ModelError::EmptyBatch);
    }

    let lengths: Vec<usize> = seqs.iter().map(Vec::len).collect();
    let longest = lengths.iter().copied().max().unwrap_or(0);
    let max_len = max_sequence_length.unwrap_or(longest);

    if let Some((index, &length)) = lengths.iter().enumerate().find(|&(_, &l)| l > max_len) {
        return Err(ModelError::SequenceTooLong { index, length, max: max_len });
    }
    if max_len == 0 {
        return Err(ModelError::ShapeMismatch(
            "every sequence in the batch is empty".to_string(),
        ));
    }

    let batch_size = seqs.len();
    let mut tokens = vec![PAD; max_len * batch_size];
    for (i, seq) in seqs.iter().enumerate() {
        for (t, &token) in seq.iter().enumerate() {
            tokens[t * batch_size + i] = token;
        }
    }

    Ok(Batch { tokens, max_len, batch_size, lengths })
}

impl Batch {
    /// Build a batch from a literal time-major matrix.
    /// Rows must be rectangular and every position at or past an
    /// instance's length must already be PAD.
    pub fn from_time_major(rows: &[Vec<u32>], lengths: Vec<usize>) -> Result<Self> {
        let max_len    = rows.len();
        let batch_size = lengths.len();
        if max_len == 0 || batch_size == 0 {
            return Err(ModelError::EmptyBatch);
        }

        let mut tokens = Vec::with_capacity(max_len * batch_size);
        for (t, row) in rows.iter().enumerate() {
            if row.len() != batch_size {
                return Err(ModelError::ShapeMismatch(format!(
                    "row {t} has {} entries, expected {batch_size}", row.len()
                )));
            }
            tokens.extend_from_slice(row);
        }

        for (i, &len) in lengths.iter().enumerate() {
            if len > max_len {
                return Err(ModelError::SequenceTooLong { index: i, length: len, max: max_len });
            }
            if (len..max_len).any(|t| tokens[t * batch_size + i] != PAD) {
                return Err(ModelError::ShapeMismatch(format!(
                    "instance {i} has non-PAD tokens past its length {len}"
                )));
            }
        }

        Ok(Self { tokens, max_len, batch_size, lengths })
    }

    pub fn max_len(&self) -> usize { self.max_len }

    pub fn batch_size(&self) -> usize { self.batch_size }

    pub fn lengths(&self) -> &[usize] { &self.lengths }

    /// Token at time step `t` for instance `i`
    pub fn get(&self, t: usize, i: usize) -> u32 {
        self.tokens[t * self.batch_size + i]
    }

    /// All instances at time step `t`
    pub fn row(&self, t: usize) -> &[u32] {
        &self.tokens[t * self.batch_size..(t + 1) * self.batch_size]
    }

    /// The full padded column of instance `i`
    pub fn column(&self, i: usize) -> Vec<u32> {
        (0..self.max_len).map(|t| self.get(t, i)).collect()
    }

    /// Largest token id anywhere in the batch
    pub fn max_token(&self) -> u32 {
        self.tokens.iter().copied().max().unwrap_or(PAD)
    }

    /// Flattened time-major ids in the integer type tensors are built from.
    /// Fails on the first id that does not fit.
    pub fn to_ints(&self) -> Result<Vec<i32>> {
        self.tokens
            .iter()
            .map(|&x| {
                i32::try_from(x).map_err(|_| ModelError::TokenOutOfRange {
                    token:      x as i64,
                    vocab_size: TENSOR_ID_LIMIT,
                })
            })
            .collect()
    }

    /// Keep only the first `steps` rows. Rows past every instance's
    /// length are pure padding, so dropping them loses nothing.
    pub fn take_rows(&self, steps: usize) -> Batch {
        let steps = steps.min(self.max_len);
        Batch {
            tokens:     self.tokens[..steps * self.batch_size].to_vec(),
            max_len:    steps,
            batch_size: self.batch_size,
            lengths:    self.lengths.iter().map(|&l| l.min(steps)).collect(),
        }
    }

    // ─── Decoder feeds for teacher forcing ──────────────────────────────────

    /// Per-instance number of decoder training steps: length + 1,
    /// one extra step to emit EOS.
    pub fn decoder_train_length(&self) -> Vec<usize> {
        self.lengths.iter().map(|&l| l + 1).collect()
    }

    /// Decoder inputs: an EOS row (the start symbol) on top of the targets.
    pub fn decoder_train_inputs(&self) -> Batch {
        let mut tokens = vec![EOS; self.batch_size];
        tokens.extend_from_slice(&self.tokens);
        Batch {
            tokens,
            max_len:    self.max_len + 1,
            batch_size: self.batch_size,
            lengths:    self.decoder_train_length(),
        }
    }

    /// Decoder targets: a PAD row under the targets, then EOS written
    /// at row `length` of each instance. Rows past that stay PAD.
    pub fn decoder_train_targets(&self) -> Batch {
        let mut tokens = self.tokens.clone();
        tokens.extend(std::iter::repeat(PAD).take(self.batch_size));
        for (i, &len) in self.lengths.iter().enumerate() {
            // row `len` is PAD here, either padding or the appended row
            tokens[len * self.batch_size + i] += EOS;
        }
        Batch {
            tokens,
            max_len:    self.max_len + 1,
            batch_size: self.batch_size,
            lengths:    self.decoder_train_length(),
        }
    }

    /// Loss weights over the decoder-train grid, time-major,
    /// shape (max decoder_train_length × batch_size).
    pub fn loss_weights(&self, mask: LossMask) -> Vec<f32> {
        let train_length = self.decoder_train_length();
        let steps = train_length.iter().copied().max().unwrap_or(0);
        let mut weights = Vec::with_capacity(steps * self.batch_size);
        for t in 0..steps {
            for &len in &train_length {
                let active = match mask {
                    LossMask::AllPositions => true,
                    LossMask::TrainLength  => t < len,
                };
                weights.push(if active { 1.0 } else { 0.0 });
            }
        }
        weights
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<TokenSequence> {
        vec![vec![5, 4, 6, 7], vec![6, 6], vec![9]]
    }

    #[test]
    fn test_lengths_and_padding() {
        let b = batch(&sample(), None).unwrap();
        assert_eq!(b.max_len(), 4);
        assert_eq!(b.batch_size(), 3);
        assert_eq!(b.lengths(), &[4, 2, 1]);

        for (i, seq) in sample().iter().enumerate() {
            assert_eq!(b.lengths()[i], seq.len());
            for t in 0..b.max_len() {
                if t < seq.len() {
                    assert_eq!(b.get(t, i), seq[t]);
                } else {
                    assert_eq!(b.get(t, i), PAD);
                }
            }
        }
    }

    #[test]
    fn test_time_major_layout() {
        let b = batch(&sample(), None).unwrap();
        assert_eq!(b.row(0), &[5, 6, 9]);
        assert_eq!(b.row(1), &[4, 6, 0]);
        assert_eq!(b.column(1), vec![6, 6, 0, 0]);
    }

    #[test]
    fn test_explicit_max_length_pads_further() {
        let b = batch(&sample(), Some(6)).unwrap();
        assert_eq!(b.max_len(), 6);
        assert_eq!(b.row(5), &[PAD, PAD, PAD]);
    }

    #[test]
    fn test_too_long_sequence_rejected() {
        let err = batch(&sample(), Some(3)).unwrap_err();
        assert_eq!(err, ModelError::SequenceTooLong { index: 0, length: 4, max: 3 });
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert_eq!(batch(&[], None).unwrap_err(), ModelError::EmptyBatch);
        assert!(batch(&[vec![], vec![]], None).is_err());
    }

    #[test]
    fn test_decoder_targets_put_eos_at_length() {
        let b = batch(&sample(), None).unwrap();
        let targets = b.decoder_train_targets();
        assert_eq!(targets.max_len(), 5);

        for (i, &len) in b.lengths().iter().enumerate() {
            for t in 0..len {
                assert_eq!(targets.get(t, i), b.get(t, i));
            }
            assert_eq!(targets.get(len, i), EOS);
            for t in (len + 1)..targets.max_len() {
                assert_eq!(targets.get(t, i), PAD);
            }
        }
    }

    #[test]
    fn test_decoder_train_length_is_length_plus_one() {
        let b = batch(&sample(), None).unwrap();
        assert_eq!(b.decoder_train_length(), vec![5, 3, 2]);
    }

    #[test]
    fn test_decoder_inputs_start_with_eos() {
        let b = batch(&sample(), None).unwrap();
        let inputs = b.decoder_train_inputs();
        assert_eq!(inputs.row(0), &[EOS, EOS, EOS]);
        assert_eq!(inputs.row(1), b.row(0));
        assert_eq!(inputs.max_len(), b.max_len() + 1);
    }

    #[test]
    fn test_loss_weights_policies() {
        let b = batch(&sample(), None).unwrap();
        let full = b.loss_weights(LossMask::AllPositions);
        assert_eq!(full.len(), 5 * 3);
        assert!(full.iter().all(|&w| w == 1.0));

        let masked = b.loss_weights(LossMask::TrainLength);
        // instance 2 has train length 2: rows 0 and 1 only
        let col2: Vec<f32> = (0..5).map(|t| masked[t * 3 + 2]).collect();
        assert_eq!(col2, vec![1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(masked.iter().sum::<f32>(), (5 + 3 + 2) as f32);
    }

    #[test]
    fn test_take_rows_drops_trailing_padding() {
        let b = batch(&sample(), Some(7)).unwrap();
        let targets = b.decoder_train_targets();
        assert_eq!(targets.max_len(), 8);
        let trimmed = targets.take_rows(5);
        assert_eq!(trimmed.max_len(), 5);
        assert_eq!(trimmed.column(0), vec![5, 4, 6, 7, EOS]);
        assert_eq!(trimmed.lengths(), &[5, 3, 2]);
    }

    #[test]
    fn test_from_time_major_validates_padding() {
        let rows = vec![vec![5, 6, 7], vec![7, 6, 0], vec![0, 7, 0], vec![0, 8, 0]];
        let b = Batch::from_time_major(&rows, vec![2, 4, 1]).unwrap();
        assert_eq!(b.column(0), vec![5, 7, 0, 0]);
        for (t, row) in rows.iter().enumerate() {
            assert_eq!(b.row(t), row.as_slice());
        }

        // instance 2 claims length 1 but has a token at row 1
        let bad = vec![vec![5, 6, 7], vec![7, 6, 3]];
        assert!(matches!(
            Batch::from_time_major(&bad, vec![2, 2, 1]),
            Err(ModelError::ShapeMismatch(_))
        ));
    }
}
