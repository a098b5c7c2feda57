// ============================================================
// Layer 4 — Copy Task Generator
// ============================================================
// Endless stream of random training batches for the copy task:
// the model sees a random sequence and must reproduce it.
//
//   lengths: uniform in [length_from, length_to]   (inclusive)
//   tokens:  uniform in [vocab_lower, vocab_upper) (exclusive)
//
// vocab_lower defaults to 2 so generated data never contains
// the reserved PAD / EOS ids.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::domain::error::{ModelError, Result};
use crate::domain::tokens::TokenSequence;
use crate::domain::traits::SequenceSource;

pub struct CopyTask {
    length_from: usize,
    length_to:   usize,
    vocab_lower: u32,
    vocab_upper: u32,
    batch_size:  usize,
    rng:         StdRng,
}

impl CopyTask {
    /// Validate the ranges and build a generator seeded from entropy.
    pub fn new(
        length_from: usize,
        length_to:   usize,
        vocab_lower: u32,
        vocab_upper: u32,
        batch_size:  usize,
    ) -> Result<Self> {
        if length_from > length_to {
            return Err(ModelError::InvalidRange(format!(
                "length_from ({length_from}) > length_to ({length_to})"
            )));
        }
        if vocab_lower >= vocab_upper {
            return Err(ModelError::InvalidRange(format!(
                "empty token range [{vocab_lower}, {vocab_upper})"
            )));
        }
        if batch_size == 0 {
            return Err(ModelError::InvalidRange("batch_size must be > 0".to_string()));
        }

        Ok(Self {
            length_from, length_to, vocab_lower, vocab_upper, batch_size,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replace the RNG with a seeded one for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn random_length(&mut self) -> usize {
        if self.length_from == self.length_to {
            return self.length_from;
        }
        self.rng.gen_range(self.length_from..=self.length_to)
    }

    /// One batch of random sequences
    pub fn next_batch(&mut self) -> Vec<TokenSequence> {
        (0..self.batch_size)
            .map(|_| {
                let len = self.random_length();
                (0..len)
                    .map(|_| self.rng.gen_range(self.vocab_lower..self.vocab_upper))
                    .collect()
            })
            .collect()
    }
}

impl SequenceSource for CopyTask {
    fn next_pairs(&mut self) -> anyhow::Result<(Vec<TokenSequence>, Vec<TokenSequence>)> {
        let inputs = self.next_batch();
        Ok((inputs.clone(), inputs))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths_and_tokens_in_range() {
        let mut task = CopyTask::new(3, 8, 2, 10, 50).unwrap().with_seed(7);
        for _ in 0..5 {
            let batch = task.next_batch();
            assert_eq!(batch.len(), 50);
            for seq in &batch {
                assert!((3..=8).contains(&seq.len()));
                assert!(seq.iter().all(|&t| (2..10).contains(&t)));
            }
        }
    }

    #[test]
    fn test_fixed_length() {
        let mut task = CopyTask::new(4, 4, 2, 3, 3).unwrap();
        let batch = task.next_batch();
        assert!(batch.iter().all(|s| s == &vec![2, 2, 2, 2]));
    }

    #[test]
    fn test_seed_is_reproducible() {
        let mut a = CopyTask::new(1, 5, 2, 10, 4).unwrap().with_seed(42);
        let mut b = CopyTask::new(1, 5, 2, 10, 4).unwrap().with_seed(42);
        assert_eq!(a.next_batch(), b.next_batch());
    }

    #[test]
    fn test_copy_pairs_are_identical() {
        let mut task = CopyTask::new(2, 3, 2, 10, 5).unwrap();
        let (inputs, targets) = task.next_pairs().unwrap();
        assert_eq!(inputs, targets);
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(matches!(CopyTask::new(5, 3, 2, 10, 1), Err(ModelError::InvalidRange(_))));
        assert!(matches!(CopyTask::new(1, 3, 10, 10, 1), Err(ModelError::InvalidRange(_))));
        assert!(matches!(CopyTask::new(1, 3, 2, 10, 0), Err(ModelError::InvalidRange(_))));
    }
}
