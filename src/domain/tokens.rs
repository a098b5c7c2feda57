// ============================================================
// Layer 3 — Token Ids
// ============================================================
// A token sequence is an ordered list of non-negative ids.
// Two ids are reserved across the whole system:
//
//   PAD = 0  filler for positions past a sequence's end,
//            ignored by the masked loss
//   EOS = 1  end-of-sequence marker, also the decoder's
//            start symbol during greedy inference

/// Padding filler
pub const PAD: u32 = 0;

/// End of sequence, and the greedy decoder's start token
pub const EOS: u32 = 1;

/// One variable-length sequence of token ids
pub type TokenSequence = Vec<u32>;

/// Cut a decoded sequence right after its first EOS.
/// Sequences without an EOS are returned whole.
pub fn truncate_at_eos(tokens: &[u32]) -> TokenSequence {
    match tokens.iter().position(|&t| t == EOS) {
        Some(end) => tokens[..=end].to_vec(),
        None      => tokens.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_eos() {
        assert_eq!(truncate_at_eos(&[5, 4, EOS, 7, EOS]), vec![5, 4, EOS]);
    }

    #[test]
    fn test_truncate_without_eos() {
        assert_eq!(truncate_at_eos(&[5, 4, 3]), vec![5, 4, 3]);
        assert!(truncate_at_eos(&[]).is_empty());
    }
}
