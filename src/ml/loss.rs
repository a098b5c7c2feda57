// ============================================================
// Layer 5 — Masked Sequence Loss
// ============================================================
// Cross-entropy averaged over a weighted (time, batch) grid:
//
//   loss = Σ_{t,b} w[t,b] · −log p(target[t,b] | logits[t,b])
//          ─────────────────────────────────────────────────
//                         Σ_{t,b} w[t,b]
//
// Which positions carry weight is a policy:
//
//   TrainLength  — only t < decoder_train_length of each instance
//   AllPositions — every position up to the longest instance,
//                  padding included (the reference weighting)

use burn::{prelude::*, tensor::activation::log_softmax};
use serde::{Deserialize, Serialize};

/// Which decoder positions count towards the loss average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossMask {
    /// Weight 1 up to each instance's own train length, 0 after
    TrainLength,
    /// Weight 1 everywhere in the (max train length × batch) grid
    AllPositions,
}

/// logits: [steps, batch, vocab], targets and weights: [steps, batch]
pub fn sequence_loss<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    weights: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [steps, batch, _] = logits.dims();

    let picked = log_softmax(logits, 2)
        .gather(2, targets.unsqueeze_dim::<3>(2))
        .reshape([steps, batch]);
    let total = (picked.neg() * weights.clone()).sum();

    total / weights.sum()
}
