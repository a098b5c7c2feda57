// ============================================================
// Layer 5 — Luong Attention
// ============================================================
// Multiplicative (dot-product) attention over encoder outputs.
//
//   keys      = W_m · encoder_outputs       [batch, steps, units]
//   score_t   = query · key_t               query = decoder cell output
//   alignment = softmax(score)              masked past each length
//   context   = Σ_t alignment_t · output_t  [batch, encoder width]
//
// The query is the raw decoder cell output, so `units` must
// equal the decoder hidden size; the config checks this.
//
// Reference: Luong, Pham & Manning (2015)
//            Effective Approaches to Attention-based NMT

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

/// Score given to padded encoder positions before the softmax
const MASKED_SCORE: f32 = -1.0e9;

#[derive(Module, Debug)]
pub struct LuongAttention<B: Backend> {
    memory_layer: Linear<B>,
}

/// Encoder outputs prepared once per batch, reused at every decoder step.
#[derive(Debug, Clone)]
pub struct AttentionMemory<B: Backend> {
    /// [batch, steps, units]
    keys:    Tensor<B, 3>,
    /// [batch, steps, encoder width]
    values:  Tensor<B, 3>,
    /// [batch, steps], true on padded positions
    padding: Tensor<B, 2, Bool>,
}

impl<B: Backend> AttentionMemory<B> {
    /// Width of the context vector
    pub fn value_size(&self) -> usize {
        self.values.dims()[2]
    }

    pub fn batch_size(&self) -> usize {
        self.values.dims()[0]
    }
}

impl<B: Backend> LuongAttention<B> {
    pub fn new(memory_size: usize, units: usize, device: &B::Device) -> Self {
        Self {
            memory_layer: LinearConfig::new(memory_size, units).with_bias(false).init(device),
        }
    }

    /// encoder_outputs: [steps, batch, width] time-major
    pub fn prepare(&self, encoder_outputs: Tensor<B, 3>, lengths: &[usize]) -> AttentionMemory<B> {
        let values = encoder_outputs.swap_dims(0, 1);
        let [batch, steps, _] = values.dims();
        let keys = self.memory_layer.forward(values.clone());

        let padding: Vec<i32> = lengths
            .iter()
            .flat_map(|&len| (0..steps).map(move |t| i32::from(t >= len)))
            .collect();
        let padding = Tensor::<B, 1, Int>::from_ints(padding.as_slice(), &values.device())
            .reshape([batch, steps])
            .equal_elem(1);

        AttentionMemory { keys, values, padding }
    }

    /// query: [batch, units] → (context [batch, width], alignments [batch, steps])
    pub fn attend(&self, memory: &AttentionMemory<B>, query: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch, steps, _] = memory.keys.dims();

        let scores = query
            .unsqueeze_dim::<3>(1)                         // [batch, 1, units]
            .matmul(memory.keys.clone().swap_dims(1, 2))   // [batch, 1, steps]
            .reshape([batch, steps])
            .mask_fill(memory.padding.clone(), MASKED_SCORE);
        let alignments = softmax(scores, 1);

        let context = alignments
            .clone()
            .unsqueeze_dim::<3>(1)
            .matmul(memory.values.clone())                 // [batch, 1, width]
            .reshape([batch, memory.value_size()]);

        (context, alignments)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_alignments_sum_to_one_and_skip_padding() {
        let device = Default::default();
        let attention: LuongAttention<TB> = LuongAttention::new(4, 3, &device);

        let outputs = Tensor::<TB, 3>::ones([5, 2, 4], &device);
        let memory  = attention.prepare(outputs, &[2, 5]);
        assert_eq!(memory.value_size(), 4);
        assert_eq!(memory.batch_size(), 2);

        let (context, alignments) = attention.attend(&memory, Tensor::ones([2, 3], &device));
        assert_eq!(context.dims(), [2, 4]);
        assert_eq!(alignments.dims(), [2, 5]);

        let weights: Vec<f32> = alignments.into_data().iter::<f32>().collect();
        let first: f32  = weights[0..5].iter().sum();
        let second: f32 = weights[5..10].iter().sum();
        assert!((first - 1.0).abs() < 1e-5);
        assert!((second - 1.0).abs() < 1e-5);
        // instance 0 has length 2: positions 2.. get no weight
        assert!(weights[2..5].iter().all(|&w| w < 1e-6));
    }
}
