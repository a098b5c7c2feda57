// ============================================================
// Layer 5 — Encoder
// ============================================================
// Runs recurrent cells over an embedded, time-major batch.
//
//   Simple:        one cell, forward in time
//   Bidirectional: a forward cell plus a backward cell run over
//                  each instance's sequence reversed in place
//                  (only the first len_i steps are reversed)
//
// Per-instance lengths are respected: once t >= len_i the
// state of instance i is frozen and its output row is zero,
// so padding never leaks into the final state.
//
// Bidirectional outputs and states are concatenated along the
// feature axis, doubling their width.

use burn::prelude::*;

use crate::domain::error::{ModelError, Result};
use crate::ml::cell::{Cell, CellConfig, CellKind, CellState, RecurrentCell};

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    forward_cell:  Cell<B>,
    /// Independent backward cell; `None` with two directions
    /// means the forward cell is reused for both.
    backward_cell: Option<Cell<B>>,
    directions:    usize,
}

/// What the encoder hands to the decoder
#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    /// [max_len, batch, hidden × directions]
    pub outputs: Tensor<B, 3>,
    /// Final state, feature width hidden × directions
    pub state:   CellState<B>,
}

impl<B: Backend> Encoder<B> {
    pub fn new(
        cell:          &CellConfig,
        input_size:    usize,
        bidirectional: bool,
        share_cell:    bool,
        device:        &B::Device,
    ) -> Self {
        let backward_cell = (bidirectional && !share_cell).then(|| cell.init(input_size, device));
        Self {
            forward_cell: cell.init(input_size, device),
            backward_cell,
            directions: if bidirectional { 2 } else { 1 },
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        self.directions == 2
    }

    pub fn kind(&self) -> CellKind {
        self.forward_cell.kind()
    }

    /// Width of per-step outputs and of the final state
    pub fn output_size(&self) -> usize {
        self.forward_cell.output_size() * self.directions
    }

    /// inputs: [max_len, batch, embedding], lengths: true length per instance
    pub fn forward(&self, inputs: Tensor<B, 3>, lengths: &[usize]) -> Result<EncoderOutput<B>> {
        let [steps, batch, width] = inputs.dims();
        if lengths.len() != batch {
            return Err(ModelError::ShapeMismatch(format!(
                "{} lengths for a batch of {batch} instances", lengths.len()
            )));
        }
        let device = inputs.device();
        let lengths_tensor = Tensor::<B, 1, Int>::from_ints(
            lengths.iter().map(|&l| l as i32).collect::<Vec<_>>().as_slice(),
            &device,
        );

        let (fw_outputs, fw_state) =
            run_direction(&self.forward_cell, inputs.clone(), lengths_tensor.clone());
        if !self.is_bidirectional() {
            return Ok(EncoderOutput { outputs: fw_outputs, state: fw_state });
        }

        let backward_cell = self.backward_cell.as_ref().unwrap_or(&self.forward_cell);
        let reverse = reverse_index::<B>(lengths, steps, batch, &device);

        let reversed_inputs = inputs.gather(0, reverse.clone().expand([steps, batch, width]));
        let (bw_outputs, bw_state) = run_direction(backward_cell, reversed_inputs, lengths_tensor);

        // reversing within each length is its own inverse
        let [_, _, bw_width] = bw_outputs.dims();
        let bw_outputs = bw_outputs.gather(0, reverse.expand([steps, batch, bw_width]));

        Ok(EncoderOutput {
            outputs: Tensor::cat(vec![fw_outputs, bw_outputs], 2),
            state:   fw_state.concat(bw_state)?,
        })
    }
}

/// Step one cell through time, freezing finished instances.
fn run_direction<B: Backend>(
    cell:    &Cell<B>,
    inputs:  Tensor<B, 3>,
    lengths: Tensor<B, 1, Int>,
) -> (Tensor<B, 3>, CellState<B>) {
    let [steps, batch, width] = inputs.dims();
    let device = inputs.device();

    let mut state   = cell.zero_state(batch, &device);
    let mut outputs = Vec::with_capacity(steps);

    for t in 0..steps {
        let x = inputs.clone().slice([t..t + 1, 0..batch, 0..width]).reshape([batch, width]);
        let (out, next) = cell.step(x, state.clone());

        // [batch, 1] — true once instance i has consumed all its tokens
        let done = lengths.clone().lower_equal_elem(t as i64).reshape([batch, 1]);
        state = next.keep_where(done.clone(), state);

        let [_, out_width] = out.dims();
        outputs.push(out.mask_fill(done.expand([batch, out_width]), 0.0));
    }

    (Tensor::stack(outputs, 0), state)
}

/// Time index that reverses each instance within its own length:
/// row t of instance i reads row len_i − 1 − t, padding rows stay put.
/// Shape [steps, batch, 1].
fn reverse_index<B: Backend>(
    lengths: &[usize],
    steps:   usize,
    batch:   usize,
    device:  &B::Device,
) -> Tensor<B, 3, Int> {
    let mut index = Vec::with_capacity(steps * batch);
    for t in 0..steps {
        for &len in lengths {
            let source = if t < len { len - 1 - t } else { t };
            index.push(source as i32);
        }
    }
    Tensor::<B, 1, Int>::from_ints(index.as_slice(), device).reshape([steps, batch, 1])
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn embedded(steps: usize, batch: usize, width: usize) -> Tensor<TB, 3> {
        let values: Vec<f32> = (0..steps * batch * width)
            .map(|v| ((v % 7) as f32 - 3.0) / 3.0)
            .collect();
        Tensor::<TB, 1>::from_floats(values.as_slice(), &Default::default())
            .reshape([steps, batch, width])
    }

    fn to_vec(t: Tensor<TB, 2>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_bidirectional_state_doubles_width() {
        let device = Default::default();
        for kind in [CellKind::Gru, CellKind::Lstm] {
            let cell = CellConfig::new(8).with_kind(kind);
            let simple: Encoder<TB> = Encoder::new(&cell, 4, false, false, &device);
            let bidir:  Encoder<TB> = Encoder::new(&cell, 4, true, false, &device);

            let s = simple.forward(embedded(5, 3, 4), &[5, 2, 3]).unwrap();
            let b = bidir.forward(embedded(5, 3, 4), &[5, 2, 3]).unwrap();

            assert_eq!(s.state.hidden().dims()[1], 8);
            assert_eq!(b.state.hidden().dims()[1], 2 * s.state.hidden().dims()[1]);
            assert_eq!(s.outputs.dims(), [5, 3, 8]);
            assert_eq!(b.outputs.dims(), [5, 3, 16]);
            assert_eq!(matches!(b.state, CellState::Pair { .. }), kind == CellKind::Lstm);
        }
    }

    #[test]
    fn test_padding_does_not_change_final_state() {
        let device = Default::default();
        let cell = CellConfig::new(6);
        let encoder: Encoder<TB> = Encoder::new(&cell, 4, true, false, &device);

        let padded = embedded(5, 2, 4);
        // instance 0 alone, cut to its true length of 2
        let alone = padded.clone().slice([0..2, 0..1, 0..4]);

        let batched = encoder.forward(padded, &[2, 5]).unwrap();
        let single  = encoder.forward(alone, &[2]).unwrap();

        let batched_h = to_vec(batched.state.hidden().slice([0..1, 0..12]));
        let single_h  = to_vec(single.state.hidden());
        for (a, b) in batched_h.iter().zip(&single_h) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_outputs_past_length_are_zero() {
        let device = Default::default();
        let encoder: Encoder<TB> = Encoder::new(&CellConfig::new(3), 4, false, false, &device);
        let out = encoder.forward(embedded(4, 2, 4), &[1, 4]).unwrap();

        let tail: Vec<f32> = out.outputs.slice([1..4, 0..1, 0..3]).into_data().iter::<f32>().collect();
        assert!(tail.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_shared_backward_cell_has_fewer_parameters() {
        let device = Default::default();
        let cell = CellConfig::new(4);
        let shared:      Encoder<TB> = Encoder::new(&cell, 3, true, true, &device);
        let independent: Encoder<TB> = Encoder::new(&cell, 3, true, false, &device);

        assert!(shared.num_params() < independent.num_params());
        let out = shared.forward(embedded(3, 2, 3), &[3, 2]).unwrap();
        assert_eq!(out.state.hidden().dims()[1], 8);
    }

    #[test]
    fn test_length_count_must_match_batch() {
        let device = Default::default();
        let encoder: Encoder<TB> = Encoder::new(&CellConfig::new(3), 4, false, false, &device);
        assert!(matches!(
            encoder.forward(embedded(2, 2, 4), &[2]),
            Err(ModelError::ShapeMismatch(_))
        ));
    }
}
