// ============================================================
// Layer 5 — Recurrent Cells
// ============================================================
// The encoder and the decoder driver accept any cell that can
//
//   step(input, state) -> (output, new_state)
//   zero_state(batch_size)
//   output_size()
//
// Two variants are provided:
//
//   GRU  — simple cell, state is a single vector h
//   LSTM — memory cell, state is the pair (c, h)
//
// The state shape is a tagged union chosen once, when the cell
// kind is picked in the config. Nothing inspects runtime types.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::{sigmoid, tanh},
};
use serde::{Deserialize, Serialize};

use crate::domain::error::{ModelError, Result as ModelResult};

/// Which recurrent cell to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    /// Gated recurrent unit, single-vector state
    Gru,
    /// Long short-term memory, (memory, hidden) state
    Lstm,
}

#[derive(Config, Debug)]
pub struct CellConfig {
    pub hidden_size: usize,
    #[config(default = "CellKind::Lstm")]
    pub kind: CellKind,
}

impl CellConfig {
    /// Build a cell reading `input_size`-wide inputs
    pub fn init<B: Backend>(&self, input_size: usize, device: &B::Device) -> Cell<B> {
        match self.kind {
            CellKind::Gru  => Cell::gru(input_size, self.hidden_size, device),
            CellKind::Lstm => Cell::lstm(input_size, self.hidden_size, device),
        }
    }
}

// ─── Cell State ───────────────────────────────────────────────────────────────
/// Recurrent state, shaped by the cell variant.
#[derive(Debug, Clone)]
pub enum CellState<B: Backend> {
    /// [batch, hidden]
    Single(Tensor<B, 2>),
    /// memory and hidden, both [batch, hidden]
    Pair { memory: Tensor<B, 2>, hidden: Tensor<B, 2> },
}

impl<B: Backend> CellState<B> {
    /// The hidden component, which is also what the cell outputs
    pub fn hidden(&self) -> Tensor<B, 2> {
        match self {
            Self::Single(h)         => h.clone(),
            Self::Pair { hidden, .. } => hidden.clone(),
        }
    }

    /// Join two states along the feature axis, component by component.
    pub fn concat(self, other: Self) -> ModelResult<Self> {
        match (self, other) {
            (Self::Single(a), Self::Single(b)) => Ok(Self::Single(Tensor::cat(vec![a, b], 1))),
            (
                Self::Pair { memory: ma, hidden: ha },
                Self::Pair { memory: mb, hidden: hb },
            ) => Ok(Self::Pair {
                memory: Tensor::cat(vec![ma, mb], 1),
                hidden: Tensor::cat(vec![ha, hb], 1),
            }),
            _ => Err(ModelError::ShapeMismatch(
                "cannot concatenate a single-vector state with a pair state".to_string(),
            )),
        }
    }

    /// Where `done` is true ([batch, 1]) keep `previous`, elsewhere take `self`.
    pub fn keep_where(self, done: Tensor<B, 2, Bool>, previous: Self) -> Self {
        let select = |new: Tensor<B, 2>, old: Tensor<B, 2>| {
            let done = done.clone().expand(new.dims());
            new.mask_where(done, old)
        };
        match (self, previous) {
            (Self::Pair { memory, hidden }, Self::Pair { memory: pm, hidden: ph }) => Self::Pair {
                memory: select(memory, pm),
                hidden: select(hidden, ph),
            },
            (Self::Single(h), Self::Single(ph)) => Self::Single(select(h, ph)),
            // variants never change within one cell
            (new, _) => new,
        }
    }
}

// ─── Cell Trait ───────────────────────────────────────────────────────────────
pub trait RecurrentCell<B: Backend> {
    /// Advance one time step: input [batch, input_size]
    fn step(&self, input: Tensor<B, 2>, state: CellState<B>) -> (Tensor<B, 2>, CellState<B>);

    /// All-zeros state for a batch
    fn zero_state(&self, batch_size: usize, device: &B::Device) -> CellState<B>;

    /// Width of the per-step output
    fn output_size(&self) -> usize;
}

// ─── Cell ─────────────────────────────────────────────────────────────────────
// The gate layout decides the variant, so there is no cell without one.
//
//   GRU   gates = W_g [x ; h] (2n), candidate = W_c [x ; r ⊙ h] (n)
//         h' = u ⊙ h + (1 − u) ⊙ c
//
//   LSTM  gates = W [x ; h] (4n) split as i, j, f, o, no candidate layer
//         c' = c ⊙ σ(f + 1) + σ(i) ⊙ tanh(j)
//         h' = tanh(c') ⊙ σ(o)
#[derive(Module, Debug)]
pub struct Cell<B: Backend> {
    gates:       Linear<B>,
    candidate:   Option<Linear<B>>,
    hidden_size: usize,
}

/// Added to the forget gate so a fresh cell starts by remembering
const FORGET_BIAS: f64 = 1.0;

impl<B: Backend> Cell<B> {
    pub fn gru(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self {
            gates:     LinearConfig::new(input_size + hidden_size, 2 * hidden_size).init(device),
            candidate: Some(LinearConfig::new(input_size + hidden_size, hidden_size).init(device)),
            hidden_size,
        }
    }

    pub fn lstm(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self {
            gates:     LinearConfig::new(input_size + hidden_size, 4 * hidden_size).init(device),
            candidate: None,
            hidden_size,
        }
    }

    pub fn kind(&self) -> CellKind {
        match self.candidate {
            Some(_) => CellKind::Gru,
            None    => CellKind::Lstm,
        }
    }

    fn gru_step(
        &self,
        candidate: &Linear<B>,
        input:     Tensor<B, 2>,
        state:     CellState<B>,
    ) -> (Tensor<B, 2>, CellState<B>) {
        let h = state.hidden();
        let [batch, _] = h.dims();
        let n = self.hidden_size;

        let gates = sigmoid(self.gates.forward(Tensor::cat(vec![input.clone(), h.clone()], 1)));
        let reset  = gates.clone().slice([0..batch, 0..n]);
        let update = gates.slice([0..batch, n..2 * n]);

        let c = tanh(candidate.forward(Tensor::cat(vec![input, reset * h.clone()], 1)));
        let next = update.clone() * h + (update.neg() + 1.0) * c;

        (next.clone(), CellState::Single(next))
    }

    fn lstm_step(&self, input: Tensor<B, 2>, state: CellState<B>) -> (Tensor<B, 2>, CellState<B>) {
        let (c, h) = match state {
            CellState::Pair { memory, hidden } => (memory, hidden),
            // a single vector seeds both components
            CellState::Single(h) => (h.clone(), h),
        };
        let [batch, _] = h.dims();
        let n = self.hidden_size;

        let z = self.gates.forward(Tensor::cat(vec![input, h], 1));
        let i = z.clone().slice([0..batch, 0..n]);
        let j = z.clone().slice([0..batch, n..2 * n]);
        let f = z.clone().slice([0..batch, 2 * n..3 * n]);
        let o = z.slice([0..batch, 3 * n..4 * n]);

        let memory = c * sigmoid(f + FORGET_BIAS) + sigmoid(i) * tanh(j);
        let hidden = tanh(memory.clone()) * sigmoid(o);

        (hidden.clone(), CellState::Pair { memory, hidden })
    }
}

impl<B: Backend> RecurrentCell<B> for Cell<B> {
    fn step(&self, input: Tensor<B, 2>, state: CellState<B>) -> (Tensor<B, 2>, CellState<B>) {
        match &self.candidate {
            Some(candidate) => self.gru_step(candidate, input, state),
            None            => self.lstm_step(input, state),
        }
    }

    fn zero_state(&self, batch_size: usize, device: &B::Device) -> CellState<B> {
        let zeros = || Tensor::zeros([batch_size, self.hidden_size], device);
        match self.kind() {
            CellKind::Gru  => CellState::Single(zeros()),
            CellKind::Lstm => CellState::Pair { memory: zeros(), hidden: zeros() },
        }
    }

    fn output_size(&self) -> usize {
        self.hidden_size
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_gru_step_shapes() {
        let device = Default::default();
        let cell: Cell<TB> = CellConfig::new(6).with_kind(CellKind::Gru).init(4, &device);
        assert_eq!(cell.kind(), CellKind::Gru);
        assert_eq!(cell.output_size(), 6);

        let state = cell.zero_state(3, &device);
        assert!(!matches!(state, CellState::Pair { .. }));
        let (out, next) = cell.step(Tensor::ones([3, 4], &device), state);
        assert_eq!(out.dims(), [3, 6]);
        assert_eq!(next.hidden().dims()[1], 6);
    }

    #[test]
    fn test_lstm_state_is_pair() {
        let device = Default::default();
        let cell: Cell<TB> = CellConfig::new(5).init(2, &device);
        assert_eq!(cell.kind(), CellKind::Lstm);

        let (out, next) = cell.step(Tensor::ones([2, 2], &device), cell.zero_state(2, &device));
        assert_eq!(out.dims(), [2, 5]);
        match next {
            CellState::Pair { memory, hidden } => {
                assert_eq!(memory.dims(), [2, 5]);
                assert_eq!(hidden.dims(), [2, 5]);
            }
            CellState::Single(_) => panic!("LSTM must carry a pair state"),
        }
    }

    #[test]
    fn test_kind_follows_gate_layout() {
        let device = Default::default();
        assert_eq!(Cell::<TB>::gru(3, 4, &device).kind(), CellKind::Gru);
        assert_eq!(Cell::<TB>::lstm(3, 4, &device).kind(), CellKind::Lstm);

        let lstm = Cell::<TB>::lstm(3, 4, &device);
        assert!(matches!(lstm.zero_state(2, &device), CellState::Pair { .. }));
        let gru = Cell::<TB>::gru(3, 4, &device);
        assert!(!matches!(gru.zero_state(2, &device), CellState::Pair { .. }));
    }

    #[test]
    fn test_cell_config_json_round_trip() {
        let config = CellConfig::new(6).with_kind(CellKind::Gru);
        let json = serde_json::to_string(&config).unwrap();
        let back: CellConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hidden_size, 6);
        assert_eq!(back.kind, CellKind::Gru);
    }

    #[test]
    fn test_concat_doubles_features() {
        let device = Default::default();
        let a = CellState::<TB>::Pair {
            memory: Tensor::zeros([2, 3], &device),
            hidden: Tensor::zeros([2, 3], &device),
        };
        let joined = a.clone().concat(a).unwrap();
        assert_eq!(joined.hidden().dims()[1], 6);

        let single = CellState::<TB>::Single(Tensor::zeros([2, 3], &device));
        let mixed = CellState::<TB>::Pair {
            memory: Tensor::zeros([2, 3], &device),
            hidden: Tensor::zeros([2, 3], &device),
        };
        assert!(single.concat(mixed).is_err());
    }

    #[test]
    fn test_keep_where_freezes_done_rows() {
        let device = Default::default();
        let old = CellState::<TB>::Single(Tensor::zeros([2, 3], &device));
        let new = CellState::<TB>::Single(Tensor::ones([2, 3], &device));
        let done = Tensor::<TB, 1, Int>::from_ints([1, 0].as_slice(), &device)
            .reshape([2, 1])
            .equal_elem(1);

        let kept: Vec<f32> = new.keep_where(done, old)
            .hidden()
            .into_data()
            .iter::<f32>()
            .collect();
        assert_eq!(kept, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }
}
