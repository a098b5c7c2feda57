// ============================================================
// Layer 5 — Decoder Driver
// ============================================================
// Steps one recurrent cell through time in two modes that share
// every weight and the same initial state (the encoder's final
// state):
//
//   Teacher forcing (training)
//     step t reads the embedding of the true token t of the
//     EOS-prefixed target, whatever the model predicted.
//     Runs exactly max(decoder_train_length) steps.
//
//   Greedy (inference)
//     step 0 reads the EOS embedding for every instance,
//     step t reads the embedding of argmax(logits_{t−1}).
//     Runs until every instance has emitted EOS or the step
//     limit is hit. Finished instances emit PAD from then on.
//
// With attention enabled the cell is wrapped:
//
//   cell input  = [embedding ; previous context]   (zeros at step 0)
//   cell output → Luong attention over encoder outputs → context
//   step output = context
//
// Both loops are explicit state machines over
// (decoder state, current input, finished flags).

use burn::{
    nn::{Embedding, Linear},
    prelude::*,
};

use crate::domain::error::{ModelError, Result as ModelResult};
use crate::domain::tokens::{truncate_at_eos, TokenSequence, EOS, PAD};
use crate::ml::attention::{AttentionMemory, LuongAttention};
use crate::ml::cell::{Cell, CellConfig, CellState, RecurrentCell};

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    cell:        Cell<B>,
    attention:   Option<LuongAttention<B>>,
    output_size: usize,
}

/// Decoder state: the cell state plus, with attention, the last context vector.
#[derive(Debug, Clone)]
pub struct DecoderState<B: Backend> {
    pub cell:      CellState<B>,
    pub attention: Option<Tensor<B, 2>>,
}

/// Everything one greedy decoding run produced.
#[derive(Debug, Clone)]
pub struct GreedyTrace<B: Backend> {
    /// [steps, batch, vocab]
    pub logits:  Tensor<B, 3>,
    /// Time-major predicted ids, PAD after an instance emitted EOS
    pub tokens:  Vec<Vec<u32>>,
    /// Tokens generated per instance, EOS included
    pub lengths: Vec<usize>,
}

impl<B: Backend> GreedyTrace<B> {
    pub fn steps(&self) -> usize {
        self.tokens.len()
    }

    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// Per-instance outputs, each cut after its EOS
    pub fn sequences(&self) -> Vec<TokenSequence> {
        (0..self.batch_size())
            .map(|i| {
                let column: Vec<u32> = self.tokens.iter().map(|row| row[i]).collect();
                truncate_at_eos(&column[..self.lengths[i]])
            })
            .collect()
    }
}

impl<B: Backend> Decoder<B> {
    /// `memory_size` is the encoder output width; `attention_units`
    /// switches the attention wrapper on.
    pub fn new(
        cell:            &CellConfig,
        embedding_size:  usize,
        memory_size:     usize,
        attention_units: Option<usize>,
        device:          &B::Device,
    ) -> Self {
        match attention_units {
            Some(units) => Self {
                cell:        cell.init(embedding_size + memory_size, device),
                attention:   Some(LuongAttention::new(memory_size, units, device)),
                output_size: memory_size,
            },
            None => Self {
                cell:        cell.init(embedding_size, device),
                attention:   None,
                output_size: cell.hidden_size,
            },
        }
    }

    pub fn has_attention(&self) -> bool {
        self.attention.is_some()
    }

    /// Width of each step's output, the input width of the projection
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Prepare encoder outputs for attention, if the wrapper is on
    pub fn memory(&self, encoder_outputs: Tensor<B, 3>, lengths: &[usize]) -> Option<AttentionMemory<B>> {
        self.attention.as_ref().map(|attn| attn.prepare(encoder_outputs, lengths))
    }

    /// Seed from the encoder's final state; the context starts at zero.
    pub fn initial_state(
        &self,
        encoder_state: CellState<B>,
        memory:        Option<&AttentionMemory<B>>,
    ) -> DecoderState<B> {
        let attention = memory.map(|m| {
            let hidden = encoder_state.hidden();
            Tensor::zeros([m.batch_size(), m.value_size()], &hidden.device())
        });
        DecoderState { cell: encoder_state, attention }
    }

    /// One step: input [batch, embedding] → output [batch, output_size]
    ///
    /// An attention decoder needs both the memory and the previous
    /// context; a plain decoder must get neither.
    pub fn step(
        &self,
        input:  Tensor<B, 2>,
        state:  DecoderState<B>,
        memory: Option<&AttentionMemory<B>>,
    ) -> ModelResult<(Tensor<B, 2>, DecoderState<B>)> {
        match (&self.attention, memory, state.attention) {
            (Some(attn), Some(memory), Some(previous)) => {
                let cell_input = Tensor::cat(vec![input, previous], 1);
                let (cell_output, cell_state) = self.cell.step(cell_input, state.cell);
                let (context, _alignments) = attn.attend(memory, cell_output);
                Ok((context.clone(), DecoderState { cell: cell_state, attention: Some(context) }))
            }
            (None, None, None) => {
                let (output, cell_state) = self.cell.step(input, state.cell);
                Ok((output, DecoderState { cell: cell_state, attention: None }))
            }
            (attn, memory, context) => Err(ModelError::ShapeMismatch(format!(
                "decoder step with attention={}, memory={}, context={}",
                attn.is_some(), memory.is_some(), context.is_some(),
            ))),
        }
    }

    /// Teacher forcing over inputs [steps, batch, embedding] → [steps, batch, output_size]
    pub fn decode_train(
        &self,
        inputs: Tensor<B, 3>,
        state:  DecoderState<B>,
        memory: Option<&AttentionMemory<B>>,
    ) -> ModelResult<Tensor<B, 3>> {
        let [steps, batch, width] = inputs.dims();
        let mut state   = state;
        let mut outputs = Vec::with_capacity(steps);

        for t in 0..steps {
            let x = inputs.clone().slice([t..t + 1, 0..batch, 0..width]).reshape([batch, width]);
            let (output, next) = self.step(x, state, memory)?;
            outputs.push(output);
            state = next;
        }

        Ok(Tensor::stack(outputs, 0))
    }

    /// Greedy decoding, feeding back the best-scoring token each step.
    pub fn decode_greedy(
        &self,
        embedding:  &Embedding<B>,
        projection: &Linear<B>,
        state:      DecoderState<B>,
        memory:     Option<&AttentionMemory<B>>,
        max_steps:  usize,
    ) -> ModelResult<GreedyTrace<B>> {
        if max_steps == 0 {
            return Err(ModelError::Configuration("max_decode_steps must be > 0".to_string()));
        }

        let hidden = state.cell.hidden();
        let [batch, _] = hidden.dims();
        let device = hidden.device();

        let mut state    = state;
        let mut input    = start_inputs(embedding, batch, &device);
        let [_, width]   = input.dims();
        let mut finished = vec![false; batch];
        let mut lengths  = vec![0usize; batch];
        let mut tokens   = Vec::new();
        let mut logits   = Vec::new();

        for step in 0..max_steps {
            let (output, next) = self.step(input, state, memory)?;
            state = next;

            let step_logits = projection.forward(output);     // [batch, vocab]
            let ids = step_logits.clone().argmax(1);           // [batch, 1]
            let predicted: Vec<u32> = ids
                .clone()
                .into_data()
                .iter::<i64>()
                .map(|id| id as u32)
                .collect();

            tokens.push(record_step(&predicted, &mut finished, &mut lengths));
            logits.push(step_logits);

            if finished.iter().all(|&f| f) {
                tracing::debug!("greedy decoding finished after {} steps", step + 1);
                break;
            }

            input = embedding.forward(ids).reshape([batch, width]);
        }

        Ok(GreedyTrace { logits: Tensor::stack(logits, 0), tokens, lengths })
    }
}

/// Fold one step of argmax ids into the greedy bookkeeping.
/// Finished instances emit PAD; an instance finishes on its EOS,
/// which still counts towards its length.
fn record_step(predicted: &[u32], finished: &mut [bool], lengths: &mut [usize]) -> Vec<u32> {
    predicted
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            if finished[i] {
                return PAD;
            }
            lengths[i] += 1;
            finished[i] = id == EOS;
            id
        })
        .collect()
}

/// The step-0 greedy input: the EOS embedding for every instance.
pub fn start_inputs<B: Backend>(embedding: &Embedding<B>, batch: usize, device: &B::Device) -> Tensor<B, 2> {
    let ids = Tensor::<B, 1, Int>::from_ints(vec![EOS as i32; batch].as_slice(), device)
        .reshape([batch, 1]);
    let embedded = embedding.forward(ids);
    let [_, _, width] = embedded.dims();
    embedded.reshape([batch, width])
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        module::Param,
        nn::{EmbeddingConfig, LinearConfig},
    };

    type TB = NdArray;

    const VOCAB: usize = 10;

    /// A projection whose logits are the bias alone, so argmax is `token` at every step
    fn constant_projection(width: usize, token: u32, device: &<TB as Backend>::Device) -> Linear<TB> {
        let mut bias = [0.0f32; VOCAB];
        bias[token as usize] = 10.0;

        let mut projection = LinearConfig::new(width, VOCAB).init::<TB>(device);
        projection.weight = Param::from_tensor(Tensor::zeros([width, VOCAB], device));
        projection.bias   = Some(Param::from_tensor(Tensor::from_floats(bias, device)));
        projection
    }

    fn plain_decoder(device: &<TB as Backend>::Device) -> (Decoder<TB>, Embedding<TB>, DecoderState<TB>) {
        let decoder = Decoder::<TB>::new(&CellConfig::new(4), 3, 4, None, device);
        let embedding = EmbeddingConfig::new(VOCAB, 3).init(device);
        let state = decoder.initial_state(decoder.cell.zero_state(2, device), None);
        (decoder, embedding, state)
    }

    #[test]
    fn test_record_step_pads_after_eos() {
        let mut finished = vec![false; 2];
        let mut lengths  = vec![0usize; 2];

        let first  = record_step(&[EOS, 5], &mut finished, &mut lengths);
        let second = record_step(&[7, EOS], &mut finished, &mut lengths);

        assert_eq!(first, vec![EOS, 5]);
        assert_eq!(second, vec![PAD, EOS]);
        assert_eq!(lengths, vec![1, 2]);
        assert_eq!(finished, vec![true, true]);
    }

    #[test]
    fn test_greedy_stops_when_every_instance_emits_eos() {
        let device = Default::default();
        let (decoder, embedding, state) = plain_decoder(&device);
        let projection = constant_projection(decoder.output_size(), EOS, &device);

        let trace = decoder.decode_greedy(&embedding, &projection, state, None, 50).unwrap();
        assert_eq!(trace.steps(), 1);
        assert_eq!(trace.lengths, vec![1, 1]);
        assert_eq!(trace.tokens, vec![vec![EOS, EOS]]);
        assert_eq!(trace.sequences(), vec![vec![EOS], vec![EOS]]);
        assert_eq!(trace.logits.dims(), [1, 2, VOCAB]);
    }

    #[test]
    fn test_greedy_without_eos_runs_to_the_bound() {
        let device = Default::default();
        let (decoder, embedding, state) = plain_decoder(&device);
        let projection = constant_projection(decoder.output_size(), 5, &device);

        let trace = decoder.decode_greedy(&embedding, &projection, state, None, 6).unwrap();
        assert_eq!(trace.steps(), 6);
        assert_eq!(trace.lengths, vec![6, 6]);
        assert!(trace.tokens.iter().flatten().all(|&id| id == 5));
    }

    #[test]
    fn test_attention_step_needs_memory() {
        let device = Default::default();
        let decoder = Decoder::<TB>::new(&CellConfig::new(4), 3, 4, Some(4), &device);
        let state = DecoderState {
            cell:      decoder.cell.zero_state(2, &device),
            attention: Some(Tensor::zeros([2, 4], &device)),
        };

        let err = decoder.step(Tensor::zeros([2, 3], &device), state, None).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch(_)));
    }
}
