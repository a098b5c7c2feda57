// ============================================================
// Layer 5 — Seq2Seq Model
// ============================================================
// Owns every trainable weight of the encoder-decoder:
//
//   embedding   [vocab, embedding]     shared by encoder and decoder
//   encoder     one or two recurrent cells
//   decoder     one recurrent cell, optionally attention-wrapped
//   projection  [decoder output, vocab], no bias
//
// Data flow (time-major throughout):
//
//   encoder_inputs [T, B] ─embed─► encoder ─► outputs, final state
//                                                 │
//   decoder_train_inputs [T', B] ─embed─► decoder ◄┘ ─► projection ─► logits [T', B, V]
//
// Each model instance is self-contained: building two models
// gives two independent sets of weights.

use burn::{
    nn::{Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig},
    prelude::*,
};

use crate::data::batcher::{InferenceInputs, Seq2SeqBatcher, TrainInputs};
use crate::domain::error::{ModelError, Result as ModelResult};
use crate::ml::cell::CellConfig;
use crate::ml::decoder::{self, Decoder, GreedyTrace};
use crate::ml::encoder::{Encoder, EncoderOutput};
use crate::ml::loss::{sequence_loss, LossMask};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub encoder_cell:   CellConfig,
    pub decoder_cell:   CellConfig,
    pub vocab_size:     usize,
    pub embedding_size: usize,
    #[config(default = true)]
    pub bidirectional: bool,
    #[config(default = false)]
    pub attention: bool,
    /// Feed the fixed literal batch instead of caller data
    #[config(default = false)]
    pub debug: bool,
    /// Reuse the forward cell for the backward direction
    #[config(default = false)]
    pub share_bidirectional_cell: bool,
    /// Attention depth; `None` means the decoder hidden size
    #[config(default = "None")]
    pub attention_units: Option<usize>,
    #[config(default = "LossMask::TrainLength")]
    pub loss_mask: LossMask,
    /// Upper bound on greedy decoding steps
    #[config(default = 100)]
    pub max_decode_steps: usize,
}

impl Seq2SeqConfig {
    /// LSTM(10) cells, vocab 10, embedding 10, attention on, one direction.
    pub fn reference() -> Self {
        Self::new(CellConfig::new(10), CellConfig::new(10), 10, 10)
            .with_attention(true)
            .with_bidirectional(false)
    }

    /// Encoder state width: hidden × directions
    pub fn encoder_state_size(&self) -> usize {
        self.encoder_cell.hidden_size * if self.bidirectional { 2 } else { 1 }
    }

    /// Fail fast on anything that would only surface as a shape error later.
    pub fn validate(&self) -> ModelResult<()> {
        let fail = |msg: String| Err(ModelError::Configuration(msg));

        if self.vocab_size < 2 {
            return fail(format!("vocab_size must be >= 2 to hold PAD and EOS, got {}", self.vocab_size));
        }
        if self.embedding_size == 0 {
            return fail("embedding_size must be > 0".to_string());
        }
        if self.encoder_cell.hidden_size == 0 || self.decoder_cell.hidden_size == 0 {
            return fail("cell hidden sizes must be > 0".to_string());
        }
        if self.encoder_cell.kind != self.decoder_cell.kind {
            return fail(format!(
                "encoder cell {:?} and decoder cell {:?} carry different state shapes",
                self.encoder_cell.kind, self.decoder_cell.kind,
            ));
        }
        if self.encoder_state_size() != self.decoder_cell.hidden_size {
            return fail(format!(
                "encoder state width {} (hidden {} x {} directions) != decoder hidden size {}",
                self.encoder_state_size(),
                self.encoder_cell.hidden_size,
                if self.bidirectional { 2 } else { 1 },
                self.decoder_cell.hidden_size,
            ));
        }
        if self.attention {
            let units = self.attention_units.unwrap_or(self.decoder_cell.hidden_size);
            if units != self.decoder_cell.hidden_size {
                return fail(format!(
                    "attention_units {units} must equal decoder hidden size {}",
                    self.decoder_cell.hidden_size,
                ));
            }
        }
        if self.max_decode_steps == 0 {
            return fail("max_decode_steps must be > 0".to_string());
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<Seq2SeqModel<B>> {
        self.validate()?;

        // uniform in ±√3: unit variance per component
        let bound = 3.0f64.sqrt();
        let embedding = EmbeddingConfig::new(self.vocab_size, self.embedding_size)
            .with_initializer(Initializer::Uniform { min: -bound, max: bound })
            .init(device);

        let encoder = Encoder::new(
            &self.encoder_cell,
            self.embedding_size,
            self.bidirectional,
            self.share_bidirectional_cell,
            device,
        );
        let attention_units = self
            .attention
            .then(|| self.attention_units.unwrap_or(self.decoder_cell.hidden_size));
        let decoder = Decoder::new(
            &self.decoder_cell,
            self.embedding_size,
            encoder.output_size(),
            attention_units,
            device,
        );
        let projection = LinearConfig::new(decoder.output_size(), self.vocab_size)
            .with_bias(false)
            .init(device);

        let model = Seq2SeqModel {
            embedding,
            encoder,
            decoder,
            projection,
            vocab_size: self.vocab_size,
            max_decode_steps: self.max_decode_steps,
        };
        tracing::debug!(
            "built {:?} seq2seq: bidirectional={}, attention={}, {} parameters",
            self.encoder_cell.kind, self.bidirectional, self.attention, model.num_params(),
        );
        Ok(model)
    }

    /// Feed builder carrying this config's debug flag, loss mask and vocabulary
    pub fn batcher<B: Backend>(&self, device: B::Device) -> Seq2SeqBatcher<B> {
        Seq2SeqBatcher::new(device)
            .with_debug(self.debug)
            .with_loss_mask(self.loss_mask)
            .with_vocab_size(self.vocab_size)
    }
}

// ─── Model ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub embedding:    Embedding<B>,
    pub encoder:      Encoder<B>,
    pub decoder:      Decoder<B>,
    pub projection:   Linear<B>,
    vocab_size:       usize,
    max_decode_steps: usize,
}

impl<B: Backend> Seq2SeqModel<B> {
    pub fn max_decode_steps(&self) -> usize {
        self.max_decode_steps
    }

    pub fn has_attention(&self) -> bool {
        self.decoder.has_attention()
    }

    /// encoder_inputs: [max_len, batch] token ids
    pub fn encode(&self, encoder_inputs: Tensor<B, 2, Int>, lengths: &[usize]) -> ModelResult<EncoderOutput<B>> {
        self.check_tokens(&encoder_inputs)?;
        self.encoder.forward(self.embedding.forward(encoder_inputs), lengths)
    }

    /// Teacher-forced logits [train_steps, batch, vocab]
    pub fn forward_train(&self, feed: &TrainInputs<B>) -> ModelResult<Tensor<B, 3>> {
        let lengths = feed.inputs.lengths();
        if feed.inputs.batch_size() != feed.targets.batch_size() {
            return Err(ModelError::BatchSizeMismatch {
                inputs:  feed.inputs.batch_size(),
                targets: feed.targets.batch_size(),
            });
        }
        self.check_tokens(&feed.decoder_train_inputs)?;

        let encoded = self.encode(feed.encoder_inputs.clone(), lengths)?;
        let memory  = self.decoder.memory(encoded.outputs, lengths);
        let state   = self.decoder.initial_state(encoded.state, memory.as_ref());

        let embedded = self.embedding.forward(feed.decoder_train_inputs.clone());
        let outputs  = self.decoder.decode_train(embedded, state, memory.as_ref())?;
        Ok(self.projection.forward(outputs))
    }

    /// Masked mean cross-entropy of the teacher-forced logits
    pub fn forward_loss(&self, feed: &TrainInputs<B>) -> ModelResult<Tensor<B, 1>> {
        self.check_tokens(&feed.decoder_train_targets)?;
        let logits = self.forward_train(feed)?;
        Ok(sequence_loss(
            logits,
            feed.decoder_train_targets.clone(),
            feed.loss_weights.clone(),
        ))
    }

    /// Time-major argmax of the teacher-forced logits, [train_steps][batch]
    pub fn predict_train(&self, feed: &TrainInputs<B>) -> ModelResult<Vec<Vec<u32>>> {
        let logits = self.forward_train(feed)?;
        let [steps, batch, _] = logits.dims();

        let ids: Vec<u32> = logits
            .argmax(2)
            .reshape([steps, batch])
            .into_data()
            .iter::<i64>()
            .map(|id| id as u32)
            .collect();
        Ok(ids.chunks(batch).map(|row| row.to_vec()).collect())
    }

    /// Greedy decoding until every instance emits EOS or the step bound hits
    pub fn infer(&self, feed: &InferenceInputs<B>) -> ModelResult<GreedyTrace<B>> {
        let lengths = feed.inputs.lengths();
        let encoded = self.encode(feed.encoder_inputs.clone(), lengths)?;
        let memory  = self.decoder.memory(encoded.outputs, lengths);
        let state   = self.decoder.initial_state(encoded.state, memory.as_ref());

        self.decoder.decode_greedy(
            &self.embedding,
            &self.projection,
            state,
            memory.as_ref(),
            self.max_decode_steps,
        )
    }

    /// The step-0 greedy input: [batch, embedding], every row the EOS embedding
    pub fn start_inputs(&self, batch_size: usize, device: &B::Device) -> Tensor<B, 2> {
        decoder::start_inputs(&self.embedding, batch_size, device)
    }

    /// Both ends of the id range, so negative ids are caught too
    fn check_tokens(&self, ids: &Tensor<B, 2, Int>) -> ModelResult<()> {
        let min = ids.clone().min().into_scalar().elem::<i64>();
        let max = ids.clone().max().into_scalar().elem::<i64>();
        for token in [min, max] {
            if token < 0 || token as usize >= self.vocab_size {
                return Err(ModelError::TokenOutOfRange { token, vocab_size: self.vocab_size });
            }
        }
        Ok(())
    }
}
