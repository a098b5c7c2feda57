// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. The other layers hand in plain
// token sequences and get plain token sequences back.
//
// What's in this layer:
//
//   cell.rs       — GRU and LSTM cells behind one RecurrentCell
//                   trait, with a tagged state (single / pair)
//
//   encoder.rs    — simple or bidirectional encoder, respecting
//                   per-instance lengths
//
//   attention.rs  — Luong (dot-product) attention over the
//                   encoder outputs, padding masked
//
//   decoder.rs    — decoder driver: teacher forcing for training,
//                   greedy feedback for inference
//
//   loss.rs       — weighted sequence cross-entropy
//
//   model.rs      — Seq2SeqConfig and the model owning every weight
//
//   trainer.rs    — copy-task training loop with Adam and a clean
//                   stop on interrupt
//
//   inferencer.rs — greedy decoding of raw sequences, optionally
//                   from a checkpoint
//
// Backends: NdArray on the CPU by default; the `wgpu` cargo
// feature switches to the GPU. Training wraps either in Autodiff.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Sutskever et al. (2014) Sequence to Sequence Learning
//            Luong et al. (2015) Attention-based NMT

pub mod cell;
pub mod encoder;
pub mod attention;
pub mod decoder;
pub mod loss;
pub mod model;
pub mod trainer;
pub mod inferencer;

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;
#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<InferBackend>;
