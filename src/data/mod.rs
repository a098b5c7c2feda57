// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between raw token sequences and model-ready
// tensor feeds:
//
//   CopyTask          → random (input, target) sequence pairs
//       │
//       ▼
//   batch()           → time-major PAD-padded batch + lengths,
//       │               decoder feeds derived on the host
//       ▼
//   Seq2SeqBatcher    → Int / Float tensors on the device
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Time-major padding and the teacher-forcing feeds
pub mod batch;

/// Random copy-task sequences
pub mod generator;

/// Builds the tensor feeds for training and inference
pub mod batcher;
