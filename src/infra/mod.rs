// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting concerns that don't belong in
// any specific business layer:
//
//   checkpoint.rs — Saving and loading model weights per variant
//                   with Burn's CompactRecorder, plus the
//                   TrainConfig as JSON so inference can rebuild
//                   the model.
//
//   metrics.rs    — Per-step loss history written to a CSV file
//                   for later plotting.
//
//   interrupt.rs  — The Ctrl-C flag the training loop polls
//                   between steps.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training loss CSV logger
pub mod metrics;

/// Shared interrupt flag and Ctrl-C handler
pub mod interrupt;
