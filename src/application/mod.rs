// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training, a debug check or a demo decode).
//
// Rules for this layer:
//   - No tensor code here
//   - No printing here (that's Layer 1)
//   - No direct file access (that's Layer 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Training of both model variants
pub mod train_use_case;

// Debug check and demo decoding
pub mod infer_use_case;
