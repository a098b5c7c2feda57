// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that every other layer agrees on:
//
//   tokens.rs — reserved token ids (PAD, EOS) and sequence helpers
//   error.rs  — the typed error taxonomy of the model core
//   traits.rs — abstractions the data and ml layers implement
//
// No Burn types are allowed in here, so everything in this
// layer is testable without a tensor backend.

/// Reserved token ids and sequence helpers
pub mod tokens;

/// Typed errors raised by model construction and batching
pub mod error;

/// Core abstractions (traits) that other layers implement
pub mod traits;
