// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types describing a training run and its outcome.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain structs, enums and pure functions
//
// That keeps the checkpoint naming rules and the accuracy
// arithmetic testable without a GPU or a filesystem.

// TrainingConfiguration and its enumerations
pub mod config;

// The checkpoint namer
pub mod checkpoint_key;

// Accuracy / timing of one evaluation pass
pub mod evaluation;

// Typed errors callers match on
pub mod error;
