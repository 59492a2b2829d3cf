// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the disk outside of dataset reading:
//
//   checkpoint.rs — Saving and restoring model weights under
//                   their checkpoint key, plus the run's
//                   configuration as JSON next to them.
//
//   run_log.rs    — The per-model text log. Training truncates
//                   it, testing appends to it; each epoch adds
//                   one line of metrics.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Per-run text log with epoch metrics
pub mod run_log;
