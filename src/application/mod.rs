// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training or testing a classifier).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - No direct file formats (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Both use cases are generic over the Burn backend; Layer 1
// picks the concrete one.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// Paths and loop settings that are not part of the checkpoint identity
pub mod options;

/// Configuration → network, including the FALCON conversion
pub mod network_builder;

/// Configuration header and profile footer of a run
pub mod report;

// The training workflow
pub mod train_use_case;

// The evaluation workflow
pub mod test_use_case;
