// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From dataset files on disk to tensor batches:
//
//   binary dataset files
//       │
//       ▼
//   DatasetLoader     → parses records into ImageSamples
//       │
//       ▼
//   split_train_val   → holds out a validation part (train only)
//       │
//       ▼
//   ImageDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   ImageBatcher      → augments (train) + normalises, stacks
//       │
//       ▼
//   DataLoader        → feeds batches to training / evaluation
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads CIFAR-10/100, SVHN and MNIST binary files
pub mod loader;

/// Normalisation and training augmentation
pub mod preprocessor;

/// Implements Burn's Dataset trait for image samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffle + train/validation split
pub mod splitter;
