// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Networks, their building blocks and the loops that train
// and evaluate them. The other layers only see `Network<B>`
// and the `ImageClassifier` trait; the layer math stays here.
//
// What's in this layer:
//
//   conv.rs      — The six interchangeable convolution units
//                  (standard, FALCON, the two branch variants,
//                  MobileNetV2 and ShuffleNet units)
//
//   model.rs     — VGG16/19 and ResNet18/34 built from a
//                  `NetworkConfig`, plus the classifier trait
//
//   falcon.rs    — Standard → FALCON conversion, optionally
//                  initialised from a rank-k kernel factorisation
//
//   trainer.rs   — Epoch loop with step-decayed learning rate
//                  and best-validation-model selection
//
//   evaluator.rs — Accuracy and inference time over a loader
//
//   profile.rs   — Parameter count, MACs and forward latency
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Jang et al. (2020) FALCON

/// Convolution units and channel shuffle
pub mod conv;

/// VGG and ResNet architectures
pub mod model;

/// Low-rank conversion of standard convolutions
pub mod falcon;

/// Training loop with validation each epoch
pub mod trainer;

/// Accuracy + timing over a batch stream
pub mod evaluator;

/// Parameters, FLOPs and latency
pub mod profile;
