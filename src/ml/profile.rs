// ============================================================
// Layer 5 — Model Profiler
// ============================================================
// The three numbers printed at the end of every run:
//
//   params   → module.num_params()
//   FLOPs    → multiply-accumulates of every conv / linear
//              layer for one 32x32 image
//   latency  → mean wall time of one forward pass over a
//              100-image batch, averaged over 100 timed calls
//              after one warm-up call
//
// Tensor operations are lazy on the GPU backends, so every
// timed forward is synchronised by reading its output back.

use std::time::{Duration, Instant};

use burn::{
    nn::{conv::Conv2d, Linear},
    prelude::*,
    tensor::Distribution,
};

use crate::data::dataset::{CHANNELS, IMAGE_SIZE};
use crate::ml::model::ImageClassifier;

pub const LATENCY_BATCH:      usize = 100;
pub const LATENCY_ITERATIONS: usize = 100;

/// Multiply-accumulates of one conv for one image, and its output size.
///
/// Padding is assumed to be `kernel / 2`, which holds for every conv
/// built in this crate.
pub fn conv_macs<B: Backend>(conv: &Conv2d<B>, stride: usize, input: [usize; 2]) -> (u64, [usize; 2]) {
    let [out_channels, in_per_group, kh, kw] = conv.weight.val().dims();
    let out = [
        (input[0] + 2 * (kh / 2) - kh) / stride + 1,
        (input[1] + 2 * (kw / 2) - kw) / stride + 1,
    ];
    let macs = (out[0] * out[1] * out_channels * in_per_group * kh * kw) as u64;
    (macs, out)
}

pub fn linear_macs<B: Backend>(linear: &Linear<B>) -> u64 {
    let [d_in, d_out] = linear.weight.val().dims();
    (d_in * d_out) as u64
}

// ─── ModelProfile ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    pub params:     usize,
    pub flops:      u64,
    pub latency_ms: f64,
}

impl ModelProfile {
    pub fn measure<B: Backend, M: ImageClassifier<B>>(model: &M, device: &B::Device) -> Self {
        let latency = measure_latency(model, LATENCY_BATCH, LATENCY_ITERATIONS, device);
        Self {
            params:     model.num_parameters(),
            flops:      model.flops(),
            latency_ms: latency.as_secs_f64() * 1000.0,
        }
    }

    pub fn print(&self) {
        print_size(self.params, self.flops);
        println!("Average forward time: {:.6} ms", self.latency_ms);
    }
}

pub fn print_size(params: usize, flops: u64) {
    println!("Model Parameter: {}", params);
    println!("Model FLOPs: {}", flops);
}

/// Mean duration of one forward pass over a random batch.
pub fn measure_latency<B: Backend, M: ImageClassifier<B>>(
    model:      &M,
    batch_size: usize,
    iterations: usize,
    device:     &B::Device,
) -> Duration {
    let input = Tensor::<B, 4>::random(
        [batch_size, CHANNELS, IMAGE_SIZE, IMAGE_SIZE],
        Distribution::Default,
        device,
    );

    // ── Warm-up: kernel compilation and allocator priming ──────────────────
    let _ = model.logits(input.clone()).into_data();

    let iterations = iterations.max(1);
    let started    = Instant::now();
    for _ in 0..iterations {
        let _ = model.logits(input.clone()).into_data();
    }
    let mean = started.elapsed() / iterations as u32;

    tracing::debug!("Forward latency over {} calls: {:?}", iterations, mean);
    mean
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::{conv::Conv2dConfig, LinearConfig, PaddingConfig2d};

    type TestBackend = NdArray;

    #[test]
    fn test_conv3x3_macs() {
        let device = Default::default();
        let conv: Conv2d<TestBackend> = Conv2dConfig::new([3, 8], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(&device);
        let (macs, out) = conv_macs(&conv, 1, [32, 32]);
        assert_eq!(out, [32, 32]);
        assert_eq!(macs, 32 * 32 * 8 * 3 * 9);
    }

    #[test]
    fn test_strided_grouped_conv_macs() {
        let device = Default::default();
        let conv: Conv2d<TestBackend> = Conv2dConfig::new([8, 8], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_groups(8)
            .init(&device);
        let (macs, out) = conv_macs(&conv, 2, [32, 32]);
        assert_eq!(out, [16, 16]);
        // depthwise: one input channel per output channel
        assert_eq!(macs, 16 * 16 * 8 * 9);
    }

    #[test]
    fn test_linear_macs() {
        let device = Default::default();
        let linear: Linear<TestBackend> = LinearConfig::new(512, 10).init(&device);
        assert_eq!(linear_macs(&linear), 5120);
    }
}
