// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<ImageSample>
// into tensors:
//
//   images: [N, 3, 32, 32] float, normalised
//   labels: [N]            int
//
// The training loader uses a batcher with augmentation, the
// validation/test loaders one without, so evaluation always
// sees the images exactly as stored.
//
// Reference: Burn Book §4 (Batcher)

use std::sync::Arc;

use burn::{
    data::dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
    prelude::*,
};

use crate::data::dataset::{ImageDataset, ImageSample, CHANNELS, IMAGE_SIZE};
use crate::data::preprocessor::{Augmentation, Normalization};

// ─── ImageBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// shape: [batch_size, 3, 32, 32]
    pub images: Tensor<B, 4>,

    /// Ground truth class per image — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher {
    normalization: Normalization,
    augmentation:  Option<Augmentation>,
}

impl ImageBatcher {
    /// Batcher for evaluation: normalise only.
    pub fn new(normalization: Normalization) -> Self {
        Self { normalization, augmentation: None }
    }

    /// Batcher for training: augment, then normalise.
    pub fn with_augmentation(normalization: Normalization, augmentation: Augmentation) -> Self {
        Self { normalization, augmentation: Some(augmentation) }
    }
}

impl<B: Backend> Batcher<B, ImageSample, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageSample>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let mut rng    = rand::thread_rng();

        // ── Flatten pixels ────────────────────────────────────────────────────
        let images_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| {
                let pixels = match &self.augmentation {
                    Some(aug) => aug.apply(&s.pixels, &mut rng),
                    None      => s.pixels.clone(),
                };
                self.normalization.apply(&pixels)
            })
            .collect();

        let labels: Vec<i64> = items.iter().map(|s| s.label as i64).collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(images_flat, [batch_size, CHANNELS, IMAGE_SIZE, IMAGE_SIZE]),
            device,
        );
        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]),
            device,
        );

        ImageBatch { images, labels }
    }
}

// ─── Loader ───────────────────────────────────────────────────────────────────
/// Wrap `dataset` in a Burn DataLoader on `device`.
/// `shuffle_seed` is set for training loaders only.
pub fn build_loader<B: Backend>(
    batcher:      ImageBatcher,
    dataset:      ImageDataset,
    batch_size:   usize,
    num_workers:  usize,
    shuffle_seed: Option<u64>,
    device:       &B::Device,
) -> Arc<dyn DataLoader<B, ImageBatch<B>>> {
    let mut builder = DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .num_workers(num_workers)
        .set_device(device.clone());
    if let Some(seed) = shuffle_seed {
        builder = builder.shuffle(seed);
    }
    builder.build(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::PIXELS_PER_IMAGE;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes_and_labels() {
        let device  = Default::default();
        let batcher = ImageBatcher::new(Normalization { mean: [0.0; 3], std: [1.0; 3] });
        let items   = vec![
            ImageSample::new(vec![255; PIXELS_PER_IMAGE], 4),
            ImageSample::new(vec![0; PIXELS_PER_IMAGE], 1),
        ];

        let batch: ImageBatch<TestBackend> = batcher.batch(items, &device);
        assert_eq!(batch.images.dims(), [2, 3, 32, 32]);

        let labels: Vec<i64> = batch.labels.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(labels, vec![4, 1]);

        let max: f32 = batch.images.max().into_scalar().elem();
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_loader_yields_every_sample_once() {
        let device  = Default::default();
        let batcher = ImageBatcher::new(Normalization { mean: [0.0; 3], std: [1.0; 3] });
        let samples = (0..5).map(|i| ImageSample::new(vec![0; PIXELS_PER_IMAGE], i)).collect();

        let loader = build_loader::<TestBackend>(batcher, ImageDataset::new(samples), 2, 1, None, &device);
        let sizes: Vec<usize> = loader.iter().map(|b| b.labels.dims()[0]).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }
}
