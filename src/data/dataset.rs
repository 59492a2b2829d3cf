use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// Side length of every image fed to the networks.
pub const IMAGE_SIZE: usize = 32;
/// Every dataset is presented as RGB (MNIST is replicated).
pub const CHANNELS: usize = 3;
pub const PIXELS_PER_IMAGE: usize = CHANNELS * IMAGE_SIZE * IMAGE_SIZE;

/// One raw image in CHW byte order plus its class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSample {
    pub pixels: Vec<u8>,
    pub label:  usize,
}

impl ImageSample {
    pub fn new(pixels: Vec<u8>, label: usize) -> Self {
        debug_assert_eq!(pixels.len(), PIXELS_PER_IMAGE);
        Self { pixels, label }
    }
}

pub struct ImageDataset {
    samples: Vec<ImageSample>,
}

impl ImageDataset {
    pub fn new(samples: Vec<ImageSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
