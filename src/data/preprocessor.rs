// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns raw CHW bytes into normalised floats, and during
// training applies the standard CIFAR-style augmentation:
//
//   1. Zero-pad by 4 pixels on every side
//   2. Take a random 32x32 crop of the padded image
//   3. Flip horizontally with probability 1/2
//      (not for digit datasets, a mirrored 3 is not a 3)
//
// Normalisation: x = (byte / 255 - mean[c]) / std[c]
// with per-channel statistics of each dataset.

use rand::Rng;

use crate::data::dataset::{CHANNELS, IMAGE_SIZE, PIXELS_PER_IMAGE};
use crate::domain::config::DatasetKind;

/// Per-channel normalisation statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; CHANNELS],
    pub std:  [f32; CHANNELS],
}

impl Normalization {
    pub fn for_dataset(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Cifar10 => Self {
                mean: [0.4914, 0.4822, 0.4465],
                std:  [0.2023, 0.1994, 0.2010],
            },
            DatasetKind::Cifar100 => Self {
                mean: [0.5071, 0.4865, 0.4409],
                std:  [0.2673, 0.2564, 0.2762],
            },
            DatasetKind::Svhn => Self {
                mean: [0.4377, 0.4438, 0.4728],
                std:  [0.1980, 0.2010, 0.1970],
            },
            DatasetKind::Mnist => Self {
                mean: [0.1307; CHANNELS],
                std:  [0.3081; CHANNELS],
            },
        }
    }

    /// Normalise one CHW byte image into floats.
    pub fn apply(&self, pixels: &[u8]) -> Vec<f32> {
        let plane = IMAGE_SIZE * IMAGE_SIZE;
        pixels
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let c = i / plane;
                (p as f32 / 255.0 - self.mean[c]) / self.std[c]
            })
            .collect()
    }
}

/// Training-time augmentation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Augmentation {
    pub pad:  usize,
    pub flip: bool,
}

impl Augmentation {
    pub fn for_dataset(kind: DatasetKind) -> Self {
        let flip = matches!(kind, DatasetKind::Cifar10 | DatasetKind::Cifar100);
        Self { pad: 4, flip }
    }

    /// Random padded crop (+ optional mirror) of one CHW byte image.
    pub fn apply<R: Rng + ?Sized>(&self, pixels: &[u8], rng: &mut R) -> Vec<u8> {
        debug_assert_eq!(pixels.len(), PIXELS_PER_IMAGE);
        let dy     = rng.gen_range(0..=2 * self.pad) as isize - self.pad as isize;
        let dx     = rng.gen_range(0..=2 * self.pad) as isize - self.pad as isize;
        let mirror = self.flip && rng.gen_bool(0.5);
        crop_shift(pixels, dy, dx, mirror)
    }
}

/// Output pixel (y, x) reads input (y + dy, x + dx), zero outside.
fn crop_shift(pixels: &[u8], dy: isize, dx: isize, mirror: bool) -> Vec<u8> {
    let side  = IMAGE_SIZE as isize;
    let plane = IMAGE_SIZE * IMAGE_SIZE;
    let mut out = vec![0u8; PIXELS_PER_IMAGE];

    for c in 0..CHANNELS {
        for y in 0..side {
            let sy = y + dy;
            if !(0..side).contains(&sy) {
                continue;
            }
            for x in 0..side {
                let ox = if mirror { side - 1 - x } else { x };
                let sx = x + dx;
                if !(0..side).contains(&sx) {
                    continue;
                }
                out[c * plane + (y * side + ox) as usize] =
                    pixels[c * plane + (sy * side + sx) as usize];
            }
        }
    }
    out
}
