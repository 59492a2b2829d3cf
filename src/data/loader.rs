// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Reads the four supported datasets from their binary
// distributions under a data root:
//
//   cifar10   cifar-10-batches-bin/data_batch_{1..5}.bin
//             cifar-10-batches-bin/test_batch.bin
//             record = <label u8><3072 bytes CHW>
//
//   cifar100  cifar-100-binary/{train,test}.bin
//             record = <coarse u8><fine u8><3072 bytes CHW>
//             (the fine label is used)
//
//   svhn      svhn/{train,test}.bin
//             same record layout as cifar10
//
//   mnist     mnist/{train,t10k}-images-idx3-ubyte
//             mnist/{train,t10k}-labels-idx1-ubyte
//             28x28 gray, zero padded to 32x32 and replicated
//             to three channels
//
// The byte parsers are pure functions so they can be tested
// with synthetic buffers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::data::dataset::{ImageSample, CHANNELS, IMAGE_SIZE, PIXELS_PER_IMAGE};
use crate::domain::config::DatasetKind;
use crate::domain::error::DataError;

const MNIST_IMAGE_MAGIC: u32 = 0x0000_0803;
const MNIST_LABEL_MAGIC: u32 = 0x0000_0801;
const MNIST_SIDE:        usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

/// Loads one dataset kind from a data root directory.
pub struct DatasetLoader {
    root: PathBuf,
    kind: DatasetKind,
}

impl DatasetLoader {
    pub fn new(root: impl Into<PathBuf>, kind: DatasetKind) -> Self {
        Self { root: root.into(), kind }
    }

    pub fn load(&self, split: Split) -> Result<Vec<ImageSample>, DataError> {
        let classes = self.kind.num_classes();
        let samples = match self.kind {
            DatasetKind::Cifar10 => {
                let dir = self.root.join("cifar-10-batches-bin");
                let files: Vec<PathBuf> = match split {
                    Split::Train => (1..=5).map(|i| dir.join(format!("data_batch_{i}.bin"))).collect(),
                    Split::Test  => vec![dir.join("test_batch.bin")],
                };
                let mut all = Vec::new();
                for file in files {
                    all.extend(parse_label_first_records(&read(&file)?, 1, 0, classes)?);
                }
                all
            }
            DatasetKind::Cifar100 => {
                let file = self.root.join("cifar-100-binary").join(split_file(split));
                parse_label_first_records(&read(&file)?, 2, 1, classes)?
            }
            DatasetKind::Svhn => {
                let file = self.root.join("svhn").join(split_file(split));
                parse_label_first_records(&read(&file)?, 1, 0, classes)?
            }
            DatasetKind::Mnist => {
                let prefix = match split {
                    Split::Train => "train",
                    Split::Test  => "t10k",
                };
                let dir    = self.root.join("mnist");
                let images = read(&dir.join(format!("{prefix}-images-idx3-ubyte")))?;
                let labels = read(&dir.join(format!("{prefix}-labels-idx1-ubyte")))?;
                parse_mnist(&images, &labels)?
            }
        };

        tracing::info!(
            "Loaded {} {:?} samples of {} from '{}'",
            samples.len(),
            split,
            self.kind,
            self.root.display()
        );
        Ok(samples)
    }
}

fn split_file(split: Split) -> &'static str {
    match split {
        Split::Train => "train.bin",
        Split::Test  => "test.bin",
    }
}

fn read(path: &Path) -> Result<Vec<u8>, DataError> {
    tracing::debug!("Reading '{}'", path.display());
    fs::read(path).map_err(|source| DataError::Io { path: path.to_path_buf(), source })
}

/// Parse fixed-size records of `label_bytes` label bytes followed by
/// one 3x32x32 image. `label_index` picks which label byte is the class.
pub fn parse_label_first_records(
    bytes:       &[u8],
    label_bytes: usize,
    label_index: usize,
    num_classes: usize,
) -> Result<Vec<ImageSample>, DataError> {
    let record_len = label_bytes + PIXELS_PER_IMAGE;
    if bytes.len() % record_len != 0 {
        return Err(DataError::Malformed(format!(
            "{} bytes is not a multiple of the {record_len}-byte record size",
            bytes.len()
        )));
    }

    bytes
        .chunks_exact(record_len)
        .enumerate()
        .map(|(i, record)| {
            let label = record[label_index] as usize;
            if label >= num_classes {
                return Err(DataError::Malformed(format!(
                    "record {i} has label {label}, expected < {num_classes}"
                )));
            }
            Ok(ImageSample::new(record[label_bytes..].to_vec(), label))
        })
        .collect()
}

/// Parse an MNIST idx image/label file pair.
pub fn parse_mnist(images: &[u8], labels: &[u8]) -> Result<Vec<ImageSample>, DataError> {
    let (magic, count) = (be_u32(images, 0)?, be_u32(images, 4)? as usize);
    if magic != MNIST_IMAGE_MAGIC {
        return Err(DataError::Malformed(format!("bad idx3 magic {magic:#010x}")));
    }
    let (rows, cols) = (be_u32(images, 8)? as usize, be_u32(images, 12)? as usize);
    if rows != MNIST_SIDE || cols != MNIST_SIDE {
        return Err(DataError::Malformed(format!("expected 28x28 images, got {rows}x{cols}")));
    }

    let (label_magic, label_count) = (be_u32(labels, 0)?, be_u32(labels, 4)? as usize);
    if label_magic != MNIST_LABEL_MAGIC {
        return Err(DataError::Malformed(format!("bad idx1 magic {label_magic:#010x}")));
    }
    if label_count != count {
        return Err(DataError::Malformed(format!(
            "{count} images but {label_count} labels"
        )));
    }

    let pixels = &images[16..];
    let labels = &labels[8..];
    let side   = MNIST_SIDE * MNIST_SIDE;
    if pixels.len() != count * side || labels.len() != count {
        return Err(DataError::Malformed("idx payload length does not match header".into()));
    }

    pixels
        .chunks_exact(side)
        .zip(labels)
        .map(|(gray, &label)| {
            if label > 9 {
                return Err(DataError::Malformed(format!("digit label {label}")));
            }
            Ok(ImageSample::new(pad_gray_to_rgb(gray), label as usize))
        })
        .collect()
}

/// 28x28 gray → 3x32x32, centred with a 2-pixel zero border.
fn pad_gray_to_rgb(gray: &[u8]) -> Vec<u8> {
    let offset = (IMAGE_SIZE - MNIST_SIDE) / 2;
    let mut plane = vec![0u8; IMAGE_SIZE * IMAGE_SIZE];
    for y in 0..MNIST_SIDE {
        let dst = (y + offset) * IMAGE_SIZE + offset;
        plane[dst..dst + MNIST_SIDE].copy_from_slice(&gray[y * MNIST_SIDE..(y + 1) * MNIST_SIDE]);
    }
    plane.repeat(CHANNELS)
}

fn be_u32(bytes: &[u8], at: usize) -> Result<u32, DataError> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| DataError::Malformed("truncated idx header".into()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn cifar_record(label: u8, fill: u8) -> Vec<u8> {
        let mut r = vec![label];
        r.extend(std::iter::repeat(fill).take(PIXELS_PER_IMAGE));
        r
    }

    #[test]
    fn test_parse_cifar10_records() {
        let mut bytes = cifar_record(3, 7);
        bytes.extend(cifar_record(9, 1));
        let samples = parse_label_first_records(&bytes, 1, 0, 10).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, 3);
        assert_eq!(samples[1].label, 9);
        assert!(samples[0].pixels.iter().all(|&p| p == 7));
    }

    #[test]
    fn test_cifar100_uses_fine_label() {
        let mut bytes = vec![4u8, 87u8];
        bytes.extend(vec![0u8; PIXELS_PER_IMAGE]);
        let samples = parse_label_first_records(&bytes, 2, 1, 100).unwrap();
        assert_eq!(samples[0].label, 87);
    }

    #[test]
    fn test_truncated_record_is_malformed() {
        let mut bytes = cifar_record(1, 0);
        bytes.pop();
        assert!(matches!(
            parse_label_first_records(&bytes, 1, 0, 10),
            Err(DataError::Malformed(_))
        ));
    }

    #[test]
    fn test_label_out_of_range() {
        let bytes = cifar_record(10, 0);
        assert!(parse_label_first_records(&bytes, 1, 0, 10).is_err());
    }

    fn idx_images(count: u32, fill: u8) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend(MNIST_IMAGE_MAGIC.to_be_bytes());
        b.extend(count.to_be_bytes());
        b.extend(28u32.to_be_bytes());
        b.extend(28u32.to_be_bytes());
        b.extend(vec![fill; count as usize * 28 * 28]);
        b
    }

    fn idx_labels(labels: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend(MNIST_LABEL_MAGIC.to_be_bytes());
        b.extend((labels.len() as u32).to_be_bytes());
        b.extend_from_slice(labels);
        b
    }

    #[test]
    fn test_parse_mnist_pads_and_replicates() {
        let samples = parse_mnist(&idx_images(2, 255), &idx_labels(&[5, 0])).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, 5);

        let px = &samples[0].pixels;
        assert_eq!(px.len(), PIXELS_PER_IMAGE);
        // border is zero, centre is the original pixel
        assert_eq!(px[0], 0);
        assert_eq!(px[2 * IMAGE_SIZE + 2], 255);
        // three identical planes
        let plane = IMAGE_SIZE * IMAGE_SIZE;
        assert_eq!(px[..plane], px[plane..2 * plane]);
        assert_eq!(px[..plane], px[2 * plane..]);
    }

    #[test]
    fn test_mnist_count_mismatch() {
        let err = parse_mnist(&idx_images(2, 0), &idx_labels(&[1])).unwrap_err();
        assert!(err.to_string().contains("2 images but 1 labels"));
    }

    #[test]
    fn test_mnist_bad_magic() {
        let mut images = idx_images(1, 0);
        images[3] = 0x01;
        assert!(parse_mnist(&images, &idx_labels(&[1])).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir    = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path(), DatasetKind::Svhn);
        assert!(matches!(loader.load(Split::Test), Err(DataError::Io { .. })));
    }

    #[test]
    fn test_load_svhn_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("svhn")).unwrap();
        let mut bytes = cifar_record(2, 9);
        bytes.extend(cifar_record(4, 9));
        fs::write(dir.path().join("svhn").join("train.bin"), bytes).unwrap();

        let samples = DatasetLoader::new(dir.path(), DatasetKind::Svhn)
            .load(Split::Train)
            .unwrap();
        assert_eq!(samples.iter().map(|s| s.label).collect::<Vec<_>>(), vec![2, 4]);
    }
}
