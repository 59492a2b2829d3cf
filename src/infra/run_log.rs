// ============================================================
// Layer 6 — Run Log
// ============================================================
// One text file per training/testing run, named after the
// checkpoint key so a log always sits next to its weights:
//
//   training_log/<key>.txt
//
// Contents, in order:
//   - the configuration the run was started with
//   - one line per epoch
//       epoch=3 lr=0.010000 train_loss=1.234567 train_acc=55.12 val_acc=53.80 time=41.2s
//   - every validation block written by the evaluation loop
//   - the final model profile
//
// Training recreates the file, so a rerun with the same key
// replaces the old log as it replaces the checkpoint. Testing
// appends to the log of the model it tests.

use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::checkpoint_key::CheckpointKey;

/// Numbers recorded for one training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch: usize,

    /// Learning rate used for this epoch
    pub learning_rate: f64,

    /// Mean cross-entropy over the training batches
    pub train_loss: f64,

    /// Top-1 accuracy on the augmented training batches, in percent
    pub train_accuracy: f64,

    /// Top-1 accuracy on the held-out validation split, in percent
    pub val_accuracy: f64,

    pub elapsed_secs: f64,
}

impl EpochMetrics {
    /// True if this epoch beats the best validation accuracy so far.
    pub fn is_improvement(&self, best_val_accuracy: Option<f64>) -> bool {
        best_val_accuracy.map_or(true, |best| self.val_accuracy > best)
    }
}

pub struct RunLog {
    path:   PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    /// Create (or truncate) `<dir>/<key>.txt`.
    pub fn create(dir: impl AsRef<Path>, key: &CheckpointKey) -> Result<Self> {
        Self::open(dir.as_ref(), key, false)
    }

    /// Open `<dir>/<key>.txt` for appending, creating it if needed.
    pub fn append(dir: impl AsRef<Path>, key: &CheckpointKey) -> Result<Self> {
        Self::open(dir.as_ref(), key, true)
    }

    fn open(dir: &Path, key: &CheckpointKey, append: bool) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;

        let path = dir.join(key.file_name("txt"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .with_context(|| format!("Cannot open run log '{}'", path.display()))?;

        tracing::debug!("Run log: '{}'", path.display());
        Ok(Self { path, writer: BufWriter::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Free-form line.
    pub fn line(&mut self, text: impl AsRef<str>) -> Result<()> {
        writeln!(self.writer, "{}", text.as_ref())?;
        Ok(())
    }

    pub fn log_epoch(&mut self, m: &EpochMetrics) -> Result<()> {
        writeln!(
            self.writer,
            "epoch={} lr={:.6} train_loss={:.6} train_acc={:.2} val_acc={:.2} time={:.1}s",
            m.epoch,
            m.learning_rate,
            m.train_loss,
            m.train_accuracy,
            m.val_accuracy,
            m.elapsed_secs,
        )?;
        // flushed per epoch
        self.writer.flush()?;
        Ok(())
    }

    /// Sink for writers such as the evaluation loop's report.
    pub fn sink(&mut self) -> &mut dyn Write {
        &mut self.writer
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("Cannot flush run log '{}': {}", self.path.display(), e);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::TrainingConfiguration;

    fn metrics(epoch: usize, val_accuracy: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            learning_rate: 0.01,
            train_loss: 1.5,
            train_accuracy: 40.0,
            val_accuracy,
            elapsed_secs: 2.0,
        }
    }

    #[test]
    fn test_is_improvement() {
        let m = metrics(2, 55.0);
        assert!(m.is_improvement(None));
        assert!(m.is_improvement(Some(54.9)));
        // equal is not better: the earlier epoch is kept
        assert!(!m.is_improvement(Some(55.0)));
    }

    #[test]
    fn test_log_file_is_named_after_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let key = CheckpointKey::for_save(&TrainingConfiguration::default());

        let path = {
            let mut log = RunLog::create(dir.path().join("training_log"), &key).unwrap();
            log.line("start").unwrap();
            log.log_epoch(&metrics(1, 50.0)).unwrap();
            writeln!(log.sink(), "tail").unwrap();
            log.path().to_path_buf()
        };

        assert_eq!(path.file_name().unwrap().to_str().unwrap(), key.file_name("txt"));
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "start");
        assert!(lines[1].starts_with("epoch=1 lr=0.010000 train_loss=1.500000"));
        assert_eq!(lines[2], "tail");
    }

    #[test]
    fn test_append_keeps_earlier_lines() {
        let dir = tempfile::tempdir().unwrap();
        let key = CheckpointKey::for_save(&TrainingConfiguration::default());

        RunLog::create(dir.path(), &key).unwrap().line("trained").unwrap();
        RunLog::append(dir.path(), &key).unwrap().line("tested").unwrap();

        let text = fs::read_to_string(dir.path().join(key.file_name("txt"))).unwrap();
        assert_eq!(text, "trained\ntested\n");
    }
}
