// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores model weights keyed by a CheckpointKey.
//
// File layout:
//   trained_model/
//     <key>.pkl    ← weights (named MessagePack, full precision)
//     <key>.json   ← the TrainingConfiguration that produced them
//
// Burn's file recorders replace the file extension, and keys
// contain dots (`lr=0.01`), so the record is encoded to bytes
// with NamedMpkBytesRecorder and written to the exact path
// here. Full precision keeps a save/load round trip
// bit-identical.
//
// A missing checkpoint is a typed CheckpointError::Missing.
// This module never exits the process; main() decides that.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};

use crate::domain::checkpoint_key::CheckpointKey;
use crate::domain::config::TrainingConfiguration;
use crate::domain::error::CheckpointError;

pub const WEIGHTS_EXTENSION: &str = "pkl";
pub const CONFIG_EXTENSION:  &str = "json";

type WeightsRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// Create `path` and its parents; fine if it already exists.
pub fn ensure_directory(path: &Path) -> Result<(), CheckpointError> {
    fs::create_dir_all(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Stores checkpoints under one root directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<key>.pkl`
    pub fn weights_path(&self, key: &CheckpointKey) -> PathBuf {
        self.root.join(key.file_name(WEIGHTS_EXTENSION))
    }

    /// Serialise `model` to `<root>/<key>.pkl`, replacing any earlier file.
    pub fn save<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        key:   &CheckpointKey,
    ) -> Result<PathBuf, CheckpointError> {
        ensure_directory(&self.root)?;
        let path = self.weights_path(key);

        let bytes = Recorder::<B>::record(&WeightsRecorder::default(), model.clone().into_record(), ())
            .map_err(|e| CheckpointError::Record { path: path.clone(), message: e.to_string() })?;
        fs::write(&path, bytes)
            .map_err(|source| CheckpointError::Io { path: path.clone(), source })?;

        println!("model saved in {}", path.display());
        Ok(path)
    }

    /// Replace the parameters of `model` with a stored checkpoint.
    ///
    /// `explicit` is used verbatim when given; otherwise the file is
    /// `<root>/<key>.pkl`. No fallback to any other file.
    pub fn load<B: Backend, M: Module<B>>(
        &self,
        model:    M,
        key:      &CheckpointKey,
        explicit: Option<&Path>,
        device:   &B::Device,
    ) -> Result<M, CheckpointError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None    => self.weights_path(key),
        };
        if !path.is_file() {
            return Err(CheckpointError::Missing { path });
        }

        let bytes = fs::read(&path)
            .map_err(|source| CheckpointError::Io { path: path.clone(), source })?;
        let record = Recorder::<B>::load(&WeightsRecorder::default(), bytes, device)
            .map_err(|e| CheckpointError::Record { path: path.clone(), message: e.to_string() })?;

        println!("model restored from {}", path.display());
        Ok(model.load_record(record))
    }

    /// Write the configuration next to its weights as `<key>.json`.
    pub fn save_config(&self, cfg: &TrainingConfiguration, key: &CheckpointKey) -> Result<PathBuf> {
        ensure_directory(&self.root)?;
        let path = self.root.join(key.file_name(CONFIG_EXTENSION));

        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(path)
    }
}
