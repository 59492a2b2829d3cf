// ============================================================
// Layer 2 — Run Options
// ============================================================
// Everything about a run that does NOT change which checkpoint
// it reads or writes: paths, loop lengths, batch size, and the
// FALCON layer shape flags. The checkpoint identity lives in
// domain::config::TrainingConfiguration.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Root containing cifar-10-batches-bin/, cifar-100-binary/, svhn/, mnist/
    pub data_dir:        PathBuf,
    /// Checkpoint store root
    pub store_dir:       PathBuf,
    /// Run log directory
    pub log_dir:         PathBuf,

    pub epochs:          usize,
    pub batch_size:      usize,
    pub lr_decay_every:  usize,
    pub num_workers:     usize,
    /// Share of the training split used for training; the rest validates
    pub train_fraction:  f64,
    pub seed:            u64,

    /// BatchNorm between FALCON's pointwise and depthwise stage
    pub falcon_bn:       bool,
    /// ReLU between FALCON's pointwise and depthwise stage
    pub falcon_relu:     bool,

    /// Explicit StandardConv/StConvBranch checkpoint to convert from
    pub stconv_path:     Option<PathBuf>,
    /// Explicit checkpoint to test
    pub restore_path:    Option<PathBuf>,
    /// Write the best model to the store after training
    pub save:            bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            data_dir:       PathBuf::from("data"),
            store_dir:      PathBuf::from("trained_model"),
            log_dir:        PathBuf::from("training_log"),
            epochs:         350,
            batch_size:     128,
            lr_decay_every: 50,
            num_workers:    2,
            train_fraction: 0.9,
            seed:           42,
            falcon_bn:      false,
            falcon_relu:    false,
            stconv_path:    None,
            restore_path:   None,
            save:           true,
        }
    }
}
