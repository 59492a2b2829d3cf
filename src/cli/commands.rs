// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `test`, and all
// their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, and the domain
//     enums through their FromStr impls)
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::options::RunOptions;
use crate::domain::error::CheckpointError;
use crate::domain::config::{
    ConvolutionKind, DatasetKind, ModelFamily, OptimizerKind, TrainingConfiguration,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a classifier and save its best epoch
    Train(TrainArgs),

    /// Evaluate a saved classifier on the test split
    Test(TestArgs),
}

impl Commands {
    /// What to print before exiting when a required checkpoint is absent.
    pub fn missing_checkpoint_diagnostic(&self, err: &CheckpointError) -> String {
        match self {
            Commands::Train(_) => err.to_string(),
            Commands::Test(_)  => {
                format!("{err}\nTesting can only be done when the trained model exists.")
            }
        }
    }
}

/// Compute backend.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// GPU through WGPU
    Wgpu,
    /// CPU
    Ndarray,
}

/// Flags that identify the model (they form its checkpoint key).
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// StandardConv, FALCON, StConvBranch, FALCONBranch, MobileConvV2 or ShuffleUnit
    #[arg(short, long = "convolution", default_value = "StandardConv")]
    pub convolution: ConvolutionKind,

    /// VGG16, VGG19, ResNet18 or ResNet34
    #[arg(short = 'm', long, default_value = "VGG16")]
    pub model: ModelFamily,

    /// cifar10, cifar100, svhn or mnist
    #[arg(short, long = "datasets", default_value = "cifar10")]
    pub dataset: DatasetKind,

    /// Number of summed pointwise/depthwise paths in a FALCON conv
    #[arg(short = 'k', long, default_value_t = 1)]
    pub rank: usize,

    /// Weight of the side path in the branch architectures
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f64,

    /// Initialise FALCON from the standard kernels
    #[arg(long)]
    pub init: bool,

    /// L2 penalty of FALCON training
    #[arg(long, default_value_t = 0.0)]
    pub beta: f64,

    /// Groups of FALCON's pointwise conv and of ShuffleUnit
    #[arg(short = 'g', long, default_value_t = 1)]
    pub groups: usize,

    /// Channel expansion of MobileConvV2
    #[arg(long = "expansion", default_value_t = 6)]
    pub expansion: usize,

    /// SGD or Adam
    #[arg(long, default_value = "SGD")]
    pub optimizer: OptimizerKind,

    #[arg(long = "learning-rate", default_value_t = 0.01)]
    pub learning_rate: f64,

    /// BatchNorm between FALCON's pointwise and depthwise convs
    #[arg(long)]
    pub bn: bool,

    /// ReLU between FALCON's pointwise and depthwise convs
    #[arg(long)]
    pub relu: bool,
}

impl From<&ModelArgs> for TrainingConfiguration {
    fn from(a: &ModelArgs) -> Self {
        TrainingConfiguration {
            convolution:   a.convolution,
            model:         a.model,
            dataset:       a.dataset,
            rank:          a.rank,
            alpha:         a.alpha,
            init:          a.init,
            beta:          a.beta,
            groups:        a.groups,
            expansion:     a.expansion,
            optimizer:     a.optimizer,
            learning_rate: a.learning_rate,
        }
    }
}

/// Flags shared by both commands that do not change the key.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory holding the dataset folders
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Checkpoint directory
    #[arg(long, default_value = "trained_model")]
    pub store_dir: PathBuf,

    /// Run log directory
    #[arg(long, default_value = "training_log")]
    pub log_dir: PathBuf,

    #[arg(short = 'b', long, default_value_t = 128)]
    pub batch_size: usize,

    /// Data loader worker threads
    #[arg(long, default_value_t = 2)]
    pub num_workers: usize,

    #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,
}

impl RunArgs {
    fn options(&self, model: &ModelArgs) -> RunOptions {
        RunOptions {
            data_dir:    self.data_dir.clone(),
            store_dir:   self.store_dir.clone(),
            log_dir:     self.log_dir.clone(),
            batch_size:  self.batch_size,
            num_workers: self.num_workers,
            falcon_bn:   model.bn,
            falcon_relu: model.relu,
            ..RunOptions::default()
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub run: RunArgs,

    #[arg(short = 'e', long, default_value_t = 350)]
    pub epochs: usize,

    /// Divide the learning rate by 10 every this many epochs
    #[arg(long = "lr-decay-rate", default_value_t = 50)]
    pub lr_decay_rate: usize,

    /// Share of the training split used for training; the rest validates
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Checkpoint to convert FALCON/FALCONBranch from, instead of the keyed one
    #[arg(long)]
    pub stconv_path: Option<PathBuf>,

    /// Do not save the best model
    #[arg(long)]
    pub not_save: bool,
}

impl From<&TrainArgs> for RunOptions {
    fn from(a: &TrainArgs) -> Self {
        RunOptions {
            epochs:         a.epochs,
            lr_decay_every: a.lr_decay_rate,
            train_fraction: a.train_fraction,
            seed:           a.seed,
            stconv_path:    a.stconv_path.clone(),
            save:           !a.not_save,
            ..a.run.options(&a.model)
        }
    }
}

/// All arguments for the `test` command.
#[derive(Args, Debug)]
pub struct TestArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// Checkpoint to test, instead of the keyed one
    #[arg(long)]
    pub restore_path: Option<PathBuf>,
}

impl From<&TestArgs> for RunOptions {
    fn from(a: &TestArgs) -> Self {
        RunOptions {
            restore_path: a.restore_path.clone(),
            ..a.run.options(&a.model)
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["falcon-cnn", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };

        assert_eq!(TrainingConfiguration::from(&args.model), TrainingConfiguration::default());
        let options = RunOptions::from(&args);
        assert_eq!(options.epochs, 350);
        assert_eq!(options.batch_size, 128);
        assert_eq!(options.lr_decay_every, 50);
        assert!(options.save);
        assert_eq!(args.run.backend, BackendKind::Wgpu);
    }

    #[test]
    fn test_falcon_flags() {
        let cli = Cli::try_parse_from([
            "falcon-cnn", "train",
            "--convolution", "FALCON", "--model", "ResNet34", "--datasets", "svhn",
            "--rank", "2", "--init", "--groups", "2", "--bn",
            "--optimizer", "Adam", "--learning-rate", "0.001",
            "--not-save", "--backend", "ndarray",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };

        let cfg = TrainingConfiguration::from(&args.model);
        assert_eq!(cfg.convolution, ConvolutionKind::Falcon);
        assert_eq!(cfg.model, ModelFamily::ResNet34);
        assert_eq!(cfg.dataset, DatasetKind::Svhn);
        assert_eq!(cfg.rank, 2);
        assert!(cfg.init);
        assert_eq!(cfg.groups, 2);
        assert_eq!(cfg.optimizer, OptimizerKind::Adam);

        let options = RunOptions::from(&args);
        assert!(options.falcon_bn);
        assert!(!options.falcon_relu);
        assert!(!options.save);
        assert_eq!(args.run.backend, BackendKind::Ndarray);
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        assert!(Cli::try_parse_from(["falcon-cnn", "test", "--model", "AlexNet"]).is_err());
    }

    #[test]
    fn test_missing_checkpoint_diagnostic() {
        let missing = CheckpointError::Missing { path: PathBuf::from("trained_model/x.pkl") };

        let train = Cli::try_parse_from(["falcon-cnn", "train"]).unwrap();
        assert_eq!(train.command.missing_checkpoint_diagnostic(&missing), "trained_model/x.pkl does not exist.");

        let test = Cli::try_parse_from(["falcon-cnn", "test"]).unwrap();
        let text = test.command.missing_checkpoint_diagnostic(&missing);
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            ["trained_model/x.pkl does not exist.", "Testing can only be done when the trained model exists."]
        );
    }

    #[test]
    fn test_restore_path() {
        let cli = Cli::try_parse_from(["falcon-cnn", "test", "--restore-path", "w.pkl"]).unwrap();
        let Commands::Test(args) = cli.command else { panic!("expected test") };
        assert_eq!(RunOptions::from(&args).restore_path, Some(PathBuf::from("w.pkl")));
    }
}
