// ============================================================
// Layer 3 — Training Configuration
// ============================================================
// The immutable record that describes one training run.
// Every field that influences which checkpoint a run reads or
// writes lives here, and nothing else does: the checkpoint
// namer (checkpoint_key.rs) is a pure function of this struct.
//
// The enumerations parse from and render to the exact strings
// used on the command line and inside checkpoint file names,
// e.g. "FALCON", "VGG16", "cifar10", "SGD".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::ConfigError;

// ─── ConvolutionKind ──────────────────────────────────────────────────────────
/// Which convolution implementation fills the network's 3x3 slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConvolutionKind {
    StandardConv,
    #[serde(rename = "FALCON")]
    Falcon,
    StConvBranch,
    #[serde(rename = "FALCONBranch")]
    FalconBranch,
    MobileConvV2,
    ShuffleUnit,
}

impl ConvolutionKind {
    pub const ALL: [ConvolutionKind; 6] = [
        ConvolutionKind::StandardConv,
        ConvolutionKind::Falcon,
        ConvolutionKind::StConvBranch,
        ConvolutionKind::FalconBranch,
        ConvolutionKind::MobileConvV2,
        ConvolutionKind::ShuffleUnit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConvolutionKind::StandardConv => "StandardConv",
            ConvolutionKind::Falcon       => "FALCON",
            ConvolutionKind::StConvBranch => "StConvBranch",
            ConvolutionKind::FalconBranch => "FALCONBranch",
            ConvolutionKind::MobileConvV2 => "MobileConvV2",
            ConvolutionKind::ShuffleUnit  => "ShuffleUnit",
        }
    }

    /// True for the kinds whose networks are produced by converting a
    /// standard-convolution network (warm start from its checkpoint).
    pub fn is_falcon_family(&self) -> bool {
        matches!(self, ConvolutionKind::Falcon | ConvolutionKind::FalconBranch)
    }
}

impl fmt::Display for ConvolutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConvolutionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConvolutionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ConfigError::Unknown { field: "convolution", value: s.to_string() })
    }
}

// ─── ModelFamily ──────────────────────────────────────────────────────────────
/// Network architecture. Only these four are wired up in ml::model,
/// anything else is rejected when the configuration is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "VGG16")]
    Vgg16,
    #[serde(rename = "VGG19")]
    Vgg19,
    ResNet18,
    ResNet34,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::Vgg16,
        ModelFamily::Vgg19,
        ModelFamily::ResNet18,
        ModelFamily::ResNet34,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Vgg16    => "VGG16",
            ModelFamily::Vgg19    => "VGG19",
            ModelFamily::ResNet18 => "ResNet18",
            ModelFamily::ResNet34 => "ResNet34",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelFamily::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ConfigError::Unknown { field: "model", value: s.to_string() })
    }
}

// ─── DatasetKind ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Cifar10,
    Cifar100,
    Svhn,
    Mnist,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 4] = [
        DatasetKind::Cifar10,
        DatasetKind::Cifar100,
        DatasetKind::Svhn,
        DatasetKind::Mnist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Cifar10  => "cifar10",
            DatasetKind::Cifar100 => "cifar100",
            DatasetKind::Svhn     => "svhn",
            DatasetKind::Mnist    => "mnist",
        }
    }

    /// Number of output classes the classifier head needs.
    pub fn num_classes(&self) -> usize {
        match self {
            DatasetKind::Cifar100 => 100,
            DatasetKind::Cifar10 | DatasetKind::Svhn | DatasetKind::Mnist => 10,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetKind::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ConfigError::Unknown { field: "datasets", value: s.to_string() })
    }
}

// ─── OptimizerKind ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizerKind {
    #[serde(rename = "SGD")]
    Sgd,
    Adam,
}

impl OptimizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd  => "SGD",
            OptimizerKind::Adam => "Adam",
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SGD"  => Ok(OptimizerKind::Sgd),
            "Adam" => Ok(OptimizerKind::Adam),
            other  => Err(ConfigError::Unknown { field: "optimizer", value: other.to_string() }),
        }
    }
}

// ─── TrainingConfiguration ────────────────────────────────────────────────────
/// Everything that identifies a trained model.
/// Serialisable so it can be written next to the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfiguration {
    pub convolution:   ConvolutionKind,
    pub model:         ModelFamily,
    pub dataset:       DatasetKind,
    /// Low-rank factorisation width (number of summed FALCON paths)
    pub rank:          usize,
    /// Side-path mixing coefficient of the branch architectures
    pub alpha:         f64,
    /// Initialise FALCON weights from the standard kernels
    pub init:          bool,
    pub beta:          f64,
    pub groups:        usize,
    /// Channel expansion factor, MobileConvV2 only
    pub expansion:     usize,
    pub optimizer:     OptimizerKind,
    pub learning_rate: f64,
}

impl Default for TrainingConfiguration {
    fn default() -> Self {
        Self {
            convolution:   ConvolutionKind::StandardConv,
            model:         ModelFamily::Vgg16,
            dataset:       DatasetKind::Cifar10,
            rank:          1,
            alpha:         1.0,
            init:          false,
            beta:          0.0,
            groups:        1,
            expansion:     6,
            optimizer:     OptimizerKind::Sgd,
            learning_rate: 0.01,
        }
    }
}

impl TrainingConfiguration {
    /// Reject values that no network or optimiser can use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rank == 0 {
            return Err(ConfigError::Invalid("rank must be at least 1".into()));
        }
        if self.groups == 0 {
            return Err(ConfigError::Invalid("groups must be at least 1".into()));
        }
        if self.expansion == 0 {
            return Err(ConfigError::Invalid("expansion must be at least 1".into()));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(ConfigError::Invalid(format!("alpha must be positive, got {}", self.alpha)));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !self.beta.is_finite() {
            return Err(ConfigError::Invalid(format!("beta must be finite, got {}", self.beta)));
        }
        Ok(())
    }
}
