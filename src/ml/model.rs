// ============================================================
// Layer 5 — Networks
// ============================================================
// CIFAR-style VGG and ResNet classifiers for 32x32 inputs.
// The first convolution (the stem) is always a StandardConv;
// every other 3x3 convolution is a ConvUnit of the configured
// kind.
//
//   VGG16 / VGG19
//     stem → [units → maxpool] x5 → dropout → linear
//
//   ResNet18 / ResNet34
//     stem → BasicBlock x(2,2,2,2) / x(3,4,6,3) → avgpool → linear
//     BasicBlock: relu(unit1) → unit2 → + shortcut → relu
//
// Reference: Simonyan & Zisserman (2015) VGG
//            He et al. (2016) Deep Residual Learning

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::data::dataset::CHANNELS;
use crate::domain::config::{ConvolutionKind, ModelFamily};
use crate::domain::error::ConfigError;
use crate::ml::conv::{ConvShape, ConvUnit, StandardConv, UnitSettings};
use crate::ml::profile::{conv_macs, linear_macs};

const STEM_CHANNELS: usize = 64;

const VGG16_STAGES: [&[usize]; 5] = [&[64, 64], &[128, 128], &[256; 3], &[512; 3], &[512; 3]];
const VGG19_STAGES: [&[usize]; 5] = [&[64, 64], &[128, 128], &[256; 4], &[512; 4], &[512; 4]];

const RESNET_WIDTHS:   [usize; 4] = [64, 128, 256, 512];
const RESNET18_BLOCKS: [usize; 4] = [2, 2, 2, 2];
const RESNET34_BLOCKS: [usize; 4] = [3, 4, 6, 3];

// ─── ImageClassifier ──────────────────────────────────────────────────────────
/// What evaluation and profiling need from a model.
pub trait ImageClassifier<B: Backend> {
    /// images: [N, 3, 32, 32] → logits: [N, classes]
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    fn num_parameters(&self) -> usize;

    /// Multiply-accumulates for one image.
    fn flops(&self) -> u64;
}

// ─── NetworkConfig ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct NetworkConfig {
    pub model:       ModelFamily,
    pub num_classes: usize,
    pub units:       UnitSettings,
}

/// One residual block slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockPlan {
    in_channels:  usize,
    out_channels: usize,
    stride:       usize,
}

impl NetworkConfig {
    /// Unit shapes of every VGG stage; the stem is not included.
    fn vgg_plan(&self) -> Vec<Vec<ConvShape>> {
        let stages = match self.model {
            ModelFamily::Vgg19 => VGG19_STAGES,
            _                  => VGG16_STAGES,
        };
        let mut in_channels = STEM_CHANNELS;
        stages
            .iter()
            .enumerate()
            .map(|(i, widths)| {
                // stage 0 starts with the stem
                let widths = if i == 0 { &widths[1..] } else { &widths[..] };
                widths
                    .iter()
                    .map(|&out| {
                        let shape = ConvShape::new(in_channels, out, 1);
                        in_channels = out;
                        shape
                    })
                    .collect()
            })
            .collect()
    }

    fn resnet_plan(&self) -> Vec<BlockPlan> {
        let blocks = match self.model {
            ModelFamily::ResNet34 => RESNET34_BLOCKS,
            _                     => RESNET18_BLOCKS,
        };
        let mut in_channels = STEM_CHANNELS;
        let mut plan = Vec::new();
        for (stage, (&width, &count)) in RESNET_WIDTHS.iter().zip(blocks.iter()).enumerate() {
            for b in 0..count {
                let stride = if stage > 0 && b == 0 { 2 } else { 1 };
                plan.push(BlockPlan { in_channels, out_channels: width, stride });
                in_channels = width;
            }
        }
        plan
    }

    /// Every unit slot of the network, in forward order.
    pub fn unit_shapes(&self) -> Vec<ConvShape> {
        match self.model {
            ModelFamily::Vgg16 | ModelFamily::Vgg19 => {
                self.vgg_plan().into_iter().flatten().collect()
            }
            ModelFamily::ResNet18 | ModelFamily::ResNet34 => self
                .resnet_plan()
                .into_iter()
                .flat_map(|b| {
                    [
                        ConvShape::new(b.in_channels, b.out_channels, b.stride),
                        ConvShape::new(b.out_channels, b.out_channels, 1),
                    ]
                })
                .collect(),
        }
    }

    /// Fail before any weights are allocated if a slot cannot be built.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.num_classes == 0 {
            return Err(ConfigError::Invalid("num_classes must be positive".into()));
        }
        self.unit_shapes()
            .into_iter()
            .try_for_each(|shape| self.units.check(shape))
    }
}

/// Build the network for `config`, rejecting impossible combinations.
pub fn select_network<B: Backend>(
    config: &NetworkConfig,
    device: &B::Device,
) -> Result<Network<B>, ConfigError> {
    config.check()?;
    let network = match config.model {
        ModelFamily::Vgg16 | ModelFamily::Vgg19 => Network::Vgg(Vgg::new(config, device)),
        ModelFamily::ResNet18 | ModelFamily::ResNet34 => Network::ResNet(ResNet::new(config, device)),
    };
    tracing::info!(
        "Built {} with {} units ({} parameters)",
        config.model,
        config.units.kind,
        network.num_params(),
    );
    Ok(network)
}

// ─── VGG ──────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct VggStage<B: Backend> {
    pub units: Vec<ConvUnit<B>>,
}

#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    pub stem:       StandardConv<B>,
    pub stages:     Vec<VggStage<B>>,
    pub pool:       MaxPool2d,
    pub dropout:    Dropout,
    pub classifier: Linear<B>,
}

impl<B: Backend> Vgg<B> {
    fn new(config: &NetworkConfig, device: &B::Device) -> Self {
        let stages = config
            .vgg_plan()
            .into_iter()
            .map(|shapes| VggStage {
                units: shapes
                    .into_iter()
                    .map(|shape| ConvUnit::new(shape, &config.units, device))
                    .collect(),
            })
            .collect();
        Self {
            stem:       StandardConv::new(ConvShape::new(CHANNELS, STEM_CHANNELS, 1), device),
            stages,
            pool:       MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout:    DropoutConfig::new(0.5).init(),
            classifier: LinearConfig::new(512, config.num_classes).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = relu(self.stem.forward(x));
        for stage in &self.stages {
            for unit in &stage.units {
                x = relu(unit.forward(x));
            }
            x = self.pool.forward(x);
        }
        // 32 / 2^5 = 1 → [N, 512, 1, 1]
        let x = x.flatten::<2>(1, 3);
        self.classifier.forward(self.dropout.forward(x))
    }

    fn macs(&self, input: [usize; 2]) -> u64 {
        let (mut total, mut hw) = self.stem.macs(input);
        for stage in &self.stages {
            for unit in &stage.units {
                let (m, out) = unit.macs(hw);
                total += m;
                hw = out;
            }
            hw = [hw[0] / 2, hw[1] / 2];
        }
        total + linear_macs(&self.classifier)
    }
}

// ─── ResNet ───────────────────────────────────────────────────────────────────
/// 1x1 projection used when a block changes shape.
#[derive(Module, Debug)]
pub struct Shortcut<B: Backend> {
    pub conv:   Conv2d<B>,
    pub bn:     BatchNorm<B>,
    pub stride: usize,
}

impl<B: Backend> Shortcut<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(out_channels).init(device),
            stride,
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub unit1:    ConvUnit<B>,
    pub unit2:    ConvUnit<B>,
    pub shortcut: Option<Shortcut<B>>,
}

impl<B: Backend> BasicBlock<B> {
    fn new(plan: BlockPlan, settings: &UnitSettings, device: &B::Device) -> Self {
        let BlockPlan { in_channels, out_channels, stride } = plan;
        let shortcut = (stride != 1 || in_channels != out_channels)
            .then(|| Shortcut::new(in_channels, out_channels, stride, device));
        Self {
            unit1: ConvUnit::new(ConvShape::new(in_channels, out_channels, stride), settings, device),
            unit2: ConvUnit::new(ConvShape::new(out_channels, out_channels, 1), settings, device),
            shortcut,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = relu(self.unit1.forward(x.clone()));
        let out = self.unit2.forward(out);
        let identity = match &self.shortcut {
            Some(s) => s.forward(x),
            None    => x,
        };
        relu(out + identity)
    }

    fn macs(&self, input: [usize; 2]) -> (u64, [usize; 2]) {
        let (a, mid) = self.unit1.macs(input);
        let (b, out) = self.unit2.macs(mid);
        let c = self
            .shortcut
            .as_ref()
            .map_or(0, |s| conv_macs(&s.conv, s.stride, input).0);
        (a + b + c, out)
    }
}

#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub stem:   StandardConv<B>,
    pub blocks: Vec<BasicBlock<B>>,
    pub pool:   AdaptiveAvgPool2d,
    pub fc:     Linear<B>,
}

impl<B: Backend> ResNet<B> {
    fn new(config: &NetworkConfig, device: &B::Device) -> Self {
        let blocks = config
            .resnet_plan()
            .into_iter()
            .map(|plan| BasicBlock::new(plan, &config.units, device))
            .collect();
        Self {
            stem:   StandardConv::new(ConvShape::new(CHANNELS, STEM_CHANNELS, 1), device),
            blocks,
            pool:   AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc:     LinearConfig::new(512, config.num_classes).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = relu(self.stem.forward(x));
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.pool.forward(x).flatten::<2>(1, 3);
        self.fc.forward(x)
    }

    fn macs(&self, input: [usize; 2]) -> u64 {
        let (mut total, mut hw) = self.stem.macs(input);
        for block in &self.blocks {
            let (m, out) = block.macs(hw);
            total += m;
            hw = out;
        }
        total + linear_macs(&self.fc)
    }
}

// ─── Network ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub enum Network<B: Backend> {
    Vgg(Vgg<B>),
    ResNet(ResNet<B>),
}

impl<B: Backend> Network<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Self::Vgg(n)    => n.forward(images),
            Self::ResNet(n) => n.forward(images),
        }
    }

    pub fn units(&self) -> Vec<&ConvUnit<B>> {
        match self {
            Self::Vgg(n) => n.stages.iter().flat_map(|s| s.units.iter()).collect(),
            Self::ResNet(n) => n
                .blocks
                .iter()
                .flat_map(|b| [&b.unit1, &b.unit2])
                .collect(),
        }
    }

    /// Rebuild every unit with `f`, keeping stem, pools and head.
    pub fn map_units(self, mut f: impl FnMut(ConvUnit<B>) -> ConvUnit<B>) -> Self {
        match self {
            Self::Vgg(mut n) => {
                n.stages = n
                    .stages
                    .into_iter()
                    .map(|s| VggStage { units: s.units.into_iter().map(&mut f).collect() })
                    .collect();
                Self::Vgg(n)
            }
            Self::ResNet(mut n) => {
                n.blocks = n
                    .blocks
                    .into_iter()
                    .map(|b| BasicBlock {
                        unit1:    f(b.unit1),
                        unit2:    f(b.unit2),
                        shortcut: b.shortcut,
                    })
                    .collect();
                Self::ResNet(n)
            }
        }
    }

    /// Kind shared by all units, if they agree.
    pub fn unit_kind(&self) -> Option<ConvolutionKind> {
        let kinds: Vec<_> = self.units().iter().map(|u| u.kind()).collect();
        let first = *kinds.first()?;
        kinds.iter().all(|&k| k == first).then_some(first)
    }
}

impl<B: Backend> ImageClassifier<B> for Network<B> {
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images)
    }

    fn num_parameters(&self) -> usize {
        self.num_params()
    }

    fn flops(&self) -> u64 {
        let input = [crate::data::dataset::IMAGE_SIZE; 2];
        match self {
            Self::Vgg(n)    => n.macs(input),
            Self::ResNet(n) => n.macs(input),
        }
    }
}
