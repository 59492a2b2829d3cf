// ============================================================
// Layer 5 — Convolution Units
// ============================================================
// Every 3x3 convolution after a network's stem is a
// "convolution unit": a slot that can be filled by any of the
// supported convolution kinds. A unit always maps
//   [N, in, H, W] → [N, out, H/stride, W/stride]
// and ends in a BatchNorm; the caller applies the ReLU.
//
//   StandardConv  conv3x3 → BN
//   FALCON        Σ_rank ( pw1x1 → [BN] → [ReLU] → dw3x3 ) → BN
//   StConvBranch  main(StandardConv) + α · side(StandardConv)
//   FALCONBranch  main(FALCON)       + α · side(FALCON)
//   MobileConvV2  pw expand → ReLU6 → dw3x3 → ReLU6 → pw project → BN
//   ShuffleUnit   grouped pw → BN → ReLU → shuffle → dw3x3 → BN
//                 → grouped pw → BN
//
// Reference: Jang et al. (2020) FALCON
//            Sandler et al. (2018) MobileNetV2
//            Zhang et al. (2018) ShuffleNet

use burn::{
    module::Ignored,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

use crate::domain::config::{ConvolutionKind, TrainingConfiguration};
use crate::domain::error::ConfigError;
use crate::ml::profile::conv_macs;

// ─── Shapes and settings ──────────────────────────────────────────────────────
/// Geometry of one unit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvShape {
    pub in_channels:  usize,
    pub out_channels: usize,
    pub stride:       usize,
}

impl ConvShape {
    pub fn new(in_channels: usize, out_channels: usize, stride: usize) -> Self {
        Self { in_channels, out_channels, stride }
    }
}

/// Layer options of a FALCON convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FalconOptions {
    pub rank:   usize,
    /// Groups of the pointwise stage; >1 adds a channel shuffle
    pub groups: usize,
    /// BatchNorm between pointwise and depthwise stage
    pub bn:     bool,
    /// ReLU between pointwise and depthwise stage
    pub relu:   bool,
}

/// Everything a unit constructor needs besides its shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitSettings {
    pub kind:      ConvolutionKind,
    pub falcon:    FalconOptions,
    pub alpha:     f64,
    pub groups:    usize,
    pub expansion: usize,
}

impl UnitSettings {
    pub fn from_config(cfg: &TrainingConfiguration, falcon_bn: bool, falcon_relu: bool) -> Self {
        Self {
            kind: cfg.convolution,
            falcon: FalconOptions {
                rank:   cfg.rank,
                groups: cfg.groups,
                bn:     falcon_bn,
                relu:   falcon_relu,
            },
            alpha:     cfg.alpha,
            groups:    cfg.groups,
            expansion: cfg.expansion,
        }
    }

    pub fn with_kind(self, kind: ConvolutionKind) -> Self {
        Self { kind, ..self }
    }

    /// Reject shapes this kind cannot be built for.
    pub fn check(&self, shape: ConvShape) -> Result<(), ConfigError> {
        let divisible = |what: &str, channels: usize, groups: usize| {
            if channels % groups == 0 {
                Ok(())
            } else {
                Err(ConfigError::Unsupported(format!(
                    "{} with groups={groups}: {what} {channels} is not divisible",
                    self.kind
                )))
            }
        };

        match self.kind {
            ConvolutionKind::StandardConv | ConvolutionKind::StConvBranch => Ok(()),
            ConvolutionKind::Falcon | ConvolutionKind::FalconBranch => {
                divisible("input channels", shape.in_channels, self.falcon.groups)?;
                divisible("output channels", shape.out_channels, self.falcon.groups)
            }
            ConvolutionKind::MobileConvV2 => Ok(()),
            ConvolutionKind::ShuffleUnit => {
                divisible("input channels", shape.in_channels, self.groups)?;
                divisible("output channels", shape.out_channels, self.groups)
            }
        }
    }
}

fn conv3x3<B: Backend>(
    channels: [usize; 2],
    stride:   usize,
    groups:   usize,
    device:   &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new(channels, [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_groups(groups)
        .with_bias(false)
        .init(device)
}

fn conv1x1<B: Backend>(channels: [usize; 2], groups: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(channels, [1, 1])
        .with_groups(groups)
        .with_bias(false)
        .init(device)
}

/// Interleave channels across groups: [N, g·c, H, W] viewed as
/// [N, g, c, H, W], transposed to [N, c, g, H, W], flattened back.
pub fn channel_shuffle<B: Backend>(x: Tensor<B, 4>, groups: usize) -> Tensor<B, 4> {
    if groups <= 1 {
        return x;
    }
    let [n, c, h, w] = x.dims();
    x.reshape([n, groups, c / groups, h, w])
        .swap_dims(1, 2)
        .reshape([n, c, h, w])
}

// ─── StandardConv ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct StandardConv<B: Backend> {
    pub conv:   Conv2d<B>,
    pub bn:     BatchNorm<B>,
    pub stride: usize,
}

impl<B: Backend> StandardConv<B> {
    pub fn new(shape: ConvShape, device: &B::Device) -> Self {
        Self {
            conv:   conv3x3([shape.in_channels, shape.out_channels], shape.stride, 1, device),
            bn:     BatchNormConfig::new(shape.out_channels).init(device),
            stride: shape.stride,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }

    pub fn macs(&self, input: [usize; 2]) -> (u64, [usize; 2]) {
        conv_macs(&self.conv, self.stride, input)
    }
}

// ─── FALCON ───────────────────────────────────────────────────────────────────
/// One rank-1 term: pointwise then depthwise.
#[derive(Module, Debug)]
pub struct FalconPath<B: Backend> {
    pub pointwise: Conv2d<B>,
    pub mid_bn:    Option<BatchNorm<B>>,
    pub mid_relu:  Option<Relu>,
    pub depthwise: Conv2d<B>,
    pub groups:    usize,
    pub stride:    usize,
}

impl<B: Backend> FalconPath<B> {
    pub fn new(shape: ConvShape, opts: FalconOptions, device: &B::Device) -> Self {
        let out = shape.out_channels;
        Self {
            pointwise: conv1x1([shape.in_channels, out], opts.groups, device),
            mid_bn:    opts.bn.then(|| BatchNormConfig::new(out).init(device)),
            mid_relu:  opts.relu.then(Relu::new),
            depthwise: conv3x3([out, out], shape.stride, out, device),
            groups:    opts.groups,
            stride:    shape.stride,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = channel_shuffle(self.pointwise.forward(x), self.groups);
        if let Some(bn) = &self.mid_bn {
            x = bn.forward(x);
        }
        if let Some(act) = &self.mid_relu {
            x = act.forward(x);
        }
        self.depthwise.forward(x)
    }

    pub fn macs(&self, input: [usize; 2]) -> (u64, [usize; 2]) {
        let (pw, mid) = conv_macs(&self.pointwise, 1, input);
        let (dw, out) = conv_macs(&self.depthwise, self.stride, mid);
        (pw + dw, out)
    }
}

#[derive(Module, Debug)]
pub struct FalconConv<B: Backend> {
    pub paths: Vec<FalconPath<B>>,
    pub bn:    BatchNorm<B>,
}

impl<B: Backend> FalconConv<B> {
    pub fn new(shape: ConvShape, opts: FalconOptions, device: &B::Device) -> Self {
        let paths = (0..opts.rank.max(1))
            .map(|_| FalconPath::new(shape, opts, device))
            .collect();
        Self { paths, bn: BatchNormConfig::new(shape.out_channels).init(device) }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut sum = self.paths[0].forward(x.clone());
        for path in &self.paths[1..] {
            sum = sum + path.forward(x.clone());
        }
        self.bn.forward(sum)
    }

    pub fn macs(&self, input: [usize; 2]) -> (u64, [usize; 2]) {
        self.paths.iter().fold((0, input), |(total, _), path| {
            let (m, out) = path.macs(input);
            (total + m, out)
        })
    }
}

// ─── Branch architectures ─────────────────────────────────────────────────────
/// Two parallel standard paths: `main + alpha * side`.
#[derive(Module, Debug)]
pub struct StConvBranch<B: Backend> {
    pub main:  StandardConv<B>,
    pub side:  StandardConv<B>,
    pub alpha: Ignored<f64>,
}

impl<B: Backend> StConvBranch<B> {
    pub fn new(shape: ConvShape, alpha: f64, device: &B::Device) -> Self {
        Self {
            main:  StandardConv::new(shape, device),
            side:  StandardConv::new(shape, device),
            alpha: Ignored(alpha),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.main.forward(x.clone()) + self.side.forward(x).mul_scalar(*self.alpha)
    }
}

#[derive(Module, Debug)]
pub struct FalconBranch<B: Backend> {
    pub main:  FalconConv<B>,
    pub side:  FalconConv<B>,
    pub alpha: Ignored<f64>,
}

impl<B: Backend> FalconBranch<B> {
    pub fn new(shape: ConvShape, opts: FalconOptions, alpha: f64, device: &B::Device) -> Self {
        Self {
            main:  FalconConv::new(shape, opts, device),
            side:  FalconConv::new(shape, opts, device),
            alpha: Ignored(alpha),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.main.forward(x.clone()) + self.side.forward(x).mul_scalar(*self.alpha)
    }
}

// ─── MobileConvV2 ─────────────────────────────────────────────────────────────
/// Inverted residual block; the skip is used when shape allows it.
#[derive(Module, Debug)]
pub struct MobileConvV2<B: Backend> {
    pub expand:    Conv2d<B>,
    pub bn1:       BatchNorm<B>,
    pub depthwise: Conv2d<B>,
    pub bn2:       BatchNorm<B>,
    pub project:   Conv2d<B>,
    pub bn3:       BatchNorm<B>,
    pub stride:    usize,
}

impl<B: Backend> MobileConvV2<B> {
    pub fn new(shape: ConvShape, expansion: usize, device: &B::Device) -> Self {
        let hidden = shape.in_channels * expansion.max(1);
        Self {
            expand:    conv1x1([shape.in_channels, hidden], 1, device),
            bn1:       BatchNormConfig::new(hidden).init(device),
            depthwise: conv3x3([hidden, hidden], shape.stride, hidden, device),
            bn2:       BatchNormConfig::new(hidden).init(device),
            project:   conv1x1([hidden, shape.out_channels], 1, device),
            bn3:       BatchNormConfig::new(shape.out_channels).init(device),
            stride:    shape.stride,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let h = self.bn1.forward(self.expand.forward(x.clone())).clamp(0.0, 6.0);
        let h = self.bn2.forward(self.depthwise.forward(h)).clamp(0.0, 6.0);
        let h = self.bn3.forward(self.project.forward(h));
        if self.stride == 1 && h.dims() == x.dims() { h + x } else { h }
    }

    pub fn macs(&self, input: [usize; 2]) -> (u64, [usize; 2]) {
        let (a, hw) = conv_macs(&self.expand, 1, input);
        let (b, hw) = conv_macs(&self.depthwise, self.stride, hw);
        let (c, hw) = conv_macs(&self.project, 1, hw);
        (a + b + c, hw)
    }
}

// ─── ShuffleUnit ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ShuffleUnit<B: Backend> {
    pub reduce:    Conv2d<B>,
    pub bn1:       BatchNorm<B>,
    pub depthwise: Conv2d<B>,
    pub bn2:       BatchNorm<B>,
    pub expand:    Conv2d<B>,
    pub bn3:       BatchNorm<B>,
    pub groups:    usize,
    pub stride:    usize,
}

impl<B: Backend> ShuffleUnit<B> {
    /// Bottleneck width: a quarter of the output, rounded up to a
    /// whole number of groups.
    pub fn bottleneck(out_channels: usize, groups: usize) -> usize {
        let quarter = (out_channels / 4).max(1);
        quarter.div_ceil(groups) * groups
    }

    pub fn new(shape: ConvShape, groups: usize, device: &B::Device) -> Self {
        let mid = Self::bottleneck(shape.out_channels, groups);
        Self {
            reduce:    conv1x1([shape.in_channels, mid], groups, device),
            bn1:       BatchNormConfig::new(mid).init(device),
            depthwise: conv3x3([mid, mid], shape.stride, mid, device),
            bn2:       BatchNormConfig::new(mid).init(device),
            expand:    conv1x1([mid, shape.out_channels], groups, device),
            bn3:       BatchNormConfig::new(shape.out_channels).init(device),
            groups,
            stride:    shape.stride,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let h = relu(self.bn1.forward(self.reduce.forward(x)));
        let h = channel_shuffle(h, self.groups);
        let h = self.bn2.forward(self.depthwise.forward(h));
        self.bn3.forward(self.expand.forward(h))
    }

    pub fn macs(&self, input: [usize; 2]) -> (u64, [usize; 2]) {
        let (a, hw) = conv_macs(&self.reduce, 1, input);
        let (b, hw) = conv_macs(&self.depthwise, self.stride, hw);
        let (c, hw) = conv_macs(&self.expand, 1, hw);
        (a + b + c, hw)
    }
}

// ─── ConvUnit ─────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub enum ConvUnit<B: Backend> {
    Standard(StandardConv<B>),
    Falcon(FalconConv<B>),
    StConvBranch(StConvBranch<B>),
    FalconBranch(FalconBranch<B>),
    Mobile(MobileConvV2<B>),
    Shuffle(ShuffleUnit<B>),
}

impl<B: Backend> ConvUnit<B> {
    /// Build a unit of `settings.kind`. Call `settings.check(shape)`
    /// first; network selection does that for every slot.
    pub fn new(shape: ConvShape, settings: &UnitSettings, device: &B::Device) -> Self {
        match settings.kind {
            ConvolutionKind::StandardConv => Self::Standard(StandardConv::new(shape, device)),
            ConvolutionKind::Falcon => Self::Falcon(FalconConv::new(shape, settings.falcon, device)),
            ConvolutionKind::StConvBranch => {
                Self::StConvBranch(StConvBranch::new(shape, settings.alpha, device))
            }
            ConvolutionKind::FalconBranch => Self::FalconBranch(FalconBranch::new(
                shape,
                settings.falcon,
                settings.alpha,
                device,
            )),
            ConvolutionKind::MobileConvV2 => {
                Self::Mobile(MobileConvV2::new(shape, settings.expansion, device))
            }
            ConvolutionKind::ShuffleUnit => Self::Shuffle(ShuffleUnit::new(shape, settings.groups, device)),
        }
    }

    pub fn kind(&self) -> ConvolutionKind {
        match self {
            Self::Standard(_)     => ConvolutionKind::StandardConv,
            Self::Falcon(_)       => ConvolutionKind::Falcon,
            Self::StConvBranch(_) => ConvolutionKind::StConvBranch,
            Self::FalconBranch(_) => ConvolutionKind::FalconBranch,
            Self::Mobile(_)       => ConvolutionKind::MobileConvV2,
            Self::Shuffle(_)      => ConvolutionKind::ShuffleUnit,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Standard(u)     => u.forward(x),
            Self::Falcon(u)       => u.forward(x),
            Self::StConvBranch(u) => u.forward(x),
            Self::FalconBranch(u) => u.forward(x),
            Self::Mobile(u)       => u.forward(x),
            Self::Shuffle(u)      => u.forward(x),
        }
    }

    /// Multiply-accumulates for one image and the output size.
    pub fn macs(&self, input: [usize; 2]) -> (u64, [usize; 2]) {
        match self {
            Self::Standard(u) => u.macs(input),
            Self::Falcon(u)   => u.macs(input),
            Self::StConvBranch(u) => {
                let (a, out) = u.main.macs(input);
                let (b, _)   = u.side.macs(input);
                (a + b, out)
            }
            Self::FalconBranch(u) => {
                let (a, out) = u.main.macs(input);
                let (b, _)   = u.side.macs(input);
                (a + b, out)
            }
            Self::Mobile(u)  => u.macs(input),
            Self::Shuffle(u) => u.macs(input),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn settings(kind: ConvolutionKind) -> UnitSettings {
        UnitSettings {
            kind,
            falcon: FalconOptions { rank: 2, groups: 2, bn: true, relu: true },
            alpha: 0.5,
            groups: 2,
            expansion: 2,
        }
    }

    #[test]
    fn test_every_kind_keeps_the_unit_contract() {
        let device = Default::default();
        let shape  = ConvShape::new(8, 16, 2);
        for kind in ConvolutionKind::ALL {
            let s = settings(kind);
            s.check(shape).unwrap();
            let unit = ConvUnit::<TestBackend>::new(shape, &s, &device);
            assert_eq!(unit.kind(), kind);

            let x = Tensor::<TestBackend, 4>::ones([2, 8, 8, 8], &device);
            assert_eq!(unit.forward(x).dims(), [2, 16, 4, 4], "{kind}");

            let (macs, out) = unit.macs([8, 8]);
            assert!(macs > 0);
            assert_eq!(out, [4, 4]);
        }
    }

    #[test]
    fn test_groups_must_divide_channels() {
        let shape = ConvShape::new(6, 16, 1);
        let s = UnitSettings { groups: 4, falcon: FalconOptions { groups: 4, ..settings(ConvolutionKind::Falcon).falcon }, ..settings(ConvolutionKind::ShuffleUnit) };
        assert!(matches!(s.check(shape), Err(ConfigError::Unsupported(_))));
        assert!(s.with_kind(ConvolutionKind::Falcon).check(shape).is_err());
        assert!(s.with_kind(ConvolutionKind::StandardConv).check(shape).is_ok());
    }

    #[test]
    fn test_channel_shuffle_interleaves() {
        let device = Default::default();
        // channels 0..4 carry their own index
        let data: Vec<f32> = (0..4).map(|c| c as f32).collect();
        let x = Tensor::<TestBackend, 4>::from_data(TensorData::new(data, [1, 4, 1, 1]), &device);
        let y: Vec<f32> = channel_shuffle(x, 2).into_data().to_vec().unwrap();
        assert_eq!(y, vec![0.0, 2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_falcon_is_cheaper_than_standard() {
        let device = Default::default();
        let shape  = ConvShape::new(64, 64, 1);
        let std    = StandardConv::<TestBackend>::new(shape, &device);
        let opts   = FalconOptions { rank: 1, groups: 1, bn: false, relu: false };
        let falcon = FalconConv::<TestBackend>::new(shape, opts, &device);
        assert!(falcon.macs([32, 32]).0 < std.macs([32, 32]).0);
        assert!(falcon.num_params() < std.num_params());
    }

    #[test]
    fn test_shuffle_bottleneck_is_group_aligned() {
        assert_eq!(ShuffleUnit::<TestBackend>::bottleneck(64, 3), 18);
        assert_eq!(ShuffleUnit::<TestBackend>::bottleneck(64, 4), 16);
        assert_eq!(ShuffleUnit::<TestBackend>::bottleneck(2, 1), 1);
    }

    #[test]
    fn test_branch_mixes_with_alpha() {
        let device = Default::default();
        let unit   = StConvBranch::<TestBackend>::new(ConvShape::new(2, 2, 1), 0.0, &device);
        let x      = Tensor::<TestBackend, 4>::ones([1, 2, 4, 4], &device);
        // alpha = 0 → side path contributes nothing
        let diff: f32 = (unit.forward(x.clone()) - unit.main.forward(x))
            .abs()
            .max()
            .into_scalar()
            .elem();
        assert!(diff < 1e-6);
    }
}
