// ============================================================
// Layer 3 — Checkpoint Namer
// ============================================================
// Maps a TrainingConfiguration to the canonical string that
// names its checkpoint (trained_model/<key>.pkl) and its run
// log (training_log/<key>.txt).
//
// The key is built as an ordered list of segments and joined
// with commas, e.g.
//
//   conv=FALCON,model=VGG16,data=cifar10,rank=2,alpha=1.0,init,opt=SGD,lr=0.01
//
// Several segments are conditional. Parameters that mean
// nothing for a standard convolution are pinned to 1 so that
// every StandardConv run of the same model/data/optimiser maps
// to the same file, whatever rank/alpha were passed.
//
// An override kind is used when a run has to read a checkpoint
// written by a *different* kind of run, e.g. a FALCON run warm
// starting from the StandardConv model it is derived from.
// The FALCON-only segments are suppressed in that case.
//
// Saving never overrides, so the save key is the load key with
// no override; one rule set serves both directions.

use std::fmt;

use crate::domain::config::{ConvolutionKind, TrainingConfiguration};

/// One `field=value` (or bare `field`) element of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub field: &'static str,
    pub value: Option<String>,
}

impl Segment {
    fn pair(field: &'static str, value: impl Into<String>) -> Self {
        Self { field, value: Some(value.into()) }
    }

    fn flag(field: &'static str) -> Self {
        Self { field, value: None }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.field, v),
            None    => f.write_str(self.field),
        }
    }
}

/// Canonical checkpoint identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey(String);

impl CheckpointKey {
    /// Key used when persisting the model a run just trained.
    pub fn for_save(cfg: &TrainingConfiguration) -> Self {
        Self::for_load(cfg, None)
    }

    /// Key used when restoring weights, optionally addressing the
    /// checkpoint of another convolution kind.
    pub fn for_load(cfg: &TrainingConfiguration, override_kind: Option<ConvolutionKind>) -> Self {
        let segments = segments(cfg, override_kind);

        debug_assert!(
            {
                let mut fields: Vec<_> = segments.iter().map(|s| s.field).collect();
                fields.sort_unstable();
                fields.windows(2).all(|w| w[0] != w[1])
            },
            "checkpoint key emitted a field twice: {segments:?}"
        );

        let joined = segments
            .iter()
            .map(Segment::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<key>.<ext>`
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self.0, ext)
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered key segments for a configuration.
pub fn segments(cfg: &TrainingConfiguration, override_kind: Option<ConvolutionKind>) -> Vec<Segment> {
    use ConvolutionKind::*;

    let base         = cfg.convolution;
    let effective    = override_kind.unwrap_or(base);
    let no_override  = override_kind.is_none();
    let to_standard  = override_kind == Some(StandardConv);

    let mut out = Vec::with_capacity(12);

    out.push(Segment::pair("conv", effective.as_str()));
    out.push(Segment::pair("model", cfg.model.as_str()));
    out.push(Segment::pair("data", cfg.dataset.as_str()));

    if base == StandardConv || to_standard {
        out.push(Segment::pair("rank", "1"));
    } else {
        out.push(Segment::pair("rank", cfg.rank.to_string()));
    }

    if effective == StandardConv {
        out.push(Segment::pair("alpha", "1"));
    } else {
        out.push(Segment::pair("alpha", format_real(cfg.alpha)));
    }

    if no_override && base.is_falcon_family() && cfg.init {
        out.push(Segment::flag("init"));
    }
    if no_override && base == Falcon && cfg.beta != 0.0 {
        out.push(Segment::pair("beta", format_real(cfg.beta)));
    }
    if no_override && base == Falcon && !to_standard && cfg.groups != 1 {
        out.push(Segment::pair("groups", cfg.groups.to_string()));
    }
    if base == MobileConvV2 {
        out.push(Segment::pair("exp", cfg.expansion.to_string()));
    }
    if base == ShuffleUnit {
        out.push(Segment::pair("groups", cfg.groups.to_string()));
    }

    out.push(Segment::pair("opt", cfg.optimizer.as_str()));
    out.push(Segment::pair("lr", format_real(cfg.learning_rate)));
    out
}

/// Render a real the way existing checkpoint names spell it:
/// integral values keep a trailing `.0`, very small or very large
/// magnitudes use a two-digit exponent (`1e-05`).
pub fn format_real(x: f64) -> String {
    if !x.is_finite() {
        return x.to_string();
    }
    let magnitude = x.abs();
    if magnitude != 0.0 && (magnitude < 1e-4 || magnitude >= 1e16) {
        let sci = format!("{x:e}");
        if let Some((mantissa, exp)) = sci.split_once('e') {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            return format!("{mantissa}e{sign}{:02}", exp.abs());
        }
        return sci;
    }
    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        x.to_string()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{DatasetKind, ModelFamily, OptimizerKind};
    use ConvolutionKind::*;

    fn cfg(kind: ConvolutionKind) -> TrainingConfiguration {
        TrainingConfiguration {
            convolution:   kind,
            model:         ModelFamily::Vgg16,
            dataset:       DatasetKind::Cifar10,
            rank:          3,
            alpha:         0.5,
            init:          true,
            beta:          0.25,
            groups:        2,
            expansion:     6,
            optimizer:     OptimizerKind::Sgd,
            learning_rate: 0.01,
        }
    }

    #[test]
    fn test_standard_conv_key() {
        let key = CheckpointKey::for_save(&cfg(StandardConv));
        assert_eq!(
            key.as_str(),
            "conv=StandardConv,model=VGG16,data=cifar10,rank=1,alpha=1,opt=SGD,lr=0.01"
        );
    }

    #[test]
    fn test_falcon_key_has_all_falcon_segments() {
        let key = CheckpointKey::for_save(&cfg(Falcon));
        assert_eq!(
            key.as_str(),
            "conv=FALCON,model=VGG16,data=cifar10,rank=3,alpha=0.5,init,beta=0.25,groups=2,opt=SGD,lr=0.01"
        );
    }

    #[test]
    fn test_falcon_defaults_omit_optional_segments() {
        let c = TrainingConfiguration {
            convolution: Falcon,
            rank: 2,
            ..Default::default()
        };
        assert_eq!(
            CheckpointKey::for_save(&c).as_str(),
            "conv=FALCON,model=VGG16,data=cifar10,rank=2,alpha=1.0,opt=SGD,lr=0.01"
        );
    }

    #[test]
    fn test_override_to_standard_pins_rank_and_alpha() {
        for kind in ConvolutionKind::ALL {
            let key = CheckpointKey::for_load(&cfg(kind), Some(StandardConv));
            assert!(key.as_str().starts_with("conv=StandardConv,"), "{key}");
            assert!(key.as_str().contains(",rank=1,alpha=1,"), "{key}");
        }
    }

    #[test]
    fn test_standard_keys_collide_across_rank_and_alpha() {
        let a = TrainingConfiguration { rank: 1, alpha: 1.0, ..cfg(StandardConv) };
        let b = TrainingConfiguration { rank: 8, alpha: 0.1, ..cfg(StandardConv) };
        assert_eq!(CheckpointKey::for_save(&a), CheckpointKey::for_save(&b));

        let c = TrainingConfiguration { rank: 4, alpha: 2.0, ..cfg(Falcon) };
        let d = TrainingConfiguration { rank: 7, alpha: 0.3, ..cfg(Falcon) };
        assert_eq!(
            CheckpointKey::for_load(&c, Some(StandardConv)),
            CheckpointKey::for_load(&d, Some(StandardConv))
        );
    }

    #[test]
    fn test_override_suppresses_falcon_segments() {
        for override_kind in ConvolutionKind::ALL {
            for base in [Falcon, FalconBranch] {
                let key = CheckpointKey::for_load(&cfg(base), Some(override_kind));
                let fields: Vec<_> = segments(&cfg(base), Some(override_kind))
                    .into_iter()
                    .map(|s| s.field)
                    .collect();
                assert!(!fields.contains(&"init"), "{key}");
                assert!(!fields.contains(&"beta"), "{key}");
                assert!(!fields.contains(&"groups"), "{key}");
            }
        }
    }

    #[test]
    fn test_branch_warm_start_key() {
        let key = CheckpointKey::for_load(&cfg(FalconBranch), Some(StConvBranch));
        assert_eq!(
            key.as_str(),
            "conv=StConvBranch,model=VGG16,data=cifar10,rank=3,alpha=0.5,opt=SGD,lr=0.01"
        );
    }

    #[test]
    fn test_falcon_branch_gets_init_but_not_beta_or_groups() {
        let key = CheckpointKey::for_save(&cfg(FalconBranch));
        assert_eq!(
            key.as_str(),
            "conv=FALCONBranch,model=VGG16,data=cifar10,rank=3,alpha=0.5,init,opt=SGD,lr=0.01"
        );
    }

    #[test]
    fn test_mobile_and_shuffle_segments() {
        let mobile = CheckpointKey::for_save(&cfg(MobileConvV2));
        assert!(mobile.as_str().contains(",alpha=0.5,exp=6,opt=SGD,"), "{mobile}");
        assert!(!mobile.as_str().contains("init"));

        let shuffle = CheckpointKey::for_save(&cfg(ShuffleUnit));
        assert!(shuffle.as_str().contains(",alpha=0.5,groups=2,opt=SGD,"), "{shuffle}");

        // base-kind rules still apply under an override
        let shuffle_ovr = CheckpointKey::for_load(&cfg(ShuffleUnit), Some(StandardConv));
        assert!(shuffle_ovr.as_str().contains("groups=2"));
    }

    #[test]
    fn test_save_key_equals_load_key_without_override() {
        for kind in ConvolutionKind::ALL {
            let c = cfg(kind);
            assert_eq!(CheckpointKey::for_save(&c), CheckpointKey::for_load(&c, None));
        }
    }

    #[test]
    fn test_no_trailing_separator() {
        for kind in ConvolutionKind::ALL {
            let key = CheckpointKey::for_save(&cfg(kind));
            assert!(!key.as_str().ends_with(','));
            assert!(key.as_str().ends_with("lr=0.01"));
        }
    }

    #[test]
    fn test_file_name() {
        let key = CheckpointKey::for_save(&cfg(StandardConv));
        assert!(key.file_name("pkl").ends_with("lr=0.01.pkl"));
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(1.0), "1.0");
        assert_eq!(format_real(0.5), "0.5");
        assert_eq!(format_real(0.01), "0.01");
        assert_eq!(format_real(0.0001), "0.0001");
        assert_eq!(format_real(1e-5), "1e-05");
        assert_eq!(format_real(2.5e-7), "2.5e-07");
        assert_eq!(format_real(10.0), "10.0");
    }
}
