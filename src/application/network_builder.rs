// ============================================================
// Layer 2 — Network Builder
// ============================================================
// Shared by the train and test workflows: turns a
// TrainingConfiguration into a ready network.
//
//   StandardConv / StConvBranch / MobileConvV2 / ShuffleUnit
//       built directly
//
//   FALCON / FALCONBranch
//       built as the standard counterpart, then converted.
//       Training first restores the counterpart's checkpoint
//       (the warm start FALCON is derived from) and may
//       initialise from its kernels; testing converts a fresh
//       network and restores the FALCON checkpoint afterwards.

use anyhow::Result;
use burn::prelude::*;

use crate::application::options::RunOptions;
use crate::domain::checkpoint_key::CheckpointKey;
use crate::domain::config::{ConvolutionKind, TrainingConfiguration};
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::conv::UnitSettings;
use crate::ml::model::{select_network, Network, NetworkConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Train,
    Test,
}

pub fn network_config(
    cfg:     &TrainingConfiguration,
    kind:    ConvolutionKind,
    options: &RunOptions,
) -> NetworkConfig {
    let units = UnitSettings::from_config(cfg, options.falcon_bn, options.falcon_relu).with_kind(kind);
    NetworkConfig::new(cfg.model, cfg.dataset.num_classes(), units)
}

/// The kind a FALCON-family network is converted from.
fn standard_counterpart(kind: ConvolutionKind) -> Option<ConvolutionKind> {
    match kind {
        ConvolutionKind::Falcon       => Some(ConvolutionKind::StandardConv),
        ConvolutionKind::FalconBranch => Some(ConvolutionKind::StConvBranch),
        ConvolutionKind::StandardConv
        | ConvolutionKind::StConvBranch
        | ConvolutionKind::MobileConvV2
        | ConvolutionKind::ShuffleUnit => None,
    }
}

pub fn build_network<B: Backend>(
    cfg:     &TrainingConfiguration,
    options: &RunOptions,
    purpose: Purpose,
    store:   &CheckpointStore,
    device:  &B::Device,
) -> Result<Network<B>> {
    let target = network_config(cfg, cfg.convolution, options);
    // reject impossible combinations before anything is loaded
    target.check()?;

    let Some(base_kind) = standard_counterpart(cfg.convolution) else {
        return Ok(select_network(&target, device)?);
    };

    // ── Step 1: Standard counterpart ─────────────────────────────────────────
    let base = select_network::<B>(&network_config(cfg, base_kind, options), device)?;

    // ── Step 2: Warm start (train only) ──────────────────────────────────────
    let (base, init) = match purpose {
        Purpose::Train => {
            let key = CheckpointKey::for_load(cfg, Some(base_kind));
            tracing::info!("Converting from {} checkpoint '{}'", base_kind, key);
            (store.load(base, &key, options.stconv_path.as_deref(), device)?, cfg.init)
        }
        Purpose::Test => (base, false),
    };

    // ── Step 3: Convert ───────────────────────────────────────────────────────
    Ok(base.falcon(target.units.falcon, init, device))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ModelFamily;
    use crate::domain::error::{CheckpointError, ConfigError};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn falcon_config() -> TrainingConfiguration {
        TrainingConfiguration {
            convolution: ConvolutionKind::Falcon,
            model:       ModelFamily::ResNet18,
            ..TrainingConfiguration::default()
        }
    }

    #[test]
    fn test_falcon_training_needs_the_standard_checkpoint() {
        let dir     = tempfile::tempdir().unwrap();
        let store   = CheckpointStore::new(dir.path());
        let device  = Default::default();
        let cfg     = falcon_config();

        let err = build_network::<TestBackend>(&cfg, &RunOptions::default(), Purpose::Train, &store, &device)
            .err()
            .unwrap();
        let missing = CheckpointKey::for_load(&cfg, Some(ConvolutionKind::StandardConv));
        match err.downcast_ref::<CheckpointError>() {
            Some(CheckpointError::Missing { path }) => assert_eq!(path, &store.weights_path(&missing)),
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn test_falcon_training_converts_a_stored_standard_model() {
        let dir     = tempfile::tempdir().unwrap();
        let store   = CheckpointStore::new(dir.path());
        let device  = Default::default();
        let options = RunOptions::default();
        let cfg     = falcon_config();

        let standard = TrainingConfiguration { convolution: ConvolutionKind::StandardConv, ..cfg.clone() };
        let network  = build_network::<TestBackend>(&standard, &options, Purpose::Train, &store, &device).unwrap();
        store.save(&network, &CheckpointKey::for_save(&standard)).unwrap();

        let falcon = build_network::<TestBackend>(&cfg, &options, Purpose::Train, &store, &device).unwrap();
        assert_eq!(falcon.unit_kind(), Some(ConvolutionKind::Falcon));
    }

    #[test]
    fn test_testing_a_falcon_model_needs_no_standard_checkpoint() {
        let dir    = tempfile::tempdir().unwrap();
        let store  = CheckpointStore::new(dir.path());
        let device = Default::default();

        let network =
            build_network::<TestBackend>(&falcon_config(), &RunOptions::default(), Purpose::Test, &store, &device)
                .unwrap();
        assert_eq!(network.unit_kind(), Some(ConvolutionKind::Falcon));
    }

    #[test]
    fn test_bad_groups_fail_before_loading() {
        let dir    = tempfile::tempdir().unwrap();
        let store  = CheckpointStore::new(dir.path());
        let device = Default::default();
        let cfg    = TrainingConfiguration { groups: 5, ..falcon_config() };

        let err = build_network::<TestBackend>(&cfg, &RunOptions::default(), Purpose::Train, &store, &device)
            .err()
            .unwrap();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::Unsupported(_))));
    }
}
