// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Evaluates a stored model on the test split:
//
//   Step 1: Validate configuration     (Layer 3 - domain)
//   Step 2: Build network              (Layer 5 - ml, via network_builder)
//   Step 3: Restore checkpoint         (Layer 6 - infra)
//   Step 4: Evaluate on test split     (Layer 5 - ml)
//   Step 5: Profile                    (Layer 5 - ml)
//
// Runs on a plain (non-autodiff) backend: nothing is trained.
// A missing checkpoint surfaces as CheckpointError::Missing.

use anyhow::Result;
use burn::prelude::*;

use crate::application::{
    network_builder::{build_network, Purpose},
    options::RunOptions,
    report::{log_configuration, report_profile, report_size},
};
use crate::data::{
    batcher::{build_loader, ImageBatcher},
    dataset::ImageDataset,
    loader::{DatasetLoader, Split},
    preprocessor::Normalization,
};
use crate::domain::{checkpoint_key::CheckpointKey, config::TrainingConfiguration, evaluation::EvaluationResult};
use crate::infra::{checkpoint::CheckpointStore, run_log::RunLog};
use crate::ml::evaluator::validate;

pub struct TestUseCase {
    config:  TrainingConfiguration,
    options: RunOptions,
}

impl TestUseCase {
    pub fn new(config: TrainingConfiguration, options: RunOptions) -> Self {
        Self { config, options }
    }

    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<EvaluationResult> {
        let cfg     = &self.config;
        let options = &self.options;

        // ── Step 1: Validate configuration ───────────────────────────────────
        cfg.validate()?;
        let key = CheckpointKey::for_load(cfg, None);

        // ── Step 2: Build network ────────────────────────────────────────────
        let store   = CheckpointStore::new(&options.store_dir);
        let network = build_network::<B>(cfg, options, Purpose::Test, &store, device)?;

        // ── Step 3: Restore checkpoint ───────────────────────────────────────
        let network = store.load(network, &key, options.restore_path.as_deref(), device)?;

        let mut log = RunLog::append(&options.log_dir, &key)?;
        log_configuration(&mut log, cfg, options)?;
        report_size::<B, _>(&network, &mut log)?;

        // ── Step 4: Evaluate on test split ───────────────────────────────────
        let loader   = DatasetLoader::new(&options.data_dir, cfg.dataset);
        let test_set = ImageDataset::new(loader.load(Split::Test)?);
        tracing::info!("Testing '{}' on {} images", key, test_set.sample_count());

        let test_loader = build_loader::<B>(
            ImageBatcher::new(Normalization::for_dataset(cfg.dataset)),
            test_set,
            options.batch_size,
            options.num_workers,
            None,
            device,
        );
        let result = validate(&network, test_loader.iter(), Some(log.sink()))?;
        println!("Average Inference Time: {:.6}", result.elapsed_secs);

        // ── Step 5: Profile ──────────────────────────────────────────────────
        report_profile(&network, &mut log, device)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::CheckpointError;
    use burn::backend::NdArray;

    #[test]
    fn test_missing_checkpoint_stops_the_run() {
        let dir     = tempfile::tempdir().unwrap();
        let options = RunOptions {
            store_dir: dir.path().join("trained_model"),
            log_dir:   dir.path().join("training_log"),
            ..RunOptions::default()
        };
        let cfg = TrainingConfiguration::default();

        let err = TestUseCase::new(cfg.clone(), options)
            .execute::<NdArray>(&Default::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::Missing { .. })
        ));
        // nothing is logged for a run that never started
        assert!(!dir.path().join("training_log").exists());
    }
}
