// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate configuration     (Layer 3 - domain)
//   Step 2: Open run log               (Layer 6 - infra)
//   Step 3: Build network              (Layer 5 - ml, via network_builder)
//   Step 4: Load + split training data (Layer 4 - data)
//   Step 5: Run training loop          (Layer 5 - ml)
//   Step 6: Save best model            (Layer 6 - infra)
//   Step 7: Test best model            (Layer 5 - ml)
//   Step 8: Profile                    (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;

use crate::application::{
    network_builder::{build_network, Purpose},
    options::RunOptions,
    report::{log_configuration, report_profile, report_size},
};
use crate::data::{
    batcher::{build_loader, ImageBatcher},
    dataset::ImageDataset,
    loader::{DatasetLoader, Split},
    preprocessor::{Augmentation, Normalization},
    splitter::split_train_val,
};
use crate::domain::{
    checkpoint_key::CheckpointKey,
    config::{ConvolutionKind, TrainingConfiguration},
};
use crate::infra::{checkpoint::CheckpointStore, run_log::RunLog};
use crate::ml::{
    evaluator::validate,
    trainer::{train, TrainerSettings},
};

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:  TrainingConfiguration,
    options: RunOptions,
}

impl TrainUseCase {
    pub fn new(config: TrainingConfiguration, options: RunOptions) -> Self {
        Self { config, options }
    }

    /// L2 penalty of the optimiser: beta for FALCON runs, none otherwise.
    fn weight_decay(&self) -> f64 {
        match self.config.convolution {
            ConvolutionKind::Falcon => self.config.beta,
            _                       => 0.0,
        }
    }

    /// Execute the full training pipeline end to end
    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<()> {
        let cfg     = &self.config;
        let options = &self.options;

        // ── Step 1: Validate configuration ───────────────────────────────────
        cfg.validate()?;
        let key = CheckpointKey::for_save(cfg);
        tracing::info!("Training '{}'", key);

        // ── Step 2: Open run log ─────────────────────────────────────────────
        let mut log = RunLog::create(&options.log_dir, &key)?;
        log_configuration(&mut log, cfg, options)?;

        // ── Step 3: Build network ────────────────────────────────────────────
        // FALCON runs restore their StandardConv counterpart here
        let store   = CheckpointStore::new(&options.store_dir);
        let network = build_network::<B>(cfg, options, Purpose::Train, &store, device)?;
        report_size::<B, _>(&network, &mut log)?;

        // ── Step 4: Load and split training data ─────────────────────────────
        let loader  = DatasetLoader::new(&options.data_dir, cfg.dataset);
        let samples = loader.load(Split::Train)?;
        tracing::info!("Loaded {} training images of {}", samples.len(), cfg.dataset);

        let (train_samples, val_samples) = split_train_val(samples, options.train_fraction, options.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        let normalization = Normalization::for_dataset(cfg.dataset);
        let train_batcher = ImageBatcher::with_augmentation(normalization, Augmentation::for_dataset(cfg.dataset));
        let eval_batcher  = ImageBatcher::new(normalization);

        // ── Step 5: Run training loop (Layer 5) ──────────────────────────────
        let settings = TrainerSettings {
            epochs:         options.epochs,
            batch_size:     options.batch_size,
            num_workers:    options.num_workers,
            optimizer:      cfg.optimizer,
            learning_rate:  cfg.learning_rate,
            lr_decay_every: options.lr_decay_every,
            weight_decay:   self.weight_decay(),
            seed:           options.seed,
        };
        let outcome = train::<B>(
            network,
            &settings,
            train_batcher,
            eval_batcher.clone(),
            ImageDataset::new(train_samples),
            ImageDataset::new(val_samples),
            &mut log,
            device,
        )?;
        log.line(format!(
            "best epoch {} with validation accuracy {:.2}%",
            outcome.best_epoch, outcome.best_val_accuracy,
        ))?;

        // ── Step 6: Save best model ──────────────────────────────────────────
        if options.save {
            store.save(&outcome.best_model, &key)?;
            store.save_config(cfg, &key)?;
        } else {
            tracing::info!("--not-save given, best model is discarded");
        }

        // ── Step 7: Test best model ──────────────────────────────────────────
        let test_set    = ImageDataset::new(loader.load(Split::Test)?);
        let test_loader = build_loader::<B::InnerBackend>(
            eval_batcher,
            test_set,
            options.batch_size,
            options.num_workers,
            None,
            device,
        );
        validate(&outcome.best_model, test_loader.iter(), Some(log.sink()))?;

        // ── Step 8: Profile ──────────────────────────────────────────────────
        report_profile::<B::InnerBackend, _>(&outcome.best_model, &mut log, device)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beta_is_weight_decay_only_for_falcon() {
        let falcon = TrainingConfiguration {
            convolution: ConvolutionKind::Falcon,
            beta: 5e-4,
            ..TrainingConfiguration::default()
        };
        let standard = TrainingConfiguration { convolution: ConvolutionKind::StandardConv, ..falcon.clone() };

        assert_eq!(TrainUseCase::new(falcon, RunOptions::default()).weight_decay(), 5e-4);
        assert_eq!(TrainUseCase::new(standard, RunOptions::default()).weight_decay(), 0.0);
    }
}
