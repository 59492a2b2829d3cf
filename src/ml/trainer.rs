// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop over Burn's DataLoader with SGD or Adam, a step
// learning-rate schedule and best-model selection:
//
//   for epoch in 1..=epochs:
//     lr = base_lr / 10^((epoch - 1) / lr_decay_every)
//     train on the training split (autodiff backend)
//     validate on the held-out split (inner backend)
//     keep a snapshot when validation accuracy improves
//
// Key Burn 0.20 insight:
//   - Training uses B: AutodiffBackend for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Validation loaders must also use B::InnerBackend
//   - argmax(1) returns [batch,1] so we flatten before .equal()
//
// Reference: Burn Book §5
//            Kingma & Ba (2015) Adam

use std::time::Instant;

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{
        decay::WeightDecayConfig, momentum::MomentumConfig, AdamConfig, GradientsParams, Optimizer,
        SgdConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::{build_loader, ImageBatcher},
    dataset::ImageDataset,
};
use crate::domain::config::OptimizerKind;
use crate::infra::run_log::{EpochMetrics, RunLog};
use crate::ml::evaluator::validate;
use crate::ml::model::Network;

/// Hyperparameters of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerSettings {
    pub epochs:         usize,
    pub batch_size:     usize,
    pub num_workers:    usize,
    pub optimizer:      OptimizerKind,
    pub learning_rate:  f64,
    /// Divide the learning rate by 10 every this many epochs
    pub lr_decay_every: usize,
    /// L2 penalty; 0 disables it
    pub weight_decay:   f64,
    pub seed:           u64,
}

/// The best model seen during training, already in inference mode.
pub struct TrainingOutcome<B: Backend> {
    pub best_model:        Network<B>,
    pub best_epoch:        usize,
    pub best_val_accuracy: f64,
}

/// Step schedule: `base / 10^((epoch - 1) / every)`, epochs counted from 1.
pub fn step_decay(base: f64, epoch: usize, every: usize) -> f64 {
    if every == 0 {
        return base;
    }
    let steps = epoch.saturating_sub(1) / every;
    base * 0.1f64.powi(steps as i32)
}

/// Train `model` and return the epoch with the best validation accuracy.
#[allow(clippy::too_many_arguments)]
pub fn train<B: AutodiffBackend>(
    model:         Network<B>,
    settings:      &TrainerSettings,
    train_batcher: ImageBatcher,
    val_batcher:   ImageBatcher,
    train_set:     ImageDataset,
    val_set:       ImageDataset,
    log:           &mut RunLog,
    device:        &B::Device,
) -> Result<TrainingOutcome<B::InnerBackend>> {
    let decay = (settings.weight_decay > 0.0)
        .then(|| WeightDecayConfig::new(settings.weight_decay as f32));

    // ── Optimiser ─────────────────────────────────────────────────────────────
    // SGD:  v = 0.9·v + g;            θ = θ - lr·v
    // Adam: m, v running moments;     θ = θ - lr·m / (√v + ε)
    match settings.optimizer {
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new()
                .with_momentum(Some(MomentumConfig::new().with_momentum(0.9)))
                .with_weight_decay(decay)
                .init();
            epoch_loop(model, optim, settings, train_batcher, val_batcher, train_set, val_set, log, device)
        }
        OptimizerKind::Adam => {
            let optim = AdamConfig::new()
                .with_epsilon(1e-8)
                .with_weight_decay(decay)
                .init();
            epoch_loop(model, optim, settings, train_batcher, val_batcher, train_set, val_set, log, device)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn epoch_loop<B, O>(
    mut model:     Network<B>,
    mut optim:     O,
    settings:      &TrainerSettings,
    train_batcher: ImageBatcher,
    val_batcher:   ImageBatcher,
    train_set:     ImageDataset,
    val_set:       ImageDataset,
    log:           &mut RunLog,
    device:        &B::Device,
) -> Result<TrainingOutcome<B::InnerBackend>>
where
    B: AutodiffBackend,
    O: Optimizer<Network<B>, B>,
{
    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = build_loader::<B>(
        train_batcher,
        train_set,
        settings.batch_size,
        settings.num_workers,
        Some(settings.seed),
        device,
    );
    // InnerBackend: no autodiff overhead during validation
    let val_loader = build_loader::<B::InnerBackend>(
        val_batcher,
        val_set,
        settings.batch_size,
        settings.num_workers,
        None,
        device,
    );

    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let mut best: Option<TrainingOutcome<B::InnerBackend>> = None;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=settings.epochs {
        let started = Instant::now();
        let lr      = step_decay(settings.learning_rate, epoch, settings.lr_decay_every);

        // ── Training phase ────────────────────────────────────────────────────
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;
        let mut correct  = 0usize;
        let mut seen     = 0usize;

        for batch in train_loader.iter() {
            let logits = model.forward(batch.images);
            let loss   = loss_fn.forward(logits.clone(), batch.labels.clone());

            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches  += 1;

            seen += batch.labels.dims()[0];
            let hits: i64 = logits
                .argmax(1)
                .flatten::<1>(0, 1)
                .equal(batch.labels)
                .int()
                .sum()
                .into_scalar()
                .elem::<i64>();
            correct += hits as usize;

            // Backward pass + optimiser update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
        }

        let train_loss     = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
        let train_accuracy = if seen > 0 { 100.0 * correct as f64 / seen as f64 } else { 0.0 };

        // ── Validation phase ──────────────────────────────────────────────────
        // model.valid() → Network<B::InnerBackend>, dropout off
        let model_valid = model.valid();
        let result = validate(&model_valid, val_loader.iter(), Some(log.sink()))?;

        let metrics = EpochMetrics {
            epoch,
            learning_rate: lr,
            train_loss,
            train_accuracy,
            val_accuracy: result.accuracy,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        log.log_epoch(&metrics)?;

        println!(
            "Epoch {:>3}/{} | lr={:.6} | train_loss={:.4} | train_acc={:.2}% | val_acc={:.2}%",
            epoch, settings.epochs, lr, train_loss, train_accuracy, result.accuracy,
        );

        if metrics.is_improvement(best.as_ref().map(|b| b.best_val_accuracy)) {
            tracing::info!("New best model at epoch {} ({:.2}%)", epoch, result.accuracy);
            best = Some(TrainingOutcome {
                best_model:        model_valid,
                best_epoch:        epoch,
                best_val_accuracy: result.accuracy,
            });
        }
    }

    tracing::info!("Training complete!");
    Ok(best.unwrap_or_else(|| TrainingOutcome {
        best_model:        model.valid(),
        best_epoch:        0,
        best_val_accuracy: 0.0,
    }))
}
