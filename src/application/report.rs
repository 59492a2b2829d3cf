// ============================================================
// Layer 2 — Run Report
// ============================================================
// Header and footer shared by both workflows: the run's
// configuration at the top of the log, the model profile
// (parameters, FLOPs, forward latency) at the end of the run.

use anyhow::Result;
use burn::prelude::*;

use crate::application::options::RunOptions;
use crate::domain::config::TrainingConfiguration;
use crate::infra::run_log::RunLog;
use crate::ml::model::ImageClassifier;
use crate::ml::profile::{print_size, ModelProfile};

pub fn log_configuration(log: &mut RunLog, cfg: &TrainingConfiguration, options: &RunOptions) -> Result<()> {
    log.line(serde_json::to_string(cfg)?)?;
    log.line(format!("{options:?}"))?;
    Ok(())
}

/// Parameter and FLOP counts of a freshly built network.
pub fn report_size<B: Backend, M: ImageClassifier<B>>(model: &M, log: &mut RunLog) -> Result<()> {
    let (params, flops) = (model.num_parameters(), model.flops());
    print_size(params, flops);
    log.line(format!("params={params} flops={flops}"))
}

pub fn report_profile<B: Backend, M: ImageClassifier<B>>(
    model:  &M,
    log:    &mut RunLog,
    device: &B::Device,
) -> Result<ModelProfile> {
    let profile = ModelProfile::measure(model, device);
    profile.print();
    log.line(format!(
        "params={} flops={} forward_ms={:.3}",
        profile.params, profile.flops, profile.latency_ms,
    ))?;
    Ok(profile)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::checkpoint_key::CheckpointKey;
    use crate::domain::config::ModelFamily;
    use crate::ml::conv::UnitSettings;
    use crate::ml::model::{select_network, Network, NetworkConfig};
    use burn::backend::NdArray;
    use std::fs;

    type TestBackend = NdArray;

    #[test]
    fn test_size_is_logged_after_build() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainingConfiguration { model: ModelFamily::ResNet18, ..TrainingConfiguration::default() };
        let key = CheckpointKey::for_save(&cfg);

        let units   = UnitSettings::from_config(&cfg, false, false);
        let config  = NetworkConfig::new(cfg.model, cfg.dataset.num_classes(), units);
        let network: Network<TestBackend> = select_network(&config, &Default::default()).unwrap();

        let mut log = RunLog::create(dir.path(), &key).unwrap();
        report_size::<TestBackend, _>(&network, &mut log).unwrap();
        let path = log.path().to_path_buf();
        drop(log);

        let text = fs::read_to_string(path).unwrap();
        let expected = format!(
            "params={} flops={}",
            ImageClassifier::<TestBackend>::num_parameters(&network),
            ImageClassifier::<TestBackend>::flops(&network),
        );
        assert!(text.contains(&expected), "log was: {text}");
    }
}
