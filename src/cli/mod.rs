// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains a classifier and saves its best epoch
//   2. `test`  — restores a saved classifier and evaluates it
//
// The use cases are generic over the Burn backend; this layer
// is where `--backend` becomes a concrete type:
//
//   train  → Autodiff<Wgpu> | Autodiff<NdArray>
//   test   → Wgpu           | NdArray
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu};
use clap::Parser;
use commands::{BackendKind, Commands, TestArgs, TrainArgs};

use crate::domain::config::TrainingConfiguration;

#[derive(Parser, Debug)]
#[command(
    name = "falcon-cnn",
    version = "0.1.0",
    about = "Train and evaluate CNN classifiers with FALCON low-rank convolutions."
)]
pub struct Cli {
    /// The subcommand to run (train or test)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Train(args) => run_train(args),
            Commands::Test(args)  => run_test(args),
        }
    }
}

/// Handles the `train` subcommand.
fn run_train(args: &TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let use_case = TrainUseCase::new(TrainingConfiguration::from(&args.model), args.into());
    match args.run.backend {
        BackendKind::Wgpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            use_case.execute::<Autodiff<Wgpu>>(&device)?;
        }
        BackendKind::Ndarray => {
            use_case.execute::<Autodiff<NdArray>>(&NdArrayDevice::default())?;
        }
    }

    println!("Training complete.");
    Ok(())
}

/// Handles the `test` subcommand.
fn run_test(args: &TestArgs) -> Result<()> {
    use crate::application::test_use_case::TestUseCase;

    let use_case = TestUseCase::new(TrainingConfiguration::from(&args.model), args.into());
    match args.run.backend {
        BackendKind::Wgpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            use_case.execute::<Wgpu>(&device)?;
        }
        BackendKind::Ndarray => {
            use_case.execute::<NdArray>(&NdArrayDevice::default())?;
        }
    }
    Ok(())
}
