#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

use anyhow::Result;
use cli::Cli;
use clap::Parser;

use domain::error::CheckpointError;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("falcon_cnn=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match cli.run() {
        Err(e) => match e.downcast_ref::<CheckpointError>() {
            Some(missing @ CheckpointError::Missing { .. }) => {
                eprintln!("{}", cli.command.missing_checkpoint_diagnostic(missing));
                std::process::exit(1);
            }
            _ => Err(e),
        },
        ok => ok,
    }
}
