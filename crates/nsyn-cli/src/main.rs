//! # nsyn - command line interface
//!
//! Builds thread-partitioned spiking networks, drives one round of spike
//! delivery through their connectors and reads back connection checkpoints.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nsyn_cli::{error::CliResult, NsynCli};

fn main() -> CliResult<()> {
    let cli = NsynCli::parse();

    // RUST_LOG wins over -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(err) = cli.execute() {
        error!("Command failed: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
