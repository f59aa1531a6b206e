//! CLI command implementations for nsyn

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::error::CliResult;

pub mod build;
pub mod inspect;

/// nsyn - connection and event-delivery framework for spiking networks
#[derive(Parser, Debug)]
#[command(
    name = "nsyn",
    version,
    about = "Build, drive and checkpoint thread-partitioned spiking networks",
    long_about = "nsyn wires randomly connected networks of spiking units across worker \
                  threads, delivers spikes through their connectors, recalibrates delays on \
                  resolution changes and writes connection checkpoints."
)]
pub struct NsynCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NSYN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a random network, deliver one round of spikes and checkpoint it
    Build(build::BuildCommand),

    /// Summarize a checkpoint file
    Inspect(inspect::InspectCommand),
}

impl NsynCli {
    /// Execute the CLI command
    pub fn execute(self) -> CliResult<()> {
        match self.command {
            Commands::Build(cmd) => cmd.execute(self.config.as_deref()),
            Commands::Inspect(cmd) => cmd.execute(),
        }
    }
}
