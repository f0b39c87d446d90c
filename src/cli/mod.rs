//! Command-line interface definitions.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "coinbot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the replica pipeline (foreground).
    Run(RunArgs),

    /// Load and validate configuration without starting the pipeline.
    CheckConfig,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Force dry-run mode regardless of `EXECUTION_DRY_RUN`.
    #[arg(long)]
    pub dry_run: bool,

    /// Override the `RUST_LOG` filter for this run.
    #[arg(long)]
    pub log_level: Option<String>,
}
