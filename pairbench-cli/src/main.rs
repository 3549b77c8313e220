// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Pairbench CLI
//!
//! Command-line interface for the pairbench client/server benchmark harness.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

/// Pairbench - repeatable client/server transfer benchmarks
#[derive(Parser)]
#[command(name = "pairbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the benchmark trials and print statistics
    Run(commands::run::RunArgs),

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: PathBuf,
    },

    /// Parse a saved client output file and print the measurement
    Parse {
        /// Path to the captured client output
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose.
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::execute(cli.config.as_deref(), args).await,
        Commands::Validate { file } => commands::validate::execute(&file),
        Commands::Parse { file } => commands::parse::execute(cli.config.as_deref(), &file),
    }
}
