// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `pairbench run` command - Run the trials and report statistics.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Args;

use pairbench_core::report::{ConsoleReporter, JsonReport, JsonReporter, RunHeader};
use pairbench_core::{shutdown, Config, ProcessSupervisor, RunReport, TrialLoop};

use super::{load_config, preflight};

/// Conventional exit code after Ctrl+C.
const EXIT_INTERRUPTED: u8 = 130;

/// Overrides applied on top of the configuration file.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of trials
    #[arg(short = 'n', long)]
    pub trials: Option<u32>,

    /// Delay between trials in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Client timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Directory for the JSON report
    #[arg(long)]
    pub json_dir: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(trials) = self.trials {
            config.harness.trials = trials;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.harness.inter_trial_delay = Duration::from_millis(delay_ms);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.client.timeout = Duration::from_secs(timeout_secs);
        }
        if let Some(dir) = &self.json_dir {
            config.json_dir = Some(dir.clone());
        }
    }
}

pub async fn execute(config_path: Option<&Path>, args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut config = load_config(config_path)?;
    args.apply(&mut config);
    config.revalidate()?;

    if let Err(e) = preflight::run(&config).await {
        eprintln!("✗ {}", e);
        tracing::error!(error = %e, "Preflight failed");
        return Ok(ExitCode::FAILURE);
    }

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(forward_interrupts(trigger));

    let supervisor = ProcessSupervisor::new(&config, shutdown.clone())?;
    let header = RunHeader::from_config(&config);
    let mut console = ConsoleReporter::new(std::io::stdout(), header.clone());

    let mut trials = TrialLoop::new(supervisor, shutdown);
    let report = trials
        .run_observed(
            config.harness.trials,
            config.harness.inter_trial_delay,
            &mut console,
        )
        .await;

    if let Some(dir) = &config.json_dir {
        save_json(dir, &header, &report);
    }

    if report.interrupted {
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    if !report.is_success() {
        println!("All tests failed. Please check the client and server.");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// First Ctrl+C requests a graceful stop; a second one exits at once.
async fn forward_interrupts(trigger: shutdown::ShutdownTrigger) {
    let mut interrupts = 0u32;
    while tokio::signal::ctrl_c().await.is_ok() {
        interrupts += 1;
        if !on_interrupt(interrupts, &trigger) {
            eprintln!("\nSecond interrupt, exiting without cleanup");
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    }
}

/// Handle the `count`th interrupt. Returns `false` when the operator is
/// forcing an exit.
fn on_interrupt(count: u32, trigger: &shutdown::ShutdownTrigger) -> bool {
    if count > 1 {
        return false;
    }
    tracing::warn!("Interrupt received, stopping after cleanup (Ctrl+C again to force)");
    trigger.trigger();
    true
}

// A report that cannot be written does not invalidate the run.
fn save_json(dir: &Path, header: &RunHeader, report: &RunReport) {
    let saved = JsonReporter::new(dir).and_then(|r| r.save(&JsonReport::new(header, report)));
    match saved {
        Ok(path) => println!("JSON report: {}", path.display()),
        Err(e) => {
            eprintln!("✗ {}", e);
            tracing::error!(error = %e, "Failed to save JSON report");
        }
    }
}
