// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `pairbench validate` command - Validate configuration file.

use std::path::Path;
use std::process::ExitCode;

use pairbench_core::ConfigLoader;

pub fn execute(file: &Path) -> anyhow::Result<ExitCode> {
    tracing::info!(file = %file.display(), "Validating configuration");

    let config = match ConfigLoader::load_file(file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("✓ Configuration is valid");
    println!();
    println!("Harness:");
    println!("  Trials:             {}", config.harness.trials);
    println!(
        "  Inter-trial Delay:  {}ms",
        config.harness.inter_trial_delay.as_millis()
    );
    println!();
    println!("Server:");
    println!("  Path:               {}", config.server.path.display());
    println!("  Stale Pattern:      {}", config.server.stale_process_pattern);
    println!(
        "  Warm-up:            {}ms",
        config.server.warmup_delay.as_millis()
    );
    println!(
        "  Drain Timeout:      {}ms",
        config.server.drain_timeout.as_millis()
    );
    println!();
    println!("Client:");
    println!("  Path:               {}", config.client.path.display());
    println!("  Server Address:     {}", config.client.server_address);
    println!("  Timeout:            {}s", config.client.timeout.as_secs());
    if let Some(payload) = &config.payload {
        println!();
        println!("Payload:              {}", payload.display());
    }
    if let Some(dir) = &config.working_dir {
        println!("Working Directory:    {}", dir.display());
    }
    if !config.build.is_empty() {
        println!();
        println!("Build Steps ({}):", config.build.len());
        for step in &config.build {
            println!("  - {}", step);
        }
    }
    if let Some(dir) = &config.json_dir {
        println!("JSON Reports:         {}", dir.display());
    }
    Ok(ExitCode::SUCCESS)
}
