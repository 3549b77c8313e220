// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Checks and build steps that must pass before trial 1.

use std::path::Path;

use pairbench_core::{BuildStep, Config, ExecutablePath, PreconditionError, ProcessRole};

/// Switch to the working directory, run the build steps, then verify the
/// binaries and payload. Stops at the first failure.
pub async fn run(config: &Config) -> Result<(), PreconditionError> {
    if let Some(dir) = &config.working_dir {
        enter_working_dir(dir)?;
    }

    if !config.build.is_empty() {
        println!("Building collaborators...");
        for step in &config.build {
            run_build_step(step).await?;
            println!("  ✓ {}", step);
        }
    }

    let server = ExecutablePath::new(ProcessRole::Server, &config.server.path)?;
    let client = ExecutablePath::new(ProcessRole::Client, &config.client.path)?;
    tracing::debug!(server = %server, client = %client, "Binaries present");

    if let Some(payload) = &config.payload {
        if !payload.is_file() {
            return Err(PreconditionError::PayloadNotFound {
                path: payload.clone(),
            });
        }
    }

    Ok(())
}

fn enter_working_dir(dir: &Path) -> Result<(), PreconditionError> {
    std::env::set_current_dir(dir).map_err(|e| PreconditionError::WorkingDirUnavailable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    tracing::info!(dir = %dir.display(), "Changed working directory");
    Ok(())
}

async fn run_build_step(step: &BuildStep) -> Result<(), PreconditionError> {
    tracing::info!(step = %step, "Running build step");

    let output = tokio::process::Command::new(&step.program)
        .args(&step.args)
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| PreconditionError::BuildSpawnFailed {
            step: step.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(PreconditionError::BuildFailed {
            step: step.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        });
    }
    Ok(())
}
