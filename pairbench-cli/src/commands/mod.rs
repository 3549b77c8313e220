// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod parse;
pub mod preflight;
pub mod run;
pub mod validate;

use std::path::Path;

use pairbench_core::{BenchResult, Config, ConfigLoader};

/// Load the configuration file, or the built-in defaults without one.
pub fn load_config(path: Option<&Path>) -> BenchResult<Config> {
    match path {
        Some(path) => {
            tracing::info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_file(path)
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}
