// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `pairbench parse` command - Run the output parser over saved client output.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;

use pairbench_core::OutputParser;

use super::load_config;

pub fn execute(config_path: Option<&Path>, file: &Path) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;
    let parser = config.output_parser()?;

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading client output from {}", file.display()))?;

    match parser.parse(&raw) {
        Ok(m) => {
            println!("✓ Time: {:.3} ms", m.elapsed_ms());
            println!(
                "✓ Throughput: {:.2} MB/s ({:.1} KB/s)",
                m.throughput_mbps(),
                m.throughput_kbps()
            );
            println!("✓ Data sent: {} bytes", m.bytes_sent());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
