// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Human-readable and JSON reports.
//!
//! The console reporter doubles as a [`TrialObserver`] so per-trial lines
//! appear as the run progresses. The JSON reporter writes one timestamped
//! file per run for later comparison.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::config::Config;
use crate::error::ReportError;
use crate::stats::{Consistency, MetricSummary, Summary};
use crate::supervisor::TrialRecord;
use crate::trial::{RunReport, TrialObserver};
use crate::types::{ProcessRole, TrialOutcome, KB_PER_MB};

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// What the console header names.
#[derive(Debug, Clone)]
pub struct RunHeader {
    pub server: String,
    pub client: String,
    pub server_address: String,
}

impl RunHeader {
    pub fn from_config(config: &Config) -> Self {
        Self {
            server: config.server.path.display().to_string(),
            client: config.client.path.display().to_string(),
            server_address: config.client.server_address.clone(),
        }
    }
}

/// Writes progress and the final statistics block to any writer.
pub struct ConsoleReporter<W: Write> {
    out: W,
    header: RunHeader,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, header: RunHeader) -> Self {
        Self { out, header }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            tracing::debug!(error = %e, "Console write failed");
        }
    }

    fn write_header(&mut self, total: u32, delay: Duration) -> io::Result<()> {
        writeln!(self.out, "Starting performance tests ({total} iterations)")?;
        writeln!(self.out, "Server: {}", self.header.server)?;
        writeln!(
            self.out,
            "Client: {} {}",
            self.header.client, self.header.server_address
        )?;
        writeln!(
            self.out,
            "Wait between tests: {:.1} seconds",
            delay.as_secs_f64()
        )?;
        writeln!(self.out, "{}", rule())
    }

    fn write_trial(&mut self, record: &TrialRecord) -> io::Result<()> {
        match &record.outcome {
            TrialOutcome::Success(m) => {
                writeln!(self.out, "✓ Time: {:.3} ms", m.elapsed_ms())?;
                writeln!(
                    self.out,
                    "✓ Throughput: {:.2} MB/s ({:.1} KB/s)",
                    m.throughput_mbps(),
                    m.throughput_kbps()
                )?;
                writeln!(self.out, "✓ Data sent: {} bytes", m.bytes_sent())
            }
            TrialOutcome::Failure(failure) => {
                writeln!(self.out, "✗ Test failed ({}): {}", failure.kind(), failure)?;
                if let Some(output) = failure.captured_output() {
                    let role = failure.role().unwrap_or(ProcessRole::Client);
                    if !output.stdout.is_empty() {
                        writeln!(self.out, "{role} stdout: {}", output.stdout.trim_end())?;
                    }
                    if !output.stderr.is_empty() {
                        writeln!(self.out, "{role} stderr: {}", output.stderr.trim_end())?;
                    }
                }
                Ok(())
            }
        }
    }

    fn write_completion(&mut self, report: &RunReport) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", rule())?;
        if report.interrupted {
            writeln!(self.out, "Test interrupted by user")?;
        }
        writeln!(
            self.out,
            "Completed {}/{} successful tests",
            report.successful(),
            report.requested
        )?;
        write_summary(&mut self.out, &crate::stats::summarize(report.results.as_slice()))
    }
}

impl<W: Write> TrialObserver for ConsoleReporter<W> {
    fn run_started(&mut self, total_trials: u32, inter_trial_delay: Duration) {
        let result = self.write_header(total_trials, inter_trial_delay);
        self.emit(result);
    }

    fn trial_started(&mut self, trial: u32, total_trials: u32) {
        let result = writeln!(self.out, "\n--- Test {trial}/{total_trials} ---");
        self.emit(result);
    }

    fn trial_finished(&mut self, record: &TrialRecord) {
        let result = self.write_trial(record);
        self.emit(result);
    }

    fn waiting(&mut self, delay: Duration) {
        let result = writeln!(
            self.out,
            "\nWaiting {:.1} seconds before next test...",
            delay.as_secs_f64()
        );
        self.emit(result);
    }

    fn run_finished(&mut self, report: &RunReport) {
        let result = self.write_completion(report);
        self.emit(result);
        let result = self.out.flush();
        self.emit(result);
    }
}

/// Write the statistics block, or the no-data message.
pub fn write_summary(out: &mut impl Write, summary: &Summary) -> io::Result<()> {
    let stats = match summary {
        Summary::NoData => return writeln!(out, "No successful test results to analyze"),
        Summary::Stats(stats) => stats,
    };

    writeln!(out, "\n{}", rule())?;
    writeln!(out, "PERFORMANCE STATISTICS")?;
    writeln!(out, "{}", rule())?;
    writeln!(out, "Number of successful tests: {}", stats.count)?;
    writeln!(
        out,
        "File size: {} bytes ({:.1} KB)",
        stats.bytes_sent,
        stats.bytes_sent as f64 / KB_PER_MB
    )?;
    if stats.payload_divergent {
        writeln!(out, "Warning: trials reported different byte counts")?;
    }

    writeln!(out, "\nTRANSMISSION TIME:")?;
    write_metric(out, &stats.elapsed_ms, 3, "ms")?;
    writeln!(out, "\nTHROUGHPUT (MB/s):")?;
    write_metric(out, &stats.throughput_mbps, 2, "MB/s")?;
    writeln!(out, "\nTHROUGHPUT (KB/s):")?;
    write_metric(out, &stats.throughput_kbps, 1, "KB/s")?;

    writeln!(out, "\nPERFORMANCE CONSISTENCY:")?;
    write_verdict(out, "timing", &stats.elapsed_ms)?;
    write_verdict(out, "throughput", &stats.throughput_mbps)
}

fn write_metric(
    out: &mut impl Write,
    metric: &MetricSummary,
    precision: usize,
    unit: &str,
) -> io::Result<()> {
    writeln!(out, "  Average: {:.*} {unit}", precision, metric.mean)?;
    writeln!(out, "  Min:     {:.*} {unit}", precision, metric.min)?;
    writeln!(out, "  Max:     {:.*} {unit}", precision, metric.max)?;
    if let Some(std_dev) = metric.std_dev {
        writeln!(out, "  Std Dev: {:.*} {unit}", precision, std_dev)?;
    }
    if let Some(cv) = metric.coefficient_of_variation() {
        writeln!(out, "  Variance: {cv:.1}%")?;
    }
    Ok(())
}

fn write_verdict(out: &mut impl Write, label: &str, metric: &MetricSummary) -> io::Result<()> {
    let (Some(cv), Some(verdict)) = (metric.coefficient_of_variation(), metric.consistency())
    else {
        return writeln!(out, "  - {label} consistency n/a (needs at least 2 samples)");
    };
    let (mark, word) = match verdict {
        Consistency::Excellent => ("✓", "Excellent"),
        Consistency::Good => ("⚠", "Good"),
        Consistency::Poor => ("✗", "Poor"),
    };
    writeln!(out, "  {mark} {word} {label} consistency ({cv:.1}% variance)")
}

/// Host information recorded alongside every JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    pub kernel_version: Option<String>,
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub memory_bytes: u64,
    pub hostname: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// The persisted form of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub tool: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub system_info: SystemInfo,
    pub server: String,
    pub client: String,
    pub server_address: String,
    pub run: RunReport,
    pub summary: Summary,
}

impl JsonReport {
    pub fn new(header: &RunHeader, run: &RunReport) -> Self {
        Self {
            tool: "pairbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
            server: header.server.clone(),
            client: header.client.clone(),
            server_address: header.server_address.clone(),
            run: run.clone(),
            summary: crate::stats::summarize(run.results.as_slice()),
        }
    }
}

/// Saves run reports as pretty-printed JSON files.
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create the reporter, creating `output_dir` if needed.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReportError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `report` to `pairbench_<timestamp>.json`. Returns the path.
    pub fn save(&self, report: &JsonReport) -> Result<PathBuf, ReportError> {
        let timestamp = report.timestamp.format("%Y-%m-%dT%H-%M-%SZ");
        let filepath = self
            .output_dir
            .join(format!("pairbench_{}.json", timestamp));

        let file = File::create(&filepath)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report)?;

        tracing::info!(path = %filepath.display(), "Saved JSON report");
        Ok(filepath)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<JsonReport, ReportError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, TrialFailure};
    use crate::trial::FailedTrial;
    use crate::types::{Measurement, ResultSet};
    use tempfile::TempDir;

    fn header() -> RunHeader {
        RunHeader {
            server: "./udp_ser4".to_string(),
            client: "./udp_client4".to_string(),
            server_address: "localhost".to_string(),
        }
    }

    fn run_report(results: &[Measurement]) -> RunReport {
        RunReport {
            results: results.iter().copied().collect::<ResultSet>(),
            requested: 3,
            attempted: 3,
            failures: vec![FailedTrial {
                trial: 2,
                kind: FailureKind::Timeout,
                message: "client exceeded 300s timeout and was killed".to_string(),
            }],
            interrupted: false,
        }
    }

    fn render(summary: &Summary) -> String {
        let mut out = Vec::new();
        write_summary(&mut out, summary).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_trial_lines_use_fixed_precision() {
        let mut console = ConsoleReporter::new(Vec::new(), header());
        let record = TrialRecord::without_processes(
            1,
            TrialOutcome::Success(Measurement::new(12.5, 4785.2, 59_811)),
            Duration::ZERO,
        );
        console.trial_started(1, 3);
        console.trial_finished(&record);

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.contains("--- Test 1/3 ---"));
        assert!(text.contains("✓ Time: 12.500 ms"));
        assert!(text.contains("✓ Throughput: 4.67 MB/s (4785.2 KB/s)"));
        assert!(text.contains("✓ Data sent: 59811 bytes"));
    }

    #[test]
    fn test_failed_trial_line() {
        let mut console = ConsoleReporter::new(Vec::new(), header());
        let record = TrialRecord::without_processes(
            1,
            TrialOutcome::Failure(TrialFailure::Spawn {
                role: crate::types::ProcessRole::Server,
                reason: "not found".to_string(),
            }),
            Duration::ZERO,
        );
        console.trial_finished(&record);

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.starts_with("✗ Test failed (spawn error)"));
    }

    #[test]
    fn test_server_output_labelled_as_server() {
        let mut console = ConsoleReporter::new(Vec::new(), header());
        let record = TrialRecord::without_processes(
            1,
            TrialOutcome::Failure(TrialFailure::UnexpectedExit {
                role: ProcessRole::Server,
                status: "exit status: 1".to_string(),
                output: crate::types::CapturedOutput::new("", "bind failed"),
            }),
            Duration::ZERO,
        );
        console.trial_finished(&record);

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.contains("server stderr: bind failed"));
        assert!(!text.contains("client stderr"));
    }

    #[test]
    fn test_client_output_labelled_as_client() {
        let mut console = ConsoleReporter::new(Vec::new(), header());
        let record = TrialRecord::without_processes(
            1,
            TrialOutcome::Failure(TrialFailure::UnexpectedExit {
                role: ProcessRole::Client,
                status: "exit status: 2".to_string(),
                output: crate::types::CapturedOutput::new("sendto failed", ""),
            }),
            Duration::ZERO,
        );
        console.trial_finished(&record);

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.contains("client stdout: sendto failed"));
    }

    #[test]
    fn test_completion_line_and_stats() {
        let mut console = ConsoleReporter::new(Vec::new(), header());
        let report = run_report(&[
            Measurement::new(10.0, 1024.0, 2048),
            Measurement::new(30.0, 1024.0, 2048),
        ]);
        console.run_finished(&report);

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.contains("Completed 2/3 successful tests"));
        assert!(text.contains("File size: 2048 bytes (2.0 KB)"));
        assert!(text.contains("  Average: 20.000 ms"));
        assert!(text.contains("  Average: 1.00 MB/s"));
        assert!(text.contains("  Average: 1024.0 KB/s"));
        assert!(text.contains("  Std Dev: 0.0 KB/s"));
        assert_eq!(text.matches("  Std Dev:").count(), 3);
        assert!(text.contains("✓ Excellent throughput consistency (0.0% variance)"));
        assert!(text.contains("✗ Poor timing consistency"));
    }

    #[test]
    fn test_no_data_message() {
        let text = render(&Summary::NoData);
        assert_eq!(text, "No successful test results to analyze\n");
    }

    #[test]
    fn test_single_sample_has_no_spread() {
        let text = render(&crate::stats::summarize(&[Measurement::new(5.0, 2048.0, 1)]));
        assert!(text.contains("  Average: 5.000 ms"));
        assert!(!text.contains("Std Dev"));
        assert!(text.contains("timing consistency n/a"));
    }

    #[test]
    fn test_header_lists_collaborators() {
        let mut console = ConsoleReporter::new(Vec::new(), header());
        console.run_started(3, Duration::from_secs(5));

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.contains("Server: ./udp_ser4"));
        assert!(text.contains("Client: ./udp_client4 localhost"));
        assert!(text.contains("Wait between tests: 5.0 seconds"));
    }

    #[test]
    fn test_json_report_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path().join("runs")).unwrap();

        let run = run_report(&[Measurement::new(10.0, 1024.0, 100)]);
        let report = JsonReport::new(&header(), &run);
        let path = reporter.save(&report).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pairbench_"));
        assert!(name.ends_with(".json"));

        let loaded = JsonReporter::load(&path).unwrap();
        assert_eq!(loaded.run.results.len(), 1);
        assert_eq!(loaded.run.failures[0].kind, FailureKind::Timeout);
        assert_eq!(loaded.summary.statistics().unwrap().count, 1);
        assert_eq!(loaded.server_address, "localhost");
    }
}
