// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Core data model: measurements, trial outcomes and the result set.
//!
//! Newtypes validate their invariants at creation time.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PreconditionError, TrialFailure};

/// Kilobytes per megabyte. Binary convention.
pub const KB_PER_MB: f64 = 1024.0;

/// One successful trial's numbers, as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    elapsed_ms: f64,
    throughput_kbps: f64,
    bytes_sent: u64,
}

impl Measurement {
    pub fn new(elapsed_ms: f64, throughput_kbps: f64, bytes_sent: u64) -> Self {
        Self {
            elapsed_ms,
            throughput_kbps,
            bytes_sent,
        }
    }

    /// Transfer time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Data rate in KB/s.
    pub fn throughput_kbps(&self) -> f64 {
        self.throughput_kbps
    }

    /// Data rate in MB/s (KB/s / 1024).
    pub fn throughput_mbps(&self) -> f64 {
        self.throughput_kbps / KB_PER_MB
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

/// The three labeled fields extracted from client output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementField {
    ElapsedTime,
    DataRate,
    BytesSent,
}

impl fmt::Display for MeasurementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElapsedTime => write!(f, "elapsed_time"),
            Self::DataRate => write!(f, "data_rate"),
            Self::BytesSent => write!(f, "bytes_sent"),
        }
    }
}

/// Which side of the pair a process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRole {
    Server,
    Client,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// Text collected from a child's standard streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr. Stdout wins first-match lookups.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// Result of exactly one trial.
#[derive(Debug, Clone)]
pub enum TrialOutcome {
    Success(Measurement),
    Failure(TrialFailure),
}

impl TrialOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<Result<Measurement, TrialFailure>> for TrialOutcome {
    fn from(result: Result<Measurement, TrialFailure>) -> Self {
        match result {
            Ok(m) => Self::Success(m),
            Err(f) => Self::Failure(f),
        }
    }
}

/// Append-only, ordered collection of successful measurements.
///
/// Owned by the trial loop; readers get a slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<Measurement>);

impl ResultSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, measurement: Measurement) {
        self.0.push(measurement);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Measurement] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.0.iter()
    }
}

impl FromIterator<Measurement> for ResultSet {
    fn from_iter<I: IntoIterator<Item = Measurement>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Path to a collaborator binary that exists and carries an execute bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutablePath(PathBuf);

impl ExecutablePath {
    /// Check existence and permissions.
    pub fn new(role: ProcessRole, path: impl Into<PathBuf>) -> Result<Self, PreconditionError> {
        let path = path.into();

        if !path.is_file() {
            return Err(PreconditionError::BinaryNotFound { role, path });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = path.metadata() {
                if metadata.permissions().mode() & 0o111 == 0 {
                    return Err(PreconditionError::BinaryNotExecutable { role, path });
                }
            }
        }

        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ExecutablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mbps_is_binary_division() {
        let m = Measurement::new(12.5, 2048.0, 59_811);
        assert_eq!(m.throughput_mbps(), 2.0);

        for kbps in [1.0, 1000.0, 4785.123, 123_456.789] {
            let m = Measurement::new(1.0, kbps, 1);
            assert!((m.throughput_mbps() - kbps / 1024.0).abs() <= f64::EPSILON * kbps);
            assert!((m.throughput_mbps() - kbps / 1000.0).abs() > f64::EPSILON);
        }
    }

    #[test]
    fn test_combined_output_puts_stdout_first() {
        let out = CapturedOutput::new("Time(ms) : 1.0", "warning");
        assert_eq!(out.combined(), "Time(ms) : 1.0\nwarning");
        assert_eq!(CapturedOutput::new("only", "").combined(), "only");
        assert!(CapturedOutput::default().is_empty());
    }

    #[test]
    fn test_result_set_preserves_order() {
        let mut set = ResultSet::new();
        set.push(Measurement::new(3.0, 1.0, 1));
        set.push(Measurement::new(1.0, 1.0, 1));
        assert_eq!(set.len(), 2);
        let times: Vec<f64> = set.iter().map(Measurement::elapsed_ms).collect();
        assert_eq!(times, vec![3.0, 1.0]);
    }

    #[test]
    fn test_executable_path_missing() {
        let err = ExecutablePath::new(ProcessRole::Server, "/definitely/not/here").unwrap_err();
        assert!(matches!(err, PreconditionError::BinaryNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_path_requires_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("server");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(
            ExecutablePath::new(ProcessRole::Server, &path),
            Err(PreconditionError::BinaryNotExecutable { .. })
        ));

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(ExecutablePath::new(ProcessRole::Server, &path).is_ok());
    }
}
