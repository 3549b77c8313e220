// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for pairbench.
//!
//! Errors are explicit enum variants. Configuration and precondition errors
//! abort the whole run before the first trial; trial-level failures are
//! values ([`TrialFailure`]) that never propagate past the trial loop.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{CapturedOutput, MeasurementField, ProcessRole};

/// Top-level error type for the harness.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Preconditions - checked before trial 1
    // =========================================================================
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    // =========================================================================
    // Reporting
    // =========================================================================
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid pattern for {field}: {reason}")]
    InvalidPattern { field: &'static str, reason: String },
}

/// Failures that make the run impossible before any trial starts.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("{role} binary not found: {path}")]
    BinaryNotFound { role: ProcessRole, path: PathBuf },

    #[error("{role} binary is not executable: {path}")]
    BinaryNotExecutable { role: ProcessRole, path: PathBuf },

    #[error("Payload file not found: {path}")]
    PayloadNotFound { path: PathBuf },

    #[error("Working directory {path} unavailable: {reason}")]
    WorkingDirUnavailable { path: PathBuf, reason: String },

    #[error("Build step '{step}' could not be started: {reason}")]
    BuildSpawnFailed { step: String, reason: String },

    #[error("Build step '{step}' failed with {status}: {stderr}")]
    BuildFailed {
        step: String,
        status: String,
        stderr: String,
    },
}

/// Report generation errors.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The client's output did not contain a well-formed measurement.
///
/// The raw text is retained for diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("field '{field}' not found in client output")]
    MissingField { field: MeasurementField, raw: String },

    #[error("field '{field}' has malformed value '{value}'")]
    MalformedField {
        field: MeasurementField,
        value: String,
        raw: String,
    },
}

impl ParseError {
    /// The text that failed to parse.
    pub fn raw(&self) -> &str {
        match self {
            Self::MissingField { raw, .. } | Self::MalformedField { raw, .. } => raw,
        }
    }

    /// The field that caused the failure.
    pub fn field(&self) -> MeasurementField {
        match self {
            Self::MissingField { field, .. } | Self::MalformedField { field, .. } => *field,
        }
    }
}

/// Discriminant of a [`TrialFailure`], used for counting and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SpawnError,
    Timeout,
    ParseError,
    UnexpectedExit,
    Interrupted,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SpawnError => "spawn error",
            Self::Timeout => "timeout",
            Self::ParseError => "parse error",
            Self::UnexpectedExit => "unexpected exit",
            Self::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// Why a single trial produced no measurement.
///
/// Fatal to that trial only.
#[derive(Debug, Clone, Error)]
pub enum TrialFailure {
    #[error("failed to spawn {role}: {reason}")]
    Spawn { role: ProcessRole, reason: String },

    #[error("client exceeded {}s timeout and was killed", limit.as_secs())]
    Timeout {
        limit: Duration,
        output: CapturedOutput,
    },

    #[error("unparsable client output: {source}")]
    Parse {
        #[source]
        source: ParseError,
        output: CapturedOutput,
    },

    #[error("{role} exited with {status} before the client produced a report")]
    UnexpectedExit {
        role: ProcessRole,
        status: String,
        output: CapturedOutput,
    },

    #[error("trial interrupted by operator")]
    Interrupted,
}

impl TrialFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Spawn { .. } => FailureKind::SpawnError,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Parse { .. } => FailureKind::ParseError,
            Self::UnexpectedExit { .. } => FailureKind::UnexpectedExit,
            Self::Interrupted => FailureKind::Interrupted,
        }
    }

    /// The process the failure is attributed to. Timeouts and parse errors
    /// belong to the client.
    pub fn role(&self) -> Option<ProcessRole> {
        match self {
            Self::Spawn { role, .. } | Self::UnexpectedExit { role, .. } => Some(*role),
            Self::Timeout { .. } | Self::Parse { .. } => Some(ProcessRole::Client),
            Self::Interrupted => None,
        }
    }

    /// Output captured from the failing process, where it got far enough
    /// to produce any.
    pub fn captured_output(&self) -> Option<&CapturedOutput> {
        match self {
            Self::Timeout { output, .. }
            | Self::Parse { output, .. }
            | Self::UnexpectedExit { output, .. } => Some(output),
            Self::Spawn { .. } | Self::Interrupted => None,
        }
    }
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;
