// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Pairbench Core Library
//!
//! Repeatable client/server transfer benchmarks: supervises a server and a
//! client process per trial, parses the client's labeled report, and reduces
//! successful trials to descriptive statistics with a consistency verdict.

pub mod config;
pub mod error;
pub mod parser;
pub mod report;
pub mod shutdown;
pub mod stats;
pub mod supervisor;
pub mod trial;
pub mod types;

// Re-export commonly used types
pub use config::{BuildStep, Config, ConfigLoader};
pub use error::{
    BenchError, BenchResult, FailureKind, ParseError, PreconditionError, ReportError,
    TrialFailure, ValidationError,
};
pub use parser::{LabeledFieldParser, OutputParser, ParserPatterns};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use stats::{summarize, Consistency, MetricSummary, Statistics, Summary};
pub use supervisor::{ProcessSupervisor, TrialExecutor, TrialRecord};
pub use trial::{RunReport, TrialLoop, TrialObserver};
pub use types::{ExecutablePath, Measurement, ProcessRole, ResultSet, TrialOutcome};
