// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Every field is optional and defaults to the values the stock UDP
//! client/server harness uses. Any invalid value results in a
//! ValidationError that prevents the run from starting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BenchError, BenchResult, ValidationError};
use crate::parser::{LabeledFieldParser, ParserPatterns};

const MAX_TRIALS: u32 = 10_000;
const MAX_CLIENT_TIMEOUT_SECS: u64 = 3600;

/// Raw harness settings as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHarnessConfig {
    #[serde(default = "default_trials")]
    trials: u32,
    #[serde(default = "default_inter_trial_delay_ms")]
    inter_trial_delay_ms: u64,
}

fn default_trials() -> u32 {
    3
}

fn default_inter_trial_delay_ms() -> u64 {
    5000
}

impl Default for RawHarnessConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            inter_trial_delay_ms: default_inter_trial_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServerConfig {
    #[serde(default = "default_server_path")]
    path: String,
    #[serde(default)]
    stale_process_pattern: Option<String>,
    #[serde(default = "default_settle_delay_ms")]
    settle_delay_ms: u64,
    #[serde(default = "default_warmup_delay_ms")]
    warmup_delay_ms: u64,
    #[serde(default = "default_drain_delay_ms")]
    drain_delay_ms: u64,
    #[serde(default = "default_drain_timeout_ms")]
    drain_timeout_ms: u64,
    #[serde(default = "default_terminate_grace_ms")]
    terminate_grace_ms: u64,
}

fn default_server_path() -> String {
    "./udp_ser4".to_string()
}

fn default_settle_delay_ms() -> u64 {
    1500
}

fn default_warmup_delay_ms() -> u64 {
    2000
}

fn default_drain_delay_ms() -> u64 {
    1000
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_terminate_grace_ms() -> u64 {
    5000
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            path: default_server_path(),
            stale_process_pattern: None,
            settle_delay_ms: default_settle_delay_ms(),
            warmup_delay_ms: default_warmup_delay_ms(),
            drain_delay_ms: default_drain_delay_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            terminate_grace_ms: default_terminate_grace_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClientConfig {
    #[serde(default = "default_client_path")]
    path: String,
    #[serde(default = "default_server_address")]
    server_address: String,
    #[serde(default = "default_client_timeout_secs")]
    timeout_secs: u64,
}

fn default_client_path() -> String {
    "./udp_client4".to_string()
}

fn default_server_address() -> String {
    "localhost".to_string()
}

fn default_client_timeout_secs() -> u64 {
    300
}

impl Default for RawClientConfig {
    fn default() -> Self {
        Self {
            path: default_client_path(),
            server_address: default_server_address(),
            timeout_secs: default_client_timeout_secs(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPayloadConfig {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBuildStep {
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParserConfig {
    #[serde(default)]
    elapsed_pattern: Option<String>,
    #[serde(default)]
    rate_pattern: Option<String>,
    #[serde(default)]
    bytes_pattern: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReportConfig {
    #[serde(default)]
    json_dir: Option<String>,
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    harness: RawHarnessConfig,
    #[serde(default)]
    server: RawServerConfig,
    #[serde(default)]
    client: RawClientConfig,
    #[serde(default)]
    payload: RawPayloadConfig,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    build: Vec<RawBuildStep>,
    #[serde(default)]
    parser: RawParserConfig,
    #[serde(default)]
    report: RawReportConfig,
}

/// Trial loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub trials: u32,
    pub inter_trial_delay: Duration,
}

/// Server process settings and the fixed delays around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub path: PathBuf,
    /// Substring matched against process names by the stale sweep.
    pub stale_process_pattern: String,
    pub settle_delay: Duration,
    pub warmup_delay: Duration,
    pub drain_delay: Duration,
    pub drain_timeout: Duration,
    pub terminate_grace: Duration,
}

/// Client process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub path: PathBuf,
    pub server_address: String,
    pub timeout: Duration,
}

/// An external command run before the first trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub program: String,
    pub args: Vec<String>,
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub harness: HarnessConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub payload: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub build: Vec<BuildStep>,
    pub parser: ParserPatterns,
    pub json_dir: Option<PathBuf>,
}

impl Config {
    /// Build the output parser described by this configuration.
    pub fn output_parser(&self) -> Result<LabeledFieldParser, ValidationError> {
        LabeledFieldParser::with_patterns(&self.parser)
    }

    /// Re-check the invariants after CLI overrides have been applied.
    pub fn revalidate(&self) -> Result<(), ValidationError> {
        validate_trials(self.harness.trials)?;
        validate_client_timeout(self.client.timeout.as_secs())?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        // The defaults are valid by construction.
        ConfigLoader::validate(RawConfig::default()).unwrap_or_else(|e| {
            unreachable!("default configuration failed validation: {e}")
        })
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<Config> {
        // An empty document means "all defaults".
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Ok(Self::validate(raw)?)
    }

    fn validate(raw: RawConfig) -> Result<Config, ValidationError> {
        let harness = Self::validate_harness(raw.harness)?;
        let server = Self::validate_server(raw.server)?;
        let client = Self::validate_client(raw.client)?;

        let payload = optional_path("payload.path", raw.payload.path)?;
        let working_dir = optional_path("working_dir", raw.working_dir)?;
        let json_dir = optional_path("report.json_dir", raw.report.json_dir)?;

        let build = raw
            .build
            .into_iter()
            .enumerate()
            .map(|(index, step)| {
                if step.program.trim().is_empty() {
                    return Err(ValidationError::MissingRequiredField {
                        field: "program",
                        context: format!("build step at index {}", index),
                    });
                }
                Ok(BuildStep {
                    program: step.program,
                    args: step.args,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let defaults = ParserPatterns::default();
        let parser = ParserPatterns {
            elapsed: raw.parser.elapsed_pattern.unwrap_or(defaults.elapsed),
            rate: raw.parser.rate_pattern.unwrap_or(defaults.rate),
            bytes: raw.parser.bytes_pattern.unwrap_or(defaults.bytes),
        };
        // Compile once here so bad anchors fail before the run.
        LabeledFieldParser::with_patterns(&parser)?;

        Ok(Config {
            harness,
            server,
            client,
            payload,
            working_dir,
            build,
            parser,
            json_dir,
        })
    }

    fn validate_harness(raw: RawHarnessConfig) -> Result<HarnessConfig, ValidationError> {
        validate_trials(raw.trials)?;

        Ok(HarnessConfig {
            trials: raw.trials,
            inter_trial_delay: Duration::from_millis(raw.inter_trial_delay_ms),
        })
    }

    fn validate_server(raw: RawServerConfig) -> Result<ServerConfig, ValidationError> {
        let path = required_path("server.path", raw.path)?;

        let stale_process_pattern = match raw.stale_process_pattern {
            Some(pattern) if pattern.trim().is_empty() => {
                return Err(ValidationError::InvalidFieldValue {
                    field: "server.stale_process_pattern",
                    value: pattern,
                    reason: "An empty pattern would match every process".to_string(),
                });
            }
            Some(pattern) => pattern,
            None => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| ValidationError::InvalidFieldValue {
                    field: "server.path",
                    value: path.display().to_string(),
                    reason: "Path has no file name to derive the stale process pattern from"
                        .to_string(),
                })?,
        };

        if raw.terminate_grace_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "server.terminate_grace_ms",
                value: "0".to_string(),
                reason: "Grace period must be greater than 0".to_string(),
            });
        }

        Ok(ServerConfig {
            path,
            stale_process_pattern,
            settle_delay: Duration::from_millis(raw.settle_delay_ms),
            warmup_delay: Duration::from_millis(raw.warmup_delay_ms),
            drain_delay: Duration::from_millis(raw.drain_delay_ms),
            drain_timeout: Duration::from_millis(raw.drain_timeout_ms),
            terminate_grace: Duration::from_millis(raw.terminate_grace_ms),
        })
    }

    fn validate_client(raw: RawClientConfig) -> Result<ClientConfig, ValidationError> {
        let path = required_path("client.path", raw.path)?;

        if raw.server_address.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField {
                field: "server_address",
                context: "client".to_string(),
            });
        }

        validate_client_timeout(raw.timeout_secs)?;

        Ok(ClientConfig {
            path,
            server_address: raw.server_address,
            timeout: Duration::from_secs(raw.timeout_secs),
        })
    }
}

fn validate_trials(trials: u32) -> Result<(), ValidationError> {
    if trials == 0 || trials > MAX_TRIALS {
        return Err(ValidationError::InvalidFieldValue {
            field: "harness.trials",
            value: trials.to_string(),
            reason: format!("Must be between 1 and {}", MAX_TRIALS),
        });
    }
    Ok(())
}

fn validate_client_timeout(secs: u64) -> Result<(), ValidationError> {
    if secs == 0 || secs > MAX_CLIENT_TIMEOUT_SECS {
        return Err(ValidationError::InvalidFieldValue {
            field: "client.timeout_secs",
            value: secs.to_string(),
            reason: format!("Must be between 1 and {} seconds", MAX_CLIENT_TIMEOUT_SECS),
        });
    }
    Ok(())
}

fn required_path(field: &'static str, value: String) -> Result<PathBuf, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::InvalidFieldValue {
            field,
            value,
            reason: "Path cannot be empty".to_string(),
        });
    }
    Ok(PathBuf::from(value))
}

fn optional_path(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<PathBuf>, ValidationError> {
    value.map(|v| required_path(field, v)).transpose()
}
