// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Process supervisor.
//!
//! Runs one client-against-server trial and leaves no child behind:
//! Idle → ServerStarting → ServerReady → ClientRunning → Draining → Terminated.
//! Both children are released on every path, including cancellation.

mod child;
mod readiness;
mod sweep;

pub use child::ManagedChild;
pub use readiness::{FixedDelay, ReadinessProbe, ServerInfo};
pub use sweep::StaleProcessSweep;

use std::process::ExitStatus;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::{ClientConfig, Config, ServerConfig};
use crate::error::{TrialFailure, ValidationError};
use crate::parser::OutputParser;
use crate::shutdown::Shutdown;
use crate::types::{CapturedOutput, ProcessRole, TrialOutcome};

/// Upper bound on waiting for pipe readers once a process is gone.
const OUTPUT_COLLECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Phases of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPhase {
    Idle,
    ServerStarting,
    ServerReady,
    ClientRunning,
    Draining,
    Terminated,
}

impl TrialPhase {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::ServerStarting => "ServerStarting",
            Self::ServerReady => "ServerReady",
            Self::ClientRunning => "ClientRunning",
            Self::Draining => "Draining",
            Self::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything one trial produced. Only `outcome` feeds the statistics; the
/// rest is diagnostics.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    /// 1-based trial number.
    pub trial: u32,
    pub outcome: TrialOutcome,
    pub server_pid: Option<u32>,
    pub client_pid: Option<u32>,
    pub server_output: CapturedOutput,
    pub duration: Duration,
}

impl TrialRecord {
    /// A record for a trial that never got as far as spawning anything.
    pub fn without_processes(trial: u32, outcome: TrialOutcome, duration: Duration) -> Self {
        Self {
            trial,
            outcome,
            server_pid: None,
            client_pid: None,
            server_output: CapturedOutput::default(),
            duration,
        }
    }
}

/// Executes one trial at a time on behalf of the trial loop.
#[async_trait]
pub trait TrialExecutor: Send {
    async fn execute(&mut self, trial: u32) -> TrialRecord;

    /// Best-effort cleanup run once when the loop stops.
    async fn cleanup(&mut self) {}
}

/// What the client phase produced when the client exited by itself.
struct ClientRun {
    status: ExitStatus,
    output: CapturedOutput,
}

/// Production [`TrialExecutor`]: real server and client processes.
pub struct ProcessSupervisor {
    server: ServerConfig,
    client: ClientConfig,
    readiness: Box<dyn ReadinessProbe>,
    parser: Box<dyn OutputParser>,
    sweep: StaleProcessSweep,
    shutdown: Shutdown,
}

impl ProcessSupervisor {
    /// Build from validated configuration with the fixed warm-up delay
    /// policy and the configured parser anchors.
    pub fn new(config: &Config, shutdown: Shutdown) -> Result<Self, ValidationError> {
        let parser = config.output_parser()?;
        Ok(Self {
            server: config.server.clone(),
            client: config.client.clone(),
            readiness: Box::new(FixedDelay::new(config.server.warmup_delay)),
            parser: Box::new(parser),
            sweep: StaleProcessSweep::new(config.server.stale_process_pattern.clone()),
            shutdown,
        })
    }

    /// Replace the readiness policy.
    pub fn with_readiness(mut self, probe: impl ReadinessProbe + 'static) -> Self {
        self.readiness = Box::new(probe);
        self
    }

    /// Replace the output parser.
    pub fn with_parser(mut self, parser: impl OutputParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    fn enter(&self, trial: u32, phase: TrialPhase) {
        tracing::debug!(trial = trial, phase = %phase, "Trial phase");
    }

    /// Run one trial. Never returns with a live child.
    pub async fn run_trial(&self, trial: u32) -> TrialRecord {
        let started = Instant::now();
        self.enter(trial, TrialPhase::Idle);

        self.enter(trial, TrialPhase::ServerStarting);
        self.sweep.sweep_blocking().await;
        if self.shutdown.sleep(self.server.settle_delay).await {
            return TrialRecord::without_processes(
                trial,
                TrialOutcome::Failure(TrialFailure::Interrupted),
                started.elapsed(),
            );
        }

        tracing::info!(trial = trial, server = %self.server.path.display(), "Starting server");
        let mut server = match ManagedChild::spawn(
            ProcessRole::Server,
            &self.server.path,
            std::iter::empty::<&str>(),
        ) {
            Ok(server) => server,
            Err(failure) => {
                return TrialRecord::without_processes(
                    trial,
                    TrialOutcome::Failure(failure),
                    started.elapsed(),
                );
            }
        };

        let mut client: Option<ManagedChild> = None;
        let result = self.drive(trial, &mut server, &mut client).await;

        // Guaranteed release: both children are terminated and reaped
        // whatever `drive` returned.
        self.release(&mut server, client.as_mut()).await;
        self.enter(trial, TrialPhase::Terminated);

        let server_output = server.collect_output(OUTPUT_COLLECT_TIMEOUT).await;
        if !server_output.is_empty() {
            tracing::debug!(
                trial = trial,
                stdout = %server_output.stdout.trim_end(),
                stderr = %server_output.stderr.trim_end(),
                "Server output"
            );
        }

        let outcome = match result {
            Ok(run) => self.interpret(run),
            Err(failure) => Err(failure),
        };

        TrialRecord {
            trial,
            outcome: outcome.into(),
            server_pid: server.pid(),
            client_pid: client.as_ref().and_then(ManagedChild::pid),
            server_output,
            duration: started.elapsed(),
        }
    }

    /// ServerStarting through Draining. Any early return still goes through
    /// `release` in the caller.
    async fn drive(
        &self,
        trial: u32,
        server: &mut ManagedChild,
        client_slot: &mut Option<ManagedChild>,
    ) -> Result<ClientRun, TrialFailure> {
        let info = ServerInfo {
            pid: server.pid(),
            address: &self.client.server_address,
        };
        tracing::debug!(trial = trial, probe = self.readiness.name(), "Waiting for server readiness");
        tokio::select! {
            _ = self.readiness.wait_ready(info) => {}
            _ = self.shutdown.requested() => return Err(TrialFailure::Interrupted),
        }

        if let Some(status) = server.try_status() {
            let output = server.collect_output(OUTPUT_COLLECT_TIMEOUT).await;
            tracing::warn!(trial = trial, status = %status, "Server exited during warm-up");
            return Err(TrialFailure::UnexpectedExit {
                role: ProcessRole::Server,
                status: status.to_string(),
                output,
            });
        }
        self.enter(trial, TrialPhase::ServerReady);

        tracing::info!(
            trial = trial,
            client = %self.client.path.display(),
            address = %self.client.server_address,
            "Running client"
        );
        self.enter(trial, TrialPhase::ClientRunning);
        let client = client_slot.insert(ManagedChild::spawn(
            ProcessRole::Client,
            &self.client.path,
            [self.client.server_address.as_str()],
        )?);

        let status = tokio::select! {
            status = client.wait_timeout(self.client.timeout) => status,
            _ = self.shutdown.requested() => return Err(TrialFailure::Interrupted),
        };

        let Some(status) = status else {
            tracing::warn!(
                trial = trial,
                timeout_secs = self.client.timeout.as_secs(),
                "Client timed out, killing"
            );
            client.kill().await;
            let output = client.collect_output(OUTPUT_COLLECT_TIMEOUT).await;
            return Err(TrialFailure::Timeout {
                limit: self.client.timeout,
                output,
            });
        };
        let output = client.collect_output(OUTPUT_COLLECT_TIMEOUT).await;

        self.enter(trial, TrialPhase::Draining);
        // Interruption here only shortens the drain; the client result stands.
        if !self.shutdown.sleep(self.server.drain_delay).await
            && server.wait_timeout(self.server.drain_timeout).await.is_none()
        {
            tracing::debug!(trial = trial, "Server still running after drain timeout, killing");
            server.kill().await;
        }

        Ok(ClientRun { status, output })
    }

    /// Terminate and reap whatever is still alive.
    async fn release(&self, server: &mut ManagedChild, client: Option<&mut ManagedChild>) {
        if let Some(client) = client {
            client.terminate(self.server.terminate_grace).await;
        }
        server.terminate(self.server.terminate_grace).await;
    }

    fn interpret(&self, run: ClientRun) -> Result<crate::types::Measurement, TrialFailure> {
        let text = run.output.combined();
        match self.parser.parse(&text) {
            Ok(measurement) => Ok(measurement),
            Err(_) if !run.status.success() => Err(TrialFailure::UnexpectedExit {
                role: ProcessRole::Client,
                status: run.status.to_string(),
                output: run.output,
            }),
            Err(source) => Err(TrialFailure::Parse {
                source,
                output: run.output,
            }),
        }
    }
}

#[async_trait]
impl TrialExecutor for ProcessSupervisor {
    async fn execute(&mut self, trial: u32) -> TrialRecord {
        self.run_trial(trial).await
    }

    async fn cleanup(&mut self) {
        let swept = self.sweep.sweep_blocking().await;
        tracing::debug!(swept = swept, "Final stale process sweep");
    }
}
