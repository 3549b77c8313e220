// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Supervised child process.
//!
//! Owns one spawned collaborator, drains its pipes in the background so it
//! can never block on a full pipe, and knows how to terminate and reap it.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::TrialFailure;
use crate::types::{CapturedOutput, ProcessRole};

/// A spawned server or client process.
///
/// Spawned with kill-on-drop; [`ManagedChild::terminate`] is the normal
/// release path and also reaps the process.
pub struct ManagedChild {
    role: ProcessRole,
    child: Child,
    pid: Option<u32>,
    stdout: Option<JoinHandle<String>>,
    stderr: Option<JoinHandle<String>>,
    output: Option<CapturedOutput>,
    status: Option<ExitStatus>,
}

impl ManagedChild {
    /// Spawn `program` with `args`, stdin closed and both output streams captured.
    pub fn spawn<I, S>(role: ProcessRole, program: &Path, args: I) -> Result<Self, TrialFailure>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TrialFailure::Spawn {
                role,
                reason: format!("{}: {}", program.display(), e),
            })?;

        let pid = child.id();
        let stdout = child.stdout.take().map(|s| tokio::spawn(read_stream(s)));
        let stderr = child.stderr.take().map(|s| tokio::spawn(read_stream(s)));

        tracing::debug!(
            role = %role,
            pid = ?pid,
            program = %program.display(),
            "Spawned process"
        );

        Ok(Self {
            role,
            child,
            pid,
            stdout,
            stderr,
            output: None,
            status: None,
        })
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    /// PID assigned at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status, once the process has been reaped.
    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    pub fn is_reaped(&self) -> bool {
        self.status.is_some()
    }

    /// Non-blocking check; reaps the process if it has already exited.
    pub fn try_status(&mut self) -> Option<ExitStatus> {
        if self.status.is_none() {
            match self.child.try_wait() {
                Ok(Some(status)) => self.status = Some(status),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(role = %self.role, pid = ?self.pid, error = %e, "try_wait failed");
                }
            }
        }
        self.status
    }

    /// Wait up to `limit` for the process to exit. `None` means it is
    /// still running.
    pub async fn wait_timeout(&mut self, limit: Duration) -> Option<ExitStatus> {
        if let Some(status) = self.status {
            return Some(status);
        }

        match tokio::time::timeout(limit, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.status = Some(status);
                Some(status)
            }
            Ok(Err(e)) => {
                tracing::warn!(role = %self.role, pid = ?self.pid, error = %e, "wait failed");
                None
            }
            Err(_) => None,
        }
    }

    /// SIGKILL and reap.
    pub async fn kill(&mut self) {
        if self.try_status().is_some() {
            return;
        }

        match self.child.kill().await {
            Ok(()) => {
                tracing::debug!(role = %self.role, pid = ?self.pid, "Killed process");
            }
            Err(e) => {
                tracing::warn!(role = %self.role, pid = ?self.pid, error = %e, "kill failed");
            }
        }
        self.try_status();
    }

    /// SIGTERM, wait `grace`, then SIGKILL. Always reaps.
    pub async fn terminate(&mut self, grace: Duration) {
        if self.try_status().is_some() {
            return;
        }

        if let Some(pid) = self.child.id() {
            send_sigterm(pid);
            if self.wait_timeout(grace).await.is_some() {
                tracing::debug!(role = %self.role, pid = pid, "Process exited after SIGTERM");
                return;
            }
            tracing::debug!(
                role = %self.role,
                pid = pid,
                grace_ms = grace.as_millis() as u64,
                "Process ignored SIGTERM, killing"
            );
        }

        self.kill().await;
    }

    /// Collect everything the process wrote. Call after it has exited;
    /// readers still open after `limit` (e.g. held by a grandchild) are
    /// abandoned.
    pub async fn collect_output(&mut self, limit: Duration) -> CapturedOutput {
        if let Some(output) = &self.output {
            return output.clone();
        }

        let stdout = join_reader(self.stdout.take(), limit, self.role, "stdout").await;
        let stderr = join_reader(self.stderr.take(), limit, self.role, "stderr").await;
        let output = CapturedOutput::new(stdout, stderr);
        self.output = Some(output.clone());
        output
    }
}

impl Drop for ManagedChild {
    fn drop(&mut self) {
        if self.try_status().is_none() {
            tracing::warn!(
                role = %self.role,
                pid = ?self.pid,
                "Process dropped while running, killing"
            );
            let _ = self.child.start_kill();
            let _ = self.child.try_wait();
        }
        for reader in [self.stdout.take(), self.stderr.take()].into_iter().flatten() {
            reader.abort();
        }
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        tracing::debug!(pid = pid, error = %e, "SIGTERM failed");
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {}

async fn read_stream<R: AsyncRead + Unpin>(mut stream: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = stream.read_to_end(&mut buf).await {
        tracing::debug!(error = %e, "Output stream read failed");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn join_reader(
    reader: Option<JoinHandle<String>>,
    limit: Duration,
    role: ProcessRole,
    stream: &'static str,
) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };

    match tokio::time::timeout(limit, &mut reader).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::debug!(role = %role, stream = stream, error = %e, "Reader task failed");
            String::new()
        }
        Err(_) => {
            reader.abort();
            tracing::debug!(role = %role, stream = stream, "Output pipe still open, abandoning");
            String::new()
        }
    }
}
