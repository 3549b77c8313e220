// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Best-effort removal of stale server processes left by a crashed run.
//!
//! This is the only guard around the shared process name and port; it is
//! not mutual exclusion.

use sysinfo::{Pid, Process, System};

/// Kills processes whose name or executable matches a pattern.
#[derive(Debug, Clone)]
pub struct StaleProcessSweep {
    pattern: String,
}

impl StaleProcessSweep {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Kill every matching process except this one. Returns how many were
    /// signalled. Finding none is not an error.
    pub fn sweep(&self) -> usize {
        let own_pid = sysinfo::get_current_pid().ok();

        let mut system = System::new();
        system.refresh_processes();

        let mut killed = 0;
        for (pid, process) in system.processes() {
            if Some(*pid) == own_pid || !self.matches(process) {
                continue;
            }
            if process.kill() {
                killed += 1;
                tracing::debug!(
                    pid = pid.as_u32(),
                    name = %process.name(),
                    "Killed stale process"
                );
            }
        }

        if killed > 0 {
            tracing::info!(pattern = %self.pattern, killed = killed, "Swept stale processes");
        }
        killed
    }

    /// [`sweep`](Self::sweep) on the blocking pool, keeping the process
    /// table scan off the async workers.
    pub async fn sweep_blocking(&self) -> usize {
        let sweep = self.clone();
        match tokio::task::spawn_blocking(move || sweep.sweep()).await {
            Ok(killed) => killed,
            Err(e) => {
                tracing::warn!(pattern = %self.pattern, error = %e, "Stale process sweep task failed");
                0
            }
        }
    }

    /// Whether the process with `pid` would be swept.
    pub fn matches_pid(&self, pid: u32) -> bool {
        let mut system = System::new();
        system.refresh_processes();
        system
            .process(Pid::from_u32(pid))
            .map(|p| self.matches(p))
            .unwrap_or(false)
    }

    // Only the process name and argv[0] are considered, never the full
    // argument list, so a harness invoked with the pattern in its own
    // arguments (or its threads) is never matched.
    fn matches(&self, process: &Process) -> bool {
        if process.name().contains(&self.pattern) {
            return true;
        }
        process
            .cmd()
            .first()
            .and_then(|argv0| std::path::Path::new(argv0).file_name())
            .map(|name| name.to_string_lossy().contains(&self.pattern))
            .unwrap_or(false)
    }
}
