// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Server readiness policy.
//!
//! The stock server gives no readiness handshake, so the default probe just
//! waits a fixed warm-up delay. A real handshake can be dropped in as another
//! [`ReadinessProbe`] without touching the supervisor.

use std::time::Duration;

use async_trait::async_trait;

/// What a probe may inspect about the freshly spawned server.
#[derive(Debug, Clone, Copy)]
pub struct ServerInfo<'a> {
    pub pid: Option<u32>,
    pub address: &'a str,
}

/// Decides when the server may be considered ready to accept the client.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn wait_ready(&self, server: ServerInfo<'_>);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Assume readiness after a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl ReadinessProbe for FixedDelay {
    async fn wait_ready(&self, server: ServerInfo<'_>) {
        tracing::debug!(
            pid = ?server.pid,
            delay_ms = self.delay.as_millis() as u64,
            "Waiting for server warm-up"
        );
        tokio::time::sleep(self.delay).await;
    }

    fn name(&self) -> &'static str {
        "fixed_delay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_delay_waits() {
        let probe = FixedDelay::new(Duration::from_millis(30));
        let started = std::time::Instant::now();
        probe
            .wait_ready(ServerInfo {
                pid: None,
                address: "localhost",
            })
            .await;
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(probe.name(), "fixed_delay");
    }
}
