// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Operator cancellation signal.
//!
//! The CLI flips the trigger from its Ctrl+C handler; the trial loop and the
//! supervisor observe it at every blocking point.

use std::time::Duration;

use tokio::sync::watch;

/// Sending half. Dropping it without triggering means "never cancelled".
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half, cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested. Pends forever if the
    /// trigger is dropped untriggered.
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration`. Returns `true` if cut short by shutdown.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_requested() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.requested() => true,
        }
    }
}

/// Create a connected trigger/receiver pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes_without_trigger() {
        let (_trigger, shutdown) = channel();
        assert!(!shutdown.sleep(Duration::from_millis(10)).await);
        assert!(!shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_trigger_cuts_sleep_short() {
        let (trigger, shutdown) = channel();
        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move { waiter.sleep(Duration::from_secs(30)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger();

        let interrupted = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sleep was not interrupted")
            .unwrap();
        assert!(interrupted);
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_dropped_trigger_never_fires() {
        let (trigger, shutdown) = channel();
        drop(trigger);
        assert!(!shutdown.sleep(Duration::from_millis(10)).await);
    }
}
