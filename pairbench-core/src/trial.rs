// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Trial loop.
//!
//! Runs N trials strictly one after another, keeps every successful
//! measurement in trial order and carries on past failures. Operator
//! cancellation stops the loop and returns what has been collected.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, TrialFailure};
use crate::shutdown::Shutdown;
use crate::supervisor::{TrialExecutor, TrialRecord};
use crate::types::{ResultSet, TrialOutcome};

/// Hooks for live progress output.
pub trait TrialObserver {
    fn run_started(&mut self, _total_trials: u32, _inter_trial_delay: Duration) {}
    fn trial_started(&mut self, _trial: u32, _total_trials: u32) {}
    fn trial_finished(&mut self, _record: &TrialRecord) {}
    fn waiting(&mut self, _delay: Duration) {}
    fn run_finished(&mut self, _report: &RunReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TrialObserver for NoopObserver {}

/// A trial that produced no measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTrial {
    pub trial: u32,
    pub kind: FailureKind,
    pub message: String,
}

/// Everything the loop knows once it stops.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub results: ResultSet,
    pub requested: u32,
    pub attempted: u32,
    pub failures: Vec<FailedTrial>,
    pub interrupted: bool,
}

impl RunReport {
    /// A run succeeds when at least one trial produced a measurement.
    pub fn is_success(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn successful(&self) -> usize {
        self.results.len()
    }
}

/// Drives a [`TrialExecutor`] through the requested number of trials.
pub struct TrialLoop<E> {
    executor: E,
    shutdown: Shutdown,
}

impl<E: TrialExecutor> TrialLoop<E> {
    pub fn new(executor: E, shutdown: Shutdown) -> Self {
        Self { executor, shutdown }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run without progress output.
    pub async fn run(&mut self, total_trials: u32, inter_trial_delay: Duration) -> RunReport {
        self.run_observed(total_trials, inter_trial_delay, &mut NoopObserver)
            .await
    }

    /// Run, reporting progress to `observer`.
    pub async fn run_observed(
        &mut self,
        total_trials: u32,
        inter_trial_delay: Duration,
        observer: &mut dyn TrialObserver,
    ) -> RunReport {
        let mut report = RunReport {
            requested: total_trials,
            ..RunReport::default()
        };

        tracing::info!(
            trials = total_trials,
            delay_ms = inter_trial_delay.as_millis() as u64,
            "Starting trial run"
        );
        observer.run_started(total_trials, inter_trial_delay);

        for trial in 1..=total_trials {
            if self.shutdown.is_requested() {
                report.interrupted = true;
                break;
            }

            observer.trial_started(trial, total_trials);
            let record = self.executor.execute(trial).await;
            report.attempted += 1;
            observer.trial_finished(&record);

            match record.outcome {
                TrialOutcome::Success(measurement) => {
                    tracing::info!(
                        trial = trial,
                        elapsed_ms = measurement.elapsed_ms(),
                        throughput_kbps = measurement.throughput_kbps(),
                        bytes_sent = measurement.bytes_sent(),
                        "Trial succeeded"
                    );
                    report.results.push(measurement);
                }
                TrialOutcome::Failure(TrialFailure::Interrupted) => {
                    tracing::warn!(trial = trial, "Trial interrupted");
                    report.interrupted = true;
                    break;
                }
                TrialOutcome::Failure(failure) => {
                    tracing::warn!(
                        trial = trial,
                        kind = %failure.kind(),
                        error = %failure,
                        "Trial failed, continuing"
                    );
                    report.failures.push(FailedTrial {
                        trial,
                        kind: failure.kind(),
                        message: failure.to_string(),
                    });
                }
            }

            if trial < total_trials {
                observer.waiting(inter_trial_delay);
                if self.shutdown.sleep(inter_trial_delay).await {
                    report.interrupted = true;
                    break;
                }
            }
        }

        self.executor.cleanup().await;

        if report.interrupted {
            tracing::warn!(
                attempted = report.attempted,
                successful = report.successful(),
                "Run interrupted, returning partial results"
            );
        }
        if report.is_success() {
            tracing::info!(
                successful = report.successful(),
                requested = report.requested,
                "Trial run complete"
            );
        } else {
            tracing::error!(requested = report.requested, "No trial succeeded");
        }

        observer.run_finished(&report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::{self, ShutdownTrigger};
    use crate::types::{CapturedOutput, Measurement};
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Fails the listed trials with a parse error, succeeds otherwise with
    /// elapsed time equal to the trial number.
    struct ScriptedExecutor {
        failing: HashSet<u32>,
        executed: Vec<u32>,
        cleanups: u32,
        interrupt_on: Option<(u32, ShutdownTrigger)>,
    }

    impl ScriptedExecutor {
        fn new(failing: &[u32]) -> Self {
            Self {
                failing: failing.iter().copied().collect(),
                executed: Vec::new(),
                cleanups: 0,
                interrupt_on: None,
            }
        }
    }

    #[async_trait]
    impl TrialExecutor for ScriptedExecutor {
        async fn execute(&mut self, trial: u32) -> TrialRecord {
            self.executed.push(trial);

            if let Some((at, trigger)) = &self.interrupt_on {
                if *at == trial {
                    trigger.trigger();
                }
            }

            let outcome = if self.failing.contains(&trial) {
                TrialOutcome::Failure(TrialFailure::Parse {
                    source: crate::parser::parse("garbage").unwrap_err(),
                    output: CapturedOutput::new("garbage", ""),
                })
            } else {
                TrialOutcome::Success(Measurement::new(trial as f64, 100.0, 1000))
            };
            TrialRecord::without_processes(trial, outcome, Duration::ZERO)
        }

        async fn cleanup(&mut self) {
            self.cleanups += 1;
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Vec<String>,
    }

    impl TrialObserver for RecordingObserver {
        fn trial_started(&mut self, trial: u32, total: u32) {
            self.events.push(format!("start {trial}/{total}"));
        }
        fn trial_finished(&mut self, record: &TrialRecord) {
            self.events
                .push(format!("done {} {}", record.trial, record.outcome.is_success()));
        }
        fn waiting(&mut self, _delay: Duration) {
            self.events.push("wait".to_string());
        }
    }

    #[tokio::test]
    async fn test_partial_failure_tolerance() {
        let (_trigger, shutdown) = shutdown::channel();
        let mut trials = TrialLoop::new(ScriptedExecutor::new(&[2, 4]), shutdown);

        let report = trials.run(5, Duration::ZERO).await;

        assert!(report.is_success());
        assert_eq!(report.attempted, 5);
        let times: Vec<f64> = report.results.iter().map(Measurement::elapsed_ms).collect();
        assert_eq!(times, vec![1.0, 3.0, 5.0]);
        let failed: Vec<u32> = report.failures.iter().map(|f| f.trial).collect();
        assert_eq!(failed, vec![2, 4]);
        assert!(report.failures.iter().all(|f| f.kind == FailureKind::ParseError));
        assert!(!report.interrupted);
        assert_eq!(trials.executor().cleanups, 1);
    }

    #[tokio::test]
    async fn test_all_failures_is_unsuccessful() {
        let (_trigger, shutdown) = shutdown::channel();
        let mut trials = TrialLoop::new(ScriptedExecutor::new(&[1, 2, 3]), shutdown);

        let report = trials.run(3, Duration::ZERO).await;

        assert!(!report.is_success());
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failures.len(), 3);
    }

    #[tokio::test]
    async fn test_delay_skipped_after_last_trial() {
        let (_trigger, shutdown) = shutdown::channel();
        let mut trials = TrialLoop::new(ScriptedExecutor::new(&[]), shutdown);
        let mut observer = RecordingObserver::default();

        trials
            .run_observed(3, Duration::from_millis(1), &mut observer)
            .await;

        assert_eq!(
            observer.events,
            vec![
                "start 1/3",
                "done 1 true",
                "wait",
                "start 2/3",
                "done 2 true",
                "wait",
                "start 3/3",
                "done 3 true",
            ]
        );
    }

    #[tokio::test]
    async fn test_trials_run_sequentially_in_order() {
        let (_trigger, shutdown) = shutdown::channel();
        let mut trials = TrialLoop::new(ScriptedExecutor::new(&[]), shutdown);

        trials.run(4, Duration::ZERO).await;
        assert_eq!(trials.executor().executed, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_interruption_cuts_delay_and_returns_partial_results() {
        let (trigger, shutdown) = shutdown::channel();
        let mut executor = ScriptedExecutor::new(&[]);
        executor.interrupt_on = Some((1, trigger));
        let mut trials = TrialLoop::new(executor, shutdown);

        // The long delay would hang the test if interruption were ignored.
        let report = tokio::time::timeout(
            Duration::from_secs(10),
            trials.run(5, Duration::from_secs(60)),
        )
        .await
        .expect("loop ignored shutdown");

        assert!(report.interrupted);
        assert!(report.is_success());
        assert_eq!(report.attempted, 1);
        assert_eq!(report.successful(), 1);
        assert_eq!(trials.executor().executed, vec![1]);
        assert_eq!(trials.executor().cleanups, 1);
    }

    #[tokio::test]
    async fn test_interruption_keeps_results_in_order() {
        let (trigger, shutdown) = shutdown::channel();
        let mut executor = ScriptedExecutor::new(&[2]);
        executor.interrupt_on = Some((3, trigger));
        let mut trials = TrialLoop::new(executor, shutdown);

        let report = trials.run(5, Duration::ZERO).await;

        assert!(report.interrupted);
        assert_eq!(report.attempted, 3);
        let times: Vec<f64> = report.results.iter().map(Measurement::elapsed_ms).collect();
        assert_eq!(times, vec![1.0, 3.0]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(trials.executor().executed, vec![1, 2, 3]);
        assert_eq!(trials.executor().cleanups, 1);
    }

    #[tokio::test]
    async fn test_interrupted_trial_stops_loop() {
        struct InterruptedExecutor;

        #[async_trait]
        impl TrialExecutor for InterruptedExecutor {
            async fn execute(&mut self, trial: u32) -> TrialRecord {
                TrialRecord::without_processes(
                    trial,
                    TrialOutcome::Failure(TrialFailure::Interrupted),
                    Duration::ZERO,
                )
            }
        }

        let (_trigger, shutdown) = shutdown::channel();
        let mut trials = TrialLoop::new(InterruptedExecutor, shutdown);
        let report = trials.run(3, Duration::ZERO).await;

        assert!(report.interrupted);
        assert_eq!(report.attempted, 1);
        assert!(report.failures.is_empty());
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_already_cancelled_runs_nothing() {
        let (trigger, shutdown) = shutdown::channel();
        trigger.trigger();
        let mut trials = TrialLoop::new(ScriptedExecutor::new(&[]), shutdown);

        let report = trials.run(3, Duration::ZERO).await;
        assert!(report.interrupted);
        assert_eq!(report.attempted, 0);
        assert!(trials.executor().executed.is_empty());
        assert_eq!(trials.executor().cleanups, 1);
    }
}
