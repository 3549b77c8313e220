// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Statistics reducer.
//!
//! Reduces the collected measurements to descriptive statistics and a
//! consistency verdict per metric. Stateless: every call recomputes from
//! the slice it is given.

use serde::{Deserialize, Serialize};

use crate::types::Measurement;

/// Coefficient of variation (percent) below which a metric is "excellent".
pub const EXCELLENT_CV_PERCENT: f64 = 10.0;
/// Coefficient of variation (percent) below which a metric is "good".
pub const GOOD_CV_PERCENT: f64 = 25.0;

/// Qualitative stability label derived from the coefficient of variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    Excellent,
    Good,
    Poor,
}

impl Consistency {
    pub fn classify(cv_percent: f64) -> Self {
        if cv_percent < EXCELLENT_CV_PERCENT {
            Self::Excellent
        } else if cv_percent < GOOD_CV_PERCENT {
            Self::Good
        } else {
            Self::Poor
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Poor => "poor",
        }
    }
}

impl std::fmt::Display for Consistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Descriptive statistics for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation (n - 1). `None` with fewer than two samples.
    pub std_dev: Option<f64>,
}

impl MetricSummary {
    /// Summarize a non-empty slice. Returns `None` for no samples.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let std_dev = (values.len() >= 2).then(|| {
            let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        });

        Some(Self {
            mean,
            min,
            max,
            std_dev,
        })
    }

    /// `std_dev / mean * 100`. Unavailable without a deviation or with a zero mean.
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        let std_dev = self.std_dev?;
        if self.mean == 0.0 {
            return None;
        }
        Some(std_dev / self.mean.abs() * 100.0)
    }

    pub fn consistency(&self) -> Option<Consistency> {
        self.coefficient_of_variation().map(Consistency::classify)
    }
}

/// Statistics over a non-empty result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub count: usize,
    /// Payload size, taken from the first measurement.
    pub bytes_sent: u64,
    /// Set when trials reported different byte counts. The payload is
    /// assumed fixed, so this marks the run as suspect.
    pub payload_divergent: bool,
    pub elapsed_ms: MetricSummary,
    pub throughput_kbps: MetricSummary,
    pub throughput_mbps: MetricSummary,
}

impl Statistics {
    pub fn timing_consistency(&self) -> Option<Consistency> {
        self.elapsed_ms.consistency()
    }

    pub fn throughput_consistency(&self) -> Option<Consistency> {
        self.throughput_mbps.consistency()
    }
}

/// Result of [`summarize`]: either statistics or the explicit "no data" state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Summary {
    NoData,
    Stats(Statistics),
}

impl Summary {
    pub fn statistics(&self) -> Option<&Statistics> {
        match self {
            Self::NoData => None,
            Self::Stats(stats) => Some(stats),
        }
    }
}

/// Reduce measurements to a [`Summary`].
pub fn summarize(results: &[Measurement]) -> Summary {
    let Some(first) = results.first() else {
        return Summary::NoData;
    };

    let times: Vec<f64> = results.iter().map(Measurement::elapsed_ms).collect();
    let kbps: Vec<f64> = results.iter().map(Measurement::throughput_kbps).collect();
    let mbps: Vec<f64> = results.iter().map(Measurement::throughput_mbps).collect();

    let bytes_sent = first.bytes_sent();
    let payload_divergent = results.iter().any(|m| m.bytes_sent() != bytes_sent);
    if payload_divergent {
        tracing::warn!(
            first = bytes_sent,
            distinct = ?distinct_byte_counts(results),
            "Trials reported different byte counts; reporting the first"
        );
    }

    match (
        MetricSummary::from_values(&times),
        MetricSummary::from_values(&kbps),
        MetricSummary::from_values(&mbps),
    ) {
        (Some(elapsed_ms), Some(throughput_kbps), Some(throughput_mbps)) => {
            Summary::Stats(Statistics {
                count: results.len(),
                bytes_sent,
                payload_divergent,
                elapsed_ms,
                throughput_kbps,
                throughput_mbps,
            })
        }
        _ => Summary::NoData,
    }
}

fn distinct_byte_counts(results: &[Measurement]) -> Vec<u64> {
    let mut counts: Vec<u64> = results.iter().map(Measurement::bytes_sent).collect();
    counts.sort_unstable();
    counts.dedup();
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_times(times: &[f64]) -> Vec<Measurement> {
        times
            .iter()
            .map(|&t| Measurement::new(t, 1024.0, 59_811))
            .collect()
    }

    #[test]
    fn test_known_input() {
        let stats = match summarize(&with_times(&[10.0, 20.0, 30.0])) {
            Summary::Stats(stats) => stats,
            Summary::NoData => panic!("expected statistics"),
        };

        assert_eq!(stats.count, 3);
        assert_eq!(stats.elapsed_ms.mean, 20.0);
        assert_eq!(stats.elapsed_ms.min, 10.0);
        assert_eq!(stats.elapsed_ms.max, 30.0);
        assert!((stats.elapsed_ms.std_dev.unwrap() - 10.0).abs() < 1e-12);
        assert!((stats.elapsed_ms.coefficient_of_variation().unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(stats.timing_consistency(), Some(Consistency::Poor));
    }

    #[test]
    fn test_empty_input() {
        let summary = summarize(&[]);
        assert_eq!(summary, Summary::NoData);
        assert!(summary.statistics().is_none());
    }

    #[test]
    fn test_single_sample() {
        let summary = summarize(&[Measurement::new(42.5, 2048.0, 100)]);
        let stats = summary.statistics().unwrap();

        assert_eq!(stats.count, 1);
        assert_eq!(stats.elapsed_ms.mean, 42.5);
        assert_eq!(stats.elapsed_ms.min, 42.5);
        assert_eq!(stats.elapsed_ms.max, 42.5);
        assert_eq!(stats.elapsed_ms.std_dev, None);
        assert_eq!(stats.elapsed_ms.coefficient_of_variation(), None);
        assert_eq!(stats.timing_consistency(), None);
        assert_eq!(stats.throughput_mbps.mean, 2.0);
    }

    #[test]
    fn test_throughput_in_both_units() {
        let results = vec![
            Measurement::new(1.0, 1024.0, 10),
            Measurement::new(1.0, 3072.0, 10),
        ];
        let stats = summarize(&results).statistics().cloned().unwrap();

        assert_eq!(stats.throughput_kbps.mean, 2048.0);
        assert_eq!(stats.throughput_mbps.mean, 2.0);
        assert_eq!(stats.throughput_mbps.min, 1.0);
        assert_eq!(stats.throughput_mbps.max, 3.0);
        assert_eq!(
            stats.throughput_kbps.consistency(),
            stats.throughput_mbps.consistency()
        );
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(Consistency::classify(0.0), Consistency::Excellent);
        assert_eq!(Consistency::classify(9.99), Consistency::Excellent);
        assert_eq!(Consistency::classify(10.0), Consistency::Good);
        assert_eq!(Consistency::classify(24.9), Consistency::Good);
        assert_eq!(Consistency::classify(25.0), Consistency::Poor);
        assert_eq!(Consistency::classify(80.0), Consistency::Poor);
    }

    #[test]
    fn test_metrics_classified_independently() {
        // Identical times, widely spread rates.
        let results = vec![
            Measurement::new(10.0, 100.0, 1),
            Measurement::new(10.0, 1000.0, 1),
            Measurement::new(10.0, 5000.0, 1),
        ];
        let stats = summarize(&results).statistics().cloned().unwrap();
        assert_eq!(stats.timing_consistency(), Some(Consistency::Excellent));
        assert_eq!(stats.throughput_consistency(), Some(Consistency::Poor));
    }

    #[test]
    fn test_zero_mean_has_no_verdict() {
        let summary = MetricSummary::from_values(&[0.0, 0.0]).unwrap();
        assert_eq!(summary.std_dev, Some(0.0));
        assert_eq!(summary.coefficient_of_variation(), None);
        assert!(!summary.mean.is_nan());
    }

    #[test]
    fn test_bytes_reported_from_first_sample() {
        let stats = summarize(&with_times(&[1.0, 2.0])).statistics().cloned().unwrap();
        assert_eq!(stats.bytes_sent, 59_811);
        assert!(!stats.payload_divergent);
    }

    #[test]
    fn test_divergent_byte_counts_flagged() {
        let results = vec![
            Measurement::new(1.0, 1.0, 500),
            Measurement::new(1.0, 1.0, 700),
        ];
        let stats = summarize(&results).statistics().cloned().unwrap();
        assert_eq!(stats.bytes_sent, 500);
        assert!(stats.payload_divergent);
    }
}
