//! # Load Run Metrics
//!
//! This module defines the immutable aggregation record produced by a single
//! load run, together with the helpers used to reduce raw per-request
//! latencies into that record and to render it for humans.
//!
//! A `Metrics` value is built exactly once, at the end of a load run, from
//! the full set of successful latencies, the error count and the wall-clock
//! duration of the run. Nothing mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregated outcome of one load run
///
/// Latencies are expressed in seconds. The record always satisfies
/// `total_requests == successful + errors`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_requests: usize,
    pub successful: usize,
    pub errors: usize,
    pub avg_latency: f64,
    pub median_latency: f64,
    pub throughput: f64,
}

impl Metrics {
    /// Build the record from the successful latencies, the error count and
    /// the wall-clock duration of the whole run.
    ///
    /// Empty latency sets yield zero averages, and a zero elapsed time yields
    /// zero throughput, so no division by zero can occur.
    pub fn from_samples(latencies: &[Duration], errors: usize, elapsed: Duration) -> Self {
        let seconds: Vec<f64> = latencies.iter().map(Duration::as_secs_f64).collect();
        let successful = seconds.len();
        let total_requests = successful + errors;

        let elapsed_secs = elapsed.as_secs_f64();
        let throughput = if elapsed_secs > 0.0 {
            total_requests as f64 / elapsed_secs
        } else {
            0.0
        };

        Self {
            total_requests,
            successful,
            errors,
            avg_latency: mean(&seconds),
            median_latency: median(&seconds),
            throughput,
        }
    }

    /// Metrics of a run that issued no requests at all
    pub fn empty() -> Self {
        Self::from_samples(&[], 0, Duration::ZERO)
    }

    /// Value of a single metric, as plotted in the sweep matrix
    pub fn value(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::AvgLatency => self.avg_latency,
            MetricKind::MedianLatency => self.median_latency,
            MetricKind::Throughput => self.throughput,
            MetricKind::Errors => self.errors as f64,
        }
    }

    /// Fraction of requests that failed, 0 when nothing was issued
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.errors as f64 / self.total_requests as f64
        }
    }
}

/// Metrics carried into the multi-query comparison matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    AvgLatency,
    MedianLatency,
    Throughput,
    Errors,
}

impl MetricKind {
    /// Every metric recorded per query, in report order
    pub const ALL: [MetricKind; 4] = [
        MetricKind::AvgLatency,
        MetricKind::MedianLatency,
        MetricKind::Throughput,
        MetricKind::Errors,
    ];
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::AvgLatency => write!(f, "avg_latency"),
            MetricKind::MedianLatency => write!(f, "median_latency"),
            MetricKind::Throughput => write!(f, "throughput"),
            MetricKind::Errors => write!(f, "errors"),
        }
    }
}

/// Arithmetic mean, 0 for an empty slice
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median with the midpoint of the two central values for even counts,
/// 0 for an empty slice
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Utility functions for rendering metrics
pub mod utils {
    /// Format a latency given in seconds for human-readable output
    pub fn format_latency(seconds: f64) -> String {
        if seconds < 0.001 {
            format!("{:.2}μs", seconds * 1_000_000.0)
        } else if seconds < 1.0 {
            format!("{:.2}ms", seconds * 1_000.0)
        } else {
            format!("{:.2}s", seconds)
        }
    }

    /// Format a request or document rate
    pub fn format_rate(per_second: f64, unit: &str) -> String {
        format!("{:.2} {}/s", per_second, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples_counts_every_request() {
        let latencies = vec![Duration::from_millis(10), Duration::from_millis(30)];
        let metrics = Metrics::from_samples(&latencies, 3, Duration::from_secs(1));

        assert_eq!(metrics.total_requests, 5);
        assert_eq!(metrics.successful, 2);
        assert_eq!(metrics.errors, 3);
        assert!((metrics.avg_latency - 0.02).abs() < 1e-9);
        assert!((metrics.median_latency - 0.02).abs() < 1e-9);
        assert!((metrics.throughput - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_run_has_no_division_by_zero() {
        let metrics = Metrics::empty();

        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.avg_latency, 0.0);
        assert_eq!(metrics.median_latency, 0.0);
        assert_eq!(metrics.throughput, 0.0);
        assert_eq!(metrics.error_rate(), 0.0);
    }

    #[test]
    fn test_all_errors() {
        let metrics = Metrics::from_samples(&[], 7, Duration::from_millis(500));

        assert_eq!(metrics.successful, 0);
        assert_eq!(metrics.errors, 7);
        assert_eq!(metrics.avg_latency, 0.0);
        assert_eq!(metrics.median_latency, 0.0);
        assert!((metrics.throughput - 14.0).abs() < 1e-9);
        assert_eq!(metrics.error_rate(), 1.0);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_metric_kind_values() {
        let metrics = Metrics::from_samples(&[Duration::from_secs(2)], 1, Duration::from_secs(2));

        assert_eq!(metrics.value(MetricKind::AvgLatency), 2.0);
        assert_eq!(metrics.value(MetricKind::MedianLatency), 2.0);
        assert_eq!(metrics.value(MetricKind::Throughput), 1.0);
        assert_eq!(metrics.value(MetricKind::Errors), 1.0);
        assert_eq!(MetricKind::MedianLatency.to_string(), "median_latency");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(utils::format_latency(0.0000015), "1.50μs");
        assert_eq!(utils::format_latency(0.0015), "1.50ms");
        assert_eq!(utils::format_latency(1.5), "1.50s");
        assert_eq!(utils::format_rate(12.5, "req"), "12.50 req/s");
    }
}
