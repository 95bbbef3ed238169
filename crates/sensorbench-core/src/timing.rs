//! Per-iteration timing records and their aggregation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transfer and compute time of one invocation, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InferenceTiming {
    /// Time spent moving data to and from the engine
    pub transfer_ms: f64,
    /// Time spent computing
    pub compute_ms: f64,
}

impl InferenceTiming {
    /// Timing from measured durations
    pub fn from_durations(transfer: Duration, compute: Duration) -> Self {
        Self {
            transfer_ms: duration_ms(transfer),
            compute_ms: duration_ms(compute),
        }
    }

    /// Compute-only timing (CPU reference path has no transfer phase)
    pub fn compute_only(compute: Duration) -> Self {
        Self::from_durations(Duration::ZERO, compute)
    }

    /// `transfer + compute`
    pub fn total_ms(&self) -> f64 {
        self.transfer_ms + self.compute_ms
    }
}

/// A value paired with the time it took to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<T> {
    /// Produced value
    pub value: T,
    /// Measured timing
    pub timing: InferenceTiming,
}

impl<T> Timed<T> {
    /// Pair a value with its timing
    pub fn new(value: T, timing: InferenceTiming) -> Self {
        Self { value, timing }
    }
}

/// Population mean/std-dev/min/max of a series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Mean
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Minimum
    pub min: f64,
    /// Maximum
    pub max: f64,
}

impl StatsSummary {
    /// Summarize `values`. Empty input gives all zeros.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std_dev: variance.sqrt(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Aggregated timing of a run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimingStats {
    /// Number of samples aggregated
    pub samples: usize,
    /// Total time per iteration
    pub total: StatsSummary,
    /// Transfer time per iteration
    pub transfer: StatsSummary,
    /// Compute time per iteration
    pub compute: StatsSummary,
}

impl TimingStats {
    /// Aggregate a set of per-iteration samples
    pub fn from_samples(samples: &[InferenceTiming]) -> Self {
        let total: Vec<f64> = samples.iter().map(InferenceTiming::total_ms).collect();
        let transfer: Vec<f64> = samples.iter().map(|t| t.transfer_ms).collect();
        let compute: Vec<f64> = samples.iter().map(|t| t.compute_ms).collect();
        Self {
            samples: samples.len(),
            total: StatsSummary::from_values(&total),
            transfer: StatsSummary::from_values(&transfer),
            compute: StatsSummary::from_values(&compute),
        }
    }
}

/// Duration as fractional milliseconds
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}

/// Operations per second for `operations` completed in `mean_ms`.
///
/// Returns 0 when the duration is not positive.
#[allow(clippy::cast_precision_loss)]
pub fn throughput_ops_per_sec(operations: usize, mean_ms: f64) -> f64 {
    if mean_ms <= 0.0 {
        return 0.0;
    }
    operations as f64 / (mean_ms / 1_000.0)
}
