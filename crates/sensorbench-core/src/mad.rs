//! CPU reference MAD engine: mean/std/min/max of blocked magnitude averages.
//!
//! Readings are split into consecutive, non-overlapping 5 s windows anchored
//! at the first timestamp. Each non-empty window is reduced to the mean of its
//! magnitudes, and the block means are then summarized with population
//! statistics.

use crate::generator::SensorChannel;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Window length in milliseconds
pub const WINDOW_MS: i64 = 5_000;

/// One `(timestamp, |acc|)` reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MadReading {
    /// Timestamp (ms)
    pub timestamp: i64,
    /// Euclidean norm of the three axes
    pub magnitude: f64,
}

/// Summary statistics over the window means.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MadResult {
    /// Mean of window means
    pub mean: f64,
    /// Population std-dev of window means
    pub std_dev: f64,
    /// Smallest window mean
    pub min: f64,
    /// Largest window mean
    pub max: f64,
}

impl MadResult {
    /// Result for an input with no windows
    pub const ZERO: Self = Self {
        mean: 0.0,
        std_dev: 0.0,
        min: 0.0,
        max: 0.0,
    };
}

/// Turn a sensor channel into time-ordered magnitude readings.
pub fn readings_from_channel(channel: &SensorChannel) -> Vec<MadReading> {
    channel
        .timestamps()
        .iter()
        .enumerate()
        .map(|(i, &timestamp)| MadReading {
            timestamp,
            magnitude: channel.magnitude(i),
        })
        .collect()
}

/// Block means of every non-empty 5 s window, in time order.
///
/// Readings are expected in non-decreasing timestamp order.
#[allow(clippy::cast_precision_loss)]
pub fn window_means(readings: &[MadReading]) -> Vec<f64> {
    let Some(first) = readings.first() else {
        return Vec::new();
    };

    let mut means = Vec::new();
    let mut window_end = first.timestamp + WINDOW_MS;
    let (mut sum, mut count) = (0.0f64, 0usize);

    for reading in readings {
        if reading.timestamp >= window_end {
            if count > 0 {
                means.push(sum / count as f64);
            }
            // Skip empty windows between sparse readings
            let gap = (reading.timestamp - window_end) / WINDOW_MS;
            window_end += (gap + 1) * WINDOW_MS;
            sum = 0.0;
            count = 0;
        }
        sum += reading.magnitude;
        count += 1;
    }
    if count > 0 {
        means.push(sum / count as f64);
    }
    means
}

/// Compute the MAD summary for one channel's readings.
///
/// Empty input yields [`MadResult::ZERO`].
#[allow(clippy::cast_precision_loss)]
pub fn compute_mad(readings: &[MadReading]) -> MadResult {
    let means = window_means(readings);
    if means.is_empty() {
        return MadResult::ZERO;
    }

    let n = means.len() as f64;
    let mean = means.iter().sum::<f64>() / n;
    let variance = means.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n;
    let min = means.iter().copied().fold(f64::INFINITY, f64::min);
    let max = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    debug!("MAD CPU: {} readings, {} windows", readings.len(), means.len());

    MadResult {
        mean,
        std_dev: variance.sqrt(),
        min,
        max,
    }
}

/// Convenience wrapper: readings + MAD for a whole channel.
pub fn compute_channel_mad(channel: &SensorChannel) -> MadResult {
    compute_mad(&readings_from_channel(channel))
}
