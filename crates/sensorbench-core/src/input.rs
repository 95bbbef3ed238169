//! Conversion of integer sensor batches into FFT-ready float inputs.
//!
//! The per-bin weights are a synthetic boost driven by window energy:
//!
//! ```text
//! weight[bin] = 1 + (Σ magnitude / N) · 1e-5 + bin · 2.5e-3
//! ```
//!
//! Both constants are kept exactly as-is so results stay comparable with
//! previously recorded golden outputs.

use crate::error::{BenchError, Result};
use crate::generator::SampleBatch;
use serde::{Deserialize, Serialize};

/// Scale applied to the mean magnitude energy of a window
pub const ENERGY_SCALE: f32 = 0.000_01;

/// Linear per-bin slope of the weight vector
pub const BIN_SLOPE: f32 = 0.0025;

/// Number of one-sided frequency bins for a real signal of length `n`
pub const fn bin_count(signal_length: usize) -> usize {
    signal_length / 2 + 1
}

/// Per-channel magnitude signals and weight vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FftInput {
    /// `[channel][signal_length]` magnitudes
    pub samples: Vec<Vec<f32>>,
    /// `[channel][bins]` weights
    pub weights: Vec<Vec<f32>>,
}

impl FftInput {
    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Signal length of the first channel (0 when empty)
    pub fn signal_length(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }
}

/// Build magnitude signals and weights from the first `signal_length` samples
/// of every channel.
///
/// # Errors
///
/// - `InvalidInput` for an empty batch or zero signal length
/// - `InsufficientSamples` when a channel is shorter than `signal_length`
pub fn build_fft_input(batch: &SampleBatch, signal_length: usize) -> Result<FftInput> {
    if batch.channels.is_empty() {
        return Err(BenchError::invalid_input("empty batch"));
    }
    if signal_length == 0 {
        return Err(BenchError::invalid_input("signal_length must be > 0"));
    }

    let mut samples = Vec::with_capacity(batch.channels.len());
    for (channel, sensor) in batch.channels.iter().enumerate() {
        if sensor.len() < signal_length {
            return Err(BenchError::InsufficientSamples {
                channel,
                required: signal_length,
                available: sensor.len(),
            });
        }
        #[allow(clippy::cast_possible_truncation)]
        let magnitudes: Vec<f32> = (0..signal_length)
            .map(|i| sensor.magnitude(i) as f32)
            .collect();
        samples.push(magnitudes);
    }

    let weights = samples
        .iter()
        .map(|window| energy_weights(window, signal_length))
        .collect();

    Ok(FftInput { samples, weights })
}

/// Weight vector for one magnitude window.
#[allow(clippy::cast_precision_loss)]
pub fn energy_weights(window: &[f32], signal_length: usize) -> Vec<f32> {
    let energy: f32 = window.iter().sum();
    let normalized_energy = energy / signal_length as f32;
    (0..bin_count(signal_length))
        .map(|bin| {
            let slope = BIN_SLOPE * bin as f32;
            1.0 + normalized_energy * ENERGY_SCALE + slope
        })
        .collect()
}
