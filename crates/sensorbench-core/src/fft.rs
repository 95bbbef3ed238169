//! CPU reference FFT engine.
//!
//! Computes the one-sided spectrum of every channel with an O(N log N)
//! transform, applies the configured normalization, and weights the
//! magnitudes per bin:
//!
//! ```text
//! samples[ch][N] ──FFT──► X[k], k = 0..=N/2
//!                          │ × norm  (1, 1/N or 1/√N)
//!                          ▼
//!                  |X[k]|  ──× weight[ch][k]──►  weighted[ch][k]
//! ```
//!
//! The streaming path reuses a single set of scratch buffers, so working
//! memory stays O(N) no matter how many channels are processed.

use crate::error::{BenchError, Result};
use crate::input::bin_count;
use rustfft::num_complex::{Complex32, Complex64};
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Scaling applied to the real and imaginary parts before magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FftNormalization {
    /// Raw transform (×1)
    #[default]
    None,
    /// ×1/N
    BySignalLength,
    /// ×1/√N
    BySqrtSignalLength,
}

impl FftNormalization {
    /// Multiplicative factor for a signal of length `n`
    #[allow(clippy::cast_precision_loss)]
    pub fn factor(self, signal_length: usize) -> f64 {
        match self {
            Self::None => 1.0,
            Self::BySignalLength => 1.0 / signal_length as f64,
            Self::BySqrtSignalLength => 1.0 / (signal_length as f64).sqrt(),
        }
    }
}

/// Full per-channel output of one `process` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FftResult {
    /// `[channel][bins]` normalized complex spectrum
    pub spectra: Vec<Vec<Complex32>>,
    /// `[channel][bins]` magnitudes
    pub magnitudes: Vec<Vec<f32>>,
    /// `[channel][bins]` magnitude × weight
    pub weighted_magnitudes: Vec<Vec<f32>>,
}

impl FftResult {
    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.magnitudes.len()
    }
}

/// One channel's output, borrowed from the engine's scratch buffers.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSpectrum<'a> {
    /// Channel index
    pub channel: usize,
    /// Normalized complex spectrum
    pub spectrum: &'a [Complex32],
    /// Magnitudes
    pub magnitudes: &'a [f32],
    /// Weighted magnitudes
    pub weighted: &'a [f32],
}

/// Reference FFT processor for a fixed `(channels, signal_length)` shape.
pub struct FftCpuProcessor {
    num_channels: usize,
    signal_length: usize,
    bins: usize,
    normalization: FftNormalization,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
    spectrum: Vec<Complex32>,
    magnitudes: Vec<f32>,
    weighted: Vec<f32>,
}

impl fmt::Debug for FftCpuProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftCpuProcessor")
            .field("num_channels", &self.num_channels)
            .field("signal_length", &self.signal_length)
            .field("normalization", &self.normalization)
            .finish_non_exhaustive()
    }
}

impl FftCpuProcessor {
    /// Create an unnormalized processor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `num_channels == 0` or `signal_length < 2`.
    pub fn new(num_channels: usize, signal_length: usize) -> Result<Self> {
        Self::with_normalization(num_channels, signal_length, FftNormalization::None)
    }

    /// Create a processor with an explicit normalization mode.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `num_channels == 0` or `signal_length < 2`.
    pub fn with_normalization(
        num_channels: usize,
        signal_length: usize,
        normalization: FftNormalization,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(BenchError::invalid_input("num_channels must be > 0"));
        }
        if signal_length < 2 {
            return Err(BenchError::invalid_input(format!(
                "signal_length must be > 1, got {signal_length}"
            )));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(signal_length);
        let bins = bin_count(signal_length);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            num_channels,
            signal_length,
            bins,
            normalization,
            fft,
            buffer: vec![Complex64::new(0.0, 0.0); signal_length],
            scratch,
            spectrum: vec![Complex32::new(0.0, 0.0); bins],
            magnitudes: vec![0.0; bins],
            weighted: vec![0.0; bins],
        })
    }

    /// Configured channel count
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Configured signal length
    pub fn signal_length(&self) -> usize {
        self.signal_length
    }

    /// Number of output bins (`N/2 + 1`)
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Normalization mode
    pub fn normalization(&self) -> FftNormalization {
        self.normalization
    }

    /// Transform every channel and materialize the full result.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if channel counts or lengths disagree with the
    /// processor configuration.
    pub fn process(&mut self, samples: &[Vec<f32>], weights: &[Vec<f32>]) -> Result<FftResult> {
        let channels = samples.len();
        let mut result = FftResult {
            spectra: Vec::with_capacity(channels),
            magnitudes: Vec::with_capacity(channels),
            weighted_magnitudes: Vec::with_capacity(channels),
        };
        self.process_streaming(samples, weights, |out| {
            result.spectra.push(out.spectrum.to_vec());
            result.magnitudes.push(out.magnitudes.to_vec());
            result.weighted_magnitudes.push(out.weighted.to_vec());
            Ok(())
        })?;
        Ok(result)
    }

    /// Transform one channel at a time, handing each result to `on_channel`
    /// before the scratch buffers are reused for the next channel.
    ///
    /// All shapes are validated before the first channel is transformed.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` on bad shapes, or whatever `on_channel` returns.
    pub fn process_streaming<F>(
        &mut self,
        samples: &[Vec<f32>],
        weights: &[Vec<f32>],
        mut on_channel: F,
    ) -> Result<()>
    where
        F: FnMut(ChannelSpectrum<'_>) -> Result<()>,
    {
        self.validate(samples, weights)?;
        debug!(
            "FFT CPU: {} channels × {} samples ({:?})",
            self.num_channels, self.signal_length, self.normalization
        );

        for (channel, (signal, weight)) in samples.iter().zip(weights).enumerate() {
            self.transform_channel(signal, weight);
            on_channel(ChannelSpectrum {
                channel,
                spectrum: &self.spectrum,
                magnitudes: &self.magnitudes,
                weighted: &self.weighted,
            })?;
        }
        Ok(())
    }

    fn validate(&self, samples: &[Vec<f32>], weights: &[Vec<f32>]) -> Result<()> {
        if samples.len() != self.num_channels {
            return Err(BenchError::shape_mismatch(
                "sample channels",
                self.num_channels,
                samples.len(),
            ));
        }
        if weights.len() != self.num_channels {
            return Err(BenchError::shape_mismatch(
                "weight channels",
                self.num_channels,
                weights.len(),
            ));
        }
        for (channel, (signal, weight)) in samples.iter().zip(weights).enumerate() {
            if signal.len() != self.signal_length {
                return Err(BenchError::shape_mismatch(
                    format!("samples[{channel}]"),
                    self.signal_length,
                    signal.len(),
                ));
            }
            if weight.len() != self.bins {
                return Err(BenchError::shape_mismatch(
                    format!("weights[{channel}]"),
                    self.bins,
                    weight.len(),
                ));
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn transform_channel(&mut self, signal: &[f32], weight: &[f32]) {
        for (dst, &src) in self.buffer.iter_mut().zip(signal) {
            *dst = Complex64::new(f64::from(src), 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = self.normalization.factor(self.signal_length);
        for k in 0..self.bins {
            let re = self.buffer[k].re * scale;
            let im = self.buffer[k].im * scale;
            let magnitude = (re * re + im * im).sqrt() as f32;
            self.spectrum[k] = Complex32::new(re as f32, im as f32);
            self.magnitudes[k] = magnitude;
            self.weighted[k] = magnitude * weight[k];
        }
    }
}

/// Direct O(N²) real DFT, one-sided (`N/2 + 1` bins), unnormalized.
///
/// Slow but obviously correct; used to cross-check the fast engine on small
/// signals.
#[allow(clippy::cast_precision_loss)]
pub fn dft_reference(signal: &[f32]) -> Vec<Complex64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let step = 2.0 * PI / n as f64;
    (0..bin_count(n))
        .map(|k| {
            let (mut re, mut im) = (0.0f64, 0.0f64);
            for (t, &sample) in signal.iter().enumerate() {
                // (k·t) mod n keeps the angle small for large n
                let angle = step * ((k * t) % n) as f64;
                re += f64::from(sample) * angle.cos();
                im -= f64::from(sample) * angle.sin();
            }
            Complex64::new(re, im)
        })
        .collect()
}

/// Magnitudes of [`dft_reference`].
pub fn dft_magnitudes(signal: &[f32]) -> Vec<f64> {
    dft_reference(signal).iter().map(|c| c.norm()).collect()
}
