// SPDX-License-Identifier: AGPL-3.0-only

//! Software (emulated accelerator) backend
//!
//! Implements [`AcceleratedBackend`] with single-precision CPU arithmetic, the
//! precision an accelerator delegate typically runs at. It gives the executor
//! and the precision validators a real non-reference backend on any host:
//!
//! 1. **Side-by-side comparison**: the same input through the f64 reference
//!    engines and through this f32 path quantifies the single-precision cost.
//!
//! 2. **CI without hardware**: every executor path that needs a backend can run
//!    with this one.
//!
//! ## Execution model
//!
//! ```text
//! caller buffers ──staging copy──► backend buffers      (transfer_ms)
//!                                      │
//!                                      ▼
//!                           f32 FFT / f32 MAD reduction  (compute_ms)
//! ```
//!
//! The staging copy stands in for host→device upload so transfer and compute
//! are reported separately, like a real delegate.

use crate::backend::{AcceleratedBackend, BackendConfig, BackendKind};
use crate::error::{BenchError, Result};
use crate::fft::{FftNormalization, FftResult};
use crate::generator::SensorChannel;
use crate::input::{bin_count, FftInput};
use crate::mad::{MadResult, WINDOW_MS};
use crate::timing::{InferenceTiming, Timed};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Software backend.
pub struct SoftwareBackend {
    num_channels: usize,
    signal_length: usize,
    normalization: FftNormalization,
    fft: Arc<dyn Fft<f32>>,

    // Staging area ("device memory")
    staged_samples: Vec<Vec<f32>>,
    staged_weights: Vec<Vec<f32>>,
    staged_channel: Option<SensorChannel>,

    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
    closed: bool,
}

impl fmt::Debug for SoftwareBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareBackend")
            .field("num_channels", &self.num_channels)
            .field("signal_length", &self.signal_length)
            .field("normalization", &self.normalization)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl SoftwareBackend {
    /// Create a software backend for the configured FFT shape.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the shape cannot be planned.
    pub fn init(config: &BackendConfig) -> Result<Self> {
        if config.num_channels == 0 || config.signal_length < 2 {
            return Err(BenchError::backend_unavailable(
                BackendKind::Software,
                format!(
                    "unsupported shape {} × {}",
                    config.num_channels, config.signal_length
                ),
            ));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.signal_length);
        let scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        info!(
            "SoftwareBackend: planned f32 FFT N={} for {} channels",
            config.signal_length, config.num_channels
        );

        Ok(Self {
            num_channels: config.num_channels,
            signal_length: config.signal_length,
            normalization: config.normalization,
            fft,
            staged_samples: Vec::new(),
            staged_weights: Vec::new(),
            staged_channel: None,
            buffer: vec![Complex32::new(0.0, 0.0); config.signal_length],
            scratch,
            closed: false,
        })
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(BenchError::backend_processing(
                BackendKind::Software,
                "backend already closed",
            ));
        }
        Ok(())
    }

    fn check_fft_shape(&self, input: &FftInput) -> Result<()> {
        let bins = bin_count(self.signal_length);
        let fail = |msg: String| BenchError::backend_processing(BackendKind::Software, msg);

        if input.samples.len() != self.num_channels || input.weights.len() != self.num_channels {
            return Err(fail(format!(
                "expected {} channels, got {} samples / {} weights",
                self.num_channels,
                input.samples.len(),
                input.weights.len()
            )));
        }
        for (ch, (s, w)) in input.samples.iter().zip(&input.weights).enumerate() {
            if s.len() != self.signal_length || w.len() != bins {
                return Err(fail(format!(
                    "channel {ch}: expected {}/{bins} samples/weights, got {}/{}",
                    self.signal_length,
                    s.len(),
                    w.len()
                )));
            }
        }
        Ok(())
    }

    /// Upload: copy the caller's buffers into backend-owned staging buffers.
    fn stage_fft(&mut self, input: &FftInput) {
        self.staged_samples.clone_from(&input.samples);
        self.staged_weights.clone_from(&input.weights);
    }

    #[allow(clippy::cast_precision_loss)]
    fn compute_fft(&mut self) -> FftResult {
        let bins = bin_count(self.signal_length);
        let scale = match self.normalization {
            FftNormalization::None => 1.0f32,
            FftNormalization::BySignalLength => 1.0 / self.signal_length as f32,
            FftNormalization::BySqrtSignalLength => 1.0 / (self.signal_length as f32).sqrt(),
        };

        let mut result = FftResult {
            spectra: Vec::with_capacity(self.num_channels),
            magnitudes: Vec::with_capacity(self.num_channels),
            weighted_magnitudes: Vec::with_capacity(self.num_channels),
        };

        for (signal, weights) in self.staged_samples.iter().zip(&self.staged_weights) {
            for (dst, &src) in self.buffer.iter_mut().zip(signal) {
                *dst = Complex32::new(src, 0.0);
            }
            self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

            let spectrum: Vec<Complex32> = self.buffer[..bins].iter().map(|&c| c * scale).collect();
            let magnitudes: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
            let weighted = magnitudes.iter().zip(weights).map(|(m, w)| m * w).collect();

            result.spectra.push(spectrum);
            result.magnitudes.push(magnitudes);
            result.weighted_magnitudes.push(weighted);
        }
        result
    }
}

/// Single-precision windowed MAD over a staged channel.
#[allow(clippy::cast_precision_loss)]
fn mad_f32(channel: &SensorChannel) -> MadResult {
    let mut means: Vec<f32> = Vec::new();
    let Some(&first) = channel.timestamps().first() else {
        return MadResult::ZERO;
    };

    let mut window_end = first + WINDOW_MS;
    let (mut sum, mut count) = (0.0f32, 0u32);
    for (i, &ts) in channel.timestamps().iter().enumerate() {
        let Some((x, y, z)) = channel.axes(i) else {
            break;
        };
        if ts >= window_end {
            if count > 0 {
                means.push(sum / count as f32);
            }
            window_end += ((ts - window_end) / WINDOW_MS + 1) * WINDOW_MS;
            sum = 0.0;
            count = 0;
        }
        let (x, y, z) = (x as f32, y as f32, z as f32);
        sum += (x * x + y * y + z * z).sqrt();
        count += 1;
    }
    if count > 0 {
        means.push(sum / count as f32);
    }

    let n = means.len() as f32;
    let mean = means.iter().sum::<f32>() / n;
    let variance = means.iter().map(|m| (m - mean) * (m - mean)).sum::<f32>() / n;
    MadResult {
        mean: f64::from(mean),
        std_dev: f64::from(variance.sqrt()),
        min: f64::from(means.iter().copied().fold(f32::INFINITY, f32::min)),
        max: f64::from(means.iter().copied().fold(f32::NEG_INFINITY, f32::max)),
    }
}

impl AcceleratedBackend for SoftwareBackend {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn process_fft(&mut self, input: &FftInput) -> Result<Timed<FftResult>> {
        self.ensure_open()?;
        self.check_fft_shape(input)?;

        let transfer_start = Instant::now();
        self.stage_fft(input);
        let transfer = transfer_start.elapsed();

        let compute_start = Instant::now();
        let result = self.compute_fft();
        let compute = compute_start.elapsed();

        debug!("SoftwareBackend FFT: transfer {transfer:?}, compute {compute:?}");
        Ok(Timed::new(result, InferenceTiming::from_durations(transfer, compute)))
    }

    fn process_mad(&mut self, channel: &SensorChannel) -> Result<Timed<MadResult>> {
        self.ensure_open()?;

        let transfer_start = Instant::now();
        let staged = self.staged_channel.insert(channel.clone());
        let transfer = transfer_start.elapsed();

        let compute_start = Instant::now();
        let result = mad_f32(staged);
        let compute = compute_start.elapsed();

        debug!("SoftwareBackend MAD: transfer {transfer:?}, compute {compute:?}");
        Ok(Timed::new(result, InferenceTiming::from_durations(transfer, compute)))
    }

    fn close(&mut self) {
        if !self.closed {
            debug!("SoftwareBackend: releasing staging buffers");
        }
        self.staged_samples = Vec::new();
        self.staged_weights = Vec::new();
        self.staged_channel = None;
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::FftCpuProcessor;
    use crate::generator;
    use crate::input::build_fft_input;
    use crate::mad::compute_channel_mad;

    fn backend(channels: usize, n: usize) -> SoftwareBackend {
        SoftwareBackend::init(&BackendConfig::new(BackendKind::Software, channels, n)).unwrap()
    }

    #[test]
    fn fft_agrees_with_reference() {
        let batch = generator::generate(3, 1024, 7).unwrap();
        let input = build_fft_input(&batch, 1024).unwrap();
        let reference = FftCpuProcessor::new(3, 1024)
            .unwrap()
            .process(&input.samples, &input.weights)
            .unwrap();

        let mut b = backend(3, 1024);
        let out = b.process_fft(&input).unwrap();
        assert!(out.timing.transfer_ms >= 0.0 && out.timing.compute_ms >= 0.0);

        for (r, c) in reference
            .weighted_magnitudes
            .iter()
            .flatten()
            .zip(out.value.weighted_magnitudes.iter().flatten())
        {
            if r.abs() >= 1e3 {
                assert!((r - c).abs() / r.abs() < 1e-3, "reference {r} vs software {c}");
            }
        }
    }

    #[test]
    fn mad_agrees_with_reference() {
        let batch = generator::generate(1, 4096, 1234).unwrap();
        let reference = compute_channel_mad(&batch.channels[0]);
        let mut b = backend(1, 8);
        let out = b.process_mad(&batch.channels[0]).unwrap().value;
        assert!((out.mean - reference.mean).abs() / reference.mean < 1e-4);
        assert!((out.max - reference.max).abs() / reference.max < 1e-4);
    }

    #[test]
    fn wrong_shape_is_a_processing_error() {
        let batch = generator::generate(2, 64, 1).unwrap();
        let input = build_fft_input(&batch, 64).unwrap();
        let mut b = backend(3, 64);
        let err = b.process_fft(&input).unwrap_err();
        assert!(matches!(err, BenchError::BackendProcessing { .. }), "{err}");
    }

    #[test]
    fn closed_backend_refuses_work() {
        let batch = generator::generate(1, 64, 1).unwrap();
        let mut b = backend(1, 64);
        b.close();
        b.close();
        assert!(b.is_closed());
        assert!(b.process_mad(&batch.channels[0]).is_err());
    }

    #[test]
    fn degenerate_shape_is_unavailable() {
        let err = SoftwareBackend::init(&BackendConfig::new(BackendKind::Software, 1, 1));
        assert!(matches!(err, Err(BenchError::BackendUnavailable { .. })));
    }
}
