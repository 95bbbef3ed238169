//! Precision validation of accelerated backends against the CPU reference.
//!
//! FFT comparisons stream the reference one channel at a time through an
//! [`ErrorMetricsAccumulator`], so only the candidate result is ever held in
//! full. MAD comparisons are a handful of scalar ratios.

use crate::backend::{AcceleratedBackend, BackendConfig, BackendFactory, BackendKind};
use crate::error::{BenchError, Result};
use crate::fft::{FftCpuProcessor, FftNormalization, FftResult};
use crate::generator::{self, SensorChannel};
use crate::input::{build_fft_input, FftInput};
use crate::mad::{compute_channel_mad, MadResult};
use crate::metrics::{ErrorMetrics, ErrorMetricsAccumulator};
use crate::report::ResultSink;
use crate::timing::StatsSummary;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Relative tolerance for MAD mean, std-dev and max
pub const MAD_RELATIVE_TOLERANCE: f64 = 0.015;

/// Absolute tolerance for the MAD minimum (delegates may clamp it)
pub const MAD_MIN_ABSOLUTE_TOLERANCE: f64 = 200.0;

/// Lengths from here on are recorded without a pass/fail verdict
pub const EXPERIMENTAL_LENGTH_THRESHOLD: usize = 131_072;

const MAD_EPSILON: f64 = 1e-6;

/// Default FFT max-relative-error tolerance per backend
pub const fn fft_tolerance(kind: BackendKind) -> f64 {
    match kind {
        BackendKind::CpuReference => 1e-9,
        BackendKind::Software => 0.10,
        BackendKind::Gpu => 0.04,
        BackendKind::Npu => 0.03,
    }
}

/// Outcome of a precision comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Within tolerance
    Pass,
    /// Outside tolerance
    Fail,
    /// Recorded only (experimental length)
    Informational,
}

impl Verdict {
    fn judge(signal_length: usize, within: bool) -> Self {
        if signal_length >= EXPERIMENTAL_LENGTH_THRESHOLD {
            Self::Informational
        } else if within {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    /// Whether this verdict should fail a validation run
    pub fn is_failure(self) -> bool {
        self == Self::Fail
    }
}

/// One FFT precision comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecord {
    /// Signal length
    pub signal_length: usize,
    /// Channels compared
    pub num_channels: usize,
    /// Candidate backend
    pub backend: BackendKind,
    /// Repeat index within a sweep
    pub run_index: usize,
    /// Error of the candidate's weighted magnitudes
    pub metrics: ErrorMetrics,
    /// Tolerance applied to `max_relative_error`
    pub tolerance: f64,
    /// Outcome
    pub verdict: Verdict,
}

/// One MAD precision comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MadPrecision {
    /// Vector length
    pub signal_length: usize,
    /// Candidate backend
    pub backend: BackendKind,
    /// Reference result
    pub reference: MadResult,
    /// Candidate result
    pub candidate: MadResult,
    /// Relative difference of the means
    pub relative_mean: f64,
    /// Relative difference of the std-devs
    pub relative_std: f64,
    /// Relative difference of the maxima
    pub relative_max: f64,
    /// Absolute difference of the minima
    pub absolute_min: f64,
    /// Outcome
    pub verdict: Verdict,
}

/// Weighted-magnitude error of `candidate` against the streamed reference.
///
/// # Errors
///
/// Returns `ShapeMismatch` if the candidate's shape differs from the input.
pub fn compare_fft(
    reference: &mut FftCpuProcessor,
    input: &FftInput,
    candidate: &FftResult,
) -> Result<ErrorMetrics> {
    if candidate.weighted_magnitudes.len() != input.num_channels() {
        return Err(BenchError::shape_mismatch(
            "candidate channels",
            input.num_channels(),
            candidate.weighted_magnitudes.len(),
        ));
    }

    let mut acc = ErrorMetricsAccumulator::new();
    reference.process_streaming(&input.samples, &input.weights, |out| {
        acc.consume(out.weighted, &candidate.weighted_magnitudes[out.channel])
    })?;
    Ok(acc.build())
}

/// Run `backend` on `input` and compare it with the reference engine.
///
/// # Errors
///
/// Propagates backend failures and shape mismatches.
pub fn validate_fft(
    backend: &mut dyn AcceleratedBackend,
    reference: &mut FftCpuProcessor,
    input: &FftInput,
) -> Result<PrecisionRecord> {
    let kind = backend.backend_kind();
    let candidate = backend.process_fft(input)?;
    let metrics = compare_fft(reference, input, &candidate.value)?;
    let tolerance = fft_tolerance(kind);
    let verdict = Verdict::judge(input.signal_length(), metrics.within_relative(tolerance));

    info!(
        "FFT precision {kind} N={}: maxRel={:.3e} meanRel={:.3e} rmse={:.6} -> {verdict:?}",
        input.signal_length(),
        metrics.max_relative_error,
        metrics.mean_relative_error,
        metrics.rmse
    );

    Ok(PrecisionRecord {
        signal_length: input.signal_length(),
        num_channels: input.num_channels(),
        backend: kind,
        run_index: 0,
        metrics,
        tolerance,
        verdict,
    })
}

/// Compare two MAD results.
pub fn compare_mad(
    signal_length: usize,
    backend: BackendKind,
    reference: MadResult,
    candidate: MadResult,
) -> MadPrecision {
    let rel = |expected: f64, got: f64| (expected - got).abs() / expected.abs().max(MAD_EPSILON);
    let relative_mean = rel(reference.mean, candidate.mean);
    let relative_std = rel(reference.std_dev, candidate.std_dev);
    let relative_max = rel(reference.max, candidate.max);
    let absolute_min = (reference.min - candidate.min).abs();

    let within = relative_mean < MAD_RELATIVE_TOLERANCE
        && relative_std < MAD_RELATIVE_TOLERANCE
        && relative_max < MAD_RELATIVE_TOLERANCE
        && absolute_min <= MAD_MIN_ABSOLUTE_TOLERANCE;

    MadPrecision {
        signal_length,
        backend,
        reference,
        candidate,
        relative_mean,
        relative_std,
        relative_max,
        absolute_min,
        verdict: Verdict::judge(signal_length, within),
    }
}

/// Run `backend` on one channel and compare with the reference MAD.
///
/// # Errors
///
/// Propagates backend failures.
pub fn validate_mad(
    backend: &mut dyn AcceleratedBackend,
    channel: &SensorChannel,
) -> Result<MadPrecision> {
    let reference = compute_channel_mad(channel);
    let candidate = backend.process_mad(channel)?.value;
    let record = compare_mad(channel.len(), backend.backend_kind(), reference, candidate);
    info!(
        "MAD precision {} N={}: mean {:.3e} std {:.3e} max {:.3e} |min| {:.3} -> {:?}",
        record.backend,
        record.signal_length,
        record.relative_mean,
        record.relative_std,
        record.relative_max,
        record.absolute_min,
        record.verdict
    );
    Ok(record)
}

/// Summary of repeated FFT comparisons at one length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionStats {
    /// Signal length
    pub signal_length: usize,
    /// Number of runs
    pub repeats: usize,
    /// Distribution of per-run max relative error
    pub max_relative: StatsSummary,
    /// Average of per-run mean relative error
    pub avg_mean_relative: f64,
    /// Average of per-run RMSE
    pub avg_rmse: f64,
}

impl PrecisionStats {
    /// Summarize per-run metrics
    #[allow(clippy::cast_precision_loss)]
    pub fn from_metrics(signal_length: usize, runs: &[ErrorMetrics]) -> Self {
        let average = |f: fn(&ErrorMetrics) -> f64| {
            if runs.is_empty() {
                0.0
            } else {
                runs.iter().map(f).sum::<f64>() / runs.len() as f64
            }
        };
        let max_rel: Vec<f64> = runs.iter().map(|m| m.max_relative_error).collect();
        Self {
            signal_length,
            repeats: runs.len(),
            max_relative: StatsSummary::from_values(&max_rel),
            avg_mean_relative: average(|m| m.mean_relative_error),
            avg_rmse: average(|m| m.rmse),
        }
    }
}

/// Parameters of a precision sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Candidate backend
    pub backend: BackendKind,
    /// Signal lengths to test
    pub lengths: Vec<usize>,
    /// Runs per length, seeds `seed..seed + repeats`
    pub repeats: usize,
    /// Channels per run
    pub num_channels: usize,
    /// Base seed
    pub seed: u64,
    /// FFT normalization for both sides
    pub normalization: FftNormalization,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Software,
            lengths: vec![512, 1_024, 2_048, 4_096, 8_192, 16_384, 32_768, 65_536],
            repeats: 5,
            num_channels: 2,
            seed: 20_241_204,
            normalization: FftNormalization::None,
        }
    }
}

impl SweepConfig {
    /// Set the candidate backend
    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the lengths
    #[must_use]
    pub fn with_lengths(mut self, lengths: Vec<usize>) -> Self {
        self.lengths = lengths;
        self
    }

    /// Set the repeat count
    #[must_use]
    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    /// Set the channel count
    #[must_use]
    pub fn with_num_channels(mut self, num_channels: usize) -> Self {
        self.num_channels = num_channels;
        self
    }

    /// Set the base seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Repeated FFT validation across lengths. Every comparison is handed to
/// `sink`; one [`PrecisionStats`] is returned per length.
///
/// # Errors
///
/// Returns the first construction, processing or shape error.
pub fn run_precision_sweep(
    factory: &dyn BackendFactory,
    config: &SweepConfig,
    sink: &mut dyn ResultSink,
) -> Result<Vec<PrecisionStats>> {
    if config.repeats == 0 {
        return Err(BenchError::invalid_input("repeats must be > 0"));
    }

    let mut summaries = Vec::with_capacity(config.lengths.len());
    for &length in &config.lengths {
        let backend_config = BackendConfig::new(config.backend, config.num_channels, length)
            .with_normalization(config.normalization);
        let mut backend = factory.try_create(&backend_config)?;
        let mut reference =
            FftCpuProcessor::with_normalization(config.num_channels, length, config.normalization)?;

        let mut runs = Vec::with_capacity(config.repeats);
        let mut outcome = Ok(());
        for run_index in 0..config.repeats {
            let seed = config.seed.wrapping_add(run_index as u64);
            let step = generator::generate(config.num_channels, length, seed)
                .and_then(|batch| build_fft_input(&batch, length))
                .and_then(|input| validate_fft(backend.as_mut(), &mut reference, &input));
            match step {
                Ok(mut record) => {
                    record.run_index = run_index;
                    if record.verdict.is_failure() {
                        warn!(
                            "{} exceeded tolerance at N={length}: {:.3e} > {:.3e}",
                            record.backend, record.metrics.max_relative_error, record.tolerance
                        );
                    }
                    sink.record_precision(&record);
                    runs.push(record.metrics);
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        backend.close();
        outcome?;

        let stats = PrecisionStats::from_metrics(length, &runs);
        info!(
            "FFT stats len={length} ({}x) | maxRel avg={:.3}% std={:.3}% | rmse avg={:.6}",
            stats.repeats,
            stats.max_relative.mean * 100.0,
            stats.max_relative.std_dev * 100.0,
            stats.avg_rmse
        );
        summaries.push(stats);
    }
    Ok(summaries)
}
