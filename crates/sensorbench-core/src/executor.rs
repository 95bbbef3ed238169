//! Benchmark scenario executor
//!
//! Runs one scenario at one data scale for a fixed number of iterations, or a
//! whole suite of them, and aggregates per-iteration timing.
//!
//! ```text
//! Idle ──► Running(i of N) ──┬──► Completed
//!                            ├──► Failed      (reference path error)
//!                            └──► Cancelled   (token observed between iterations)
//! ```
//!
//! Accelerated scenarios build their backend through the configured
//! [`BackendFactory`]. If construction or any call fails, the samples taken so
//! far are discarded, the backend is closed, and every iteration is re-run on
//! the CPU reference path. The summary then carries a fallback note, and its
//! timings describe the CPU path only.

use crate::backend::{AcceleratedBackend, BackendConfig, BackendFactory, DefaultBackendFactory};
use crate::cache::{FftEngineCache, InputCache};
use crate::error::{BenchError, Result};
use crate::fft::{FftNormalization, FftResult};
use crate::generator::{SampleBatch, DEFAULT_SEED};
use crate::input::FftInput;
use crate::mad::{compute_mad, readings_from_channel, MadReading, MadResult};
use crate::report::{ResultSink, ScenarioRecord};
use crate::scenario::{Algorithm, BenchmarkScenario, DataScale};
use crate::telemetry::{NoTelemetry, TelemetryCollector, TelemetryDelta};
use crate::timing::{
    duration_ms, throughput_ops_per_sec, InferenceTiming, StatsSummary, TimingStats,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// FFT channels per packet
pub const FFT_NUM_CHANNELS: usize = 10;

/// Packets per iteration in batched mode
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Iterations per scenario
pub const DEFAULT_ITERATIONS: usize = 10;

/// Cooperative cancellation flag, clonable across threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Not started
    Idle,
    /// Executing iteration `iteration` (1-based) of `of`
    Running {
        /// Current iteration
        iteration: usize,
        /// Iteration budget
        of: usize,
    },
    /// All iterations ran
    Completed,
    /// The reference path failed
    Failed,
    /// Stopped by the cancellation token
    Cancelled,
}

/// Parameters of a single scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Iterations to time
    pub iterations: usize,
    /// Packets per iteration in batched mode
    pub batch_size: usize,
    /// Generator seed
    pub seed: u64,
    /// Channels per generated batch (and per FFT packet)
    pub num_channels: usize,
    /// FFT normalization
    pub normalization: FftNormalization,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            batch_size: DEFAULT_BATCH_SIZE,
            seed: DEFAULT_SEED,
            num_channels: FFT_NUM_CHANNELS,
            normalization: FftNormalization::None,
        }
    }
}

impl RunConfig {
    /// Set iteration count
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set batch size
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set channel count
    #[must_use]
    pub fn with_num_channels(mut self, num_channels: usize) -> Self {
        self.num_channels = num_channels;
        self
    }

    /// Set FFT normalization
    #[must_use]
    pub fn with_normalization(mut self, normalization: FftNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.num_channels == 0 {
            return Err(BenchError::invalid_input("num_channels must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(BenchError::invalid_input("batch_size must be > 0"));
        }
        Ok(())
    }
}

/// Suite configuration: scenarios × scales, run in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Scenarios, in run order
    pub scenarios: Vec<BenchmarkScenario>,
    /// Scales, each applied to every scenario
    pub scales: Vec<DataScale>,
    /// Iterations per scenario
    pub iterations: usize,
    /// Packets per iteration in batched mode
    pub batch_size: usize,
    /// Generator seed
    pub seed: u64,
    /// Channels per generated batch
    pub num_channels: usize,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            scenarios: BenchmarkScenario::suite_order(),
            scales: DataScale::default_scales().to_vec(),
            iterations: run.iterations,
            batch_size: run.batch_size,
            seed: run.seed,
            num_channels: run.num_channels,
        }
    }
}

impl SuiteConfig {
    /// Set scenarios
    #[must_use]
    pub fn with_scenarios(mut self, scenarios: Vec<BenchmarkScenario>) -> Self {
        self.scenarios = scenarios;
        self
    }

    /// Set scales
    #[must_use]
    pub fn with_scales(mut self, scales: Vec<DataScale>) -> Self {
        self.scales = scales;
        self
    }

    /// Set iterations
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Per-scenario run config
    pub fn run_config(&self) -> RunConfig {
        RunConfig::default()
            .with_iterations(self.iterations)
            .with_batch_size(self.batch_size)
            .with_seed(self.seed)
            .with_num_channels(self.num_channels)
    }

    /// Number of scenario runs in the suite
    pub fn total_runs(&self) -> usize {
        self.scenarios.len() * self.scales.len()
    }
}

/// Result of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRunSummary {
    /// Scenario that ran
    pub scenario: BenchmarkScenario,
    /// Display label
    pub label: String,
    /// Data scale
    pub scale: DataScale,
    /// Terminal state (`Completed` or `Cancelled`)
    pub state: RunState,
    /// Iteration budget
    pub iterations_requested: usize,
    /// Iterations that produced a timing sample
    pub iterations_completed: usize,
    /// Packets per iteration
    pub packets: usize,
    /// Elements fed per iteration
    pub input_size: usize,
    /// Aggregated timing
    pub timings: TimingStats,
    /// Per-iteration samples
    pub samples: Vec<InferenceTiming>,
    /// Operations per second from the mean total time
    pub throughput: f64,
    /// Last result, formatted
    pub highlights: String,
    /// Why the accelerated path was abandoned, if it was
    pub fallback: Option<String>,
    /// Battery and thermal change over the run
    pub telemetry: Option<TelemetryDelta>,
    /// Wall time of the whole run (ms)
    pub elapsed_ms: f64,
}

impl ScenarioRunSummary {
    /// Whether the accelerated path fell back to the reference engines
    pub fn fell_back(&self) -> bool {
        self.fallback.is_some()
    }

    /// Highlights plus fallback annotation
    pub fn notes(&self) -> String {
        match &self.fallback {
            Some(reason) => format!("{} | Fallback CPU ({reason})", self.highlights),
            None => self.highlights.clone(),
        }
    }

    /// Multi-line human summary
    pub fn summary_text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "{} ({}, {} pts)", self.label, self.state_label(), self.scale.length());
        let _ = writeln!(
            text,
            "Total: {} | Transfer: {} | Compute: {}",
            format_stats(&self.timings.total),
            format_stats(&self.timings.transfer),
            format_stats(&self.timings.compute)
        );
        let _ = writeln!(text, "Throughput: {:.0} ops/s", self.throughput);
        let _ = write!(text, "Last result: {}", self.notes());
        if let Some(temps) = self
            .telemetry
            .as_ref()
            .and_then(|t| t.temperature_summary.as_deref())
        {
            let _ = write!(text, "\n{temps}");
        }
        text
    }

    fn state_label(&self) -> String {
        match self.state {
            RunState::Cancelled => format!(
                "cancelled after {}/{}",
                self.iterations_completed, self.iterations_requested
            ),
            _ => format!("{} iterations × {} packets", self.iterations_completed, self.packets),
        }
    }
}

/// `mean±std (min=… | max=…)` with three decimals
pub fn format_stats(s: &StatsSummary) -> String {
    format!(
        "{:.3}±{:.3} (min={:.3} | max={:.3})",
        s.mean, s.std_dev, s.min, s.max
    )
}

/// Progress notification for suite runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteProgress {
    /// 1-based index of the run about to start
    pub current: usize,
    /// Total runs in the suite
    pub total: usize,
    /// Scenario label
    pub label: String,
    /// Scale of the run
    pub scale: DataScale,
}

/// One entry of a suite report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SuiteEntry {
    /// The scenario produced a summary (possibly cancelled part-way)
    Ran(ScenarioRunSummary),
    /// The reference path failed
    Failed {
        /// Scenario id
        scenario_id: String,
        /// Scale
        scale: DataScale,
        /// Error text
        reason: String,
    },
}

/// Result of a suite run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Entries in run order
    pub entries: Vec<SuiteEntry>,
    /// Runs planned
    pub total: usize,
    /// Whether the suite stopped early on cancellation
    pub cancelled: bool,
}

impl SuiteReport {
    /// Summaries of the runs that produced one
    pub fn summaries(&self) -> impl Iterator<Item = &ScenarioRunSummary> {
        self.entries.iter().filter_map(|e| match e {
            SuiteEntry::Ran(summary) => Some(summary),
            SuiteEntry::Failed { .. } => None,
        })
    }

    /// Number of failed runs
    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, SuiteEntry::Failed { .. }))
            .count()
    }
}

/// Prepared packets for one scenario run.
enum Workload {
    Mad {
        batch: Arc<SampleBatch>,
        channels: Vec<usize>,
        readings: Vec<Vec<MadReading>>,
    },
    Fft {
        input: Arc<FftInput>,
        packets: usize,
    },
}

impl Workload {
    fn packets(&self) -> usize {
        match self {
            Self::Mad { channels, .. } => channels.len(),
            Self::Fft { packets, .. } => *packets,
        }
    }

    fn input_size(&self, length: usize) -> usize {
        match self {
            Self::Mad { channels, .. } => length * channels.len(),
            Self::Fft { input, packets } => length * input.num_channels() * packets,
        }
    }
}

enum LoopEnd {
    Completed,
    Cancelled,
}

/// Sequential scenario executor with owned caches.
#[derive(Debug)]
pub struct ScenarioExecutor {
    factory: Box<dyn BackendFactory>,
    telemetry: Box<dyn TelemetryCollector>,
    inputs: InputCache,
    engines: FftEngineCache,
    state: RunState,
}

impl Default for ScenarioExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioExecutor {
    /// Executor with the default backend factory and no telemetry
    pub fn new() -> Self {
        Self {
            factory: Box::new(DefaultBackendFactory),
            telemetry: Box::new(NoTelemetry),
            inputs: InputCache::new(),
            engines: FftEngineCache::new(),
            state: RunState::Idle,
        }
    }

    /// Replace the backend factory
    #[must_use]
    pub fn with_factory(mut self, factory: Box<dyn BackendFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Replace the telemetry collector
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Box<dyn TelemetryCollector>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// State of the last (or current) run
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run one scenario at one scale.
    ///
    /// Backend failures never surface here; they become a fallback note.
    /// Cancellation yields `Ok` with [`RunState::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns input-preparation or reference-path errors (`InvalidInput`,
    /// `InsufficientSamples`, `ShapeMismatch`).
    pub fn run_scenario(
        &mut self,
        scenario: BenchmarkScenario,
        scale: DataScale,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<ScenarioRunSummary> {
        let result = self.execute(scenario, scale, config, cancel);
        if result.is_err() {
            self.state = RunState::Failed;
        }
        result
    }

    fn execute(
        &mut self,
        scenario: BenchmarkScenario,
        scale: DataScale,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<ScenarioRunSummary> {
        config.validate()?;
        let length = scale.length();
        let label = scenario.label(config.batch_size);
        if scale.is_memory_heavy() {
            warn!("{label}: {length} samples per channel is memory-heavy");
        }

        self.inputs.retain_length(length);
        self.engines.retain_length(length);

        let start_snapshot = self.telemetry.capture_snapshot();
        let started = Instant::now();
        let workload = self.prepare(scenario, length, config)?;

        let mut samples = Vec::with_capacity(config.iterations);
        let mut highlights = String::from("-");
        let mut fallback = None;

        let end = if scenario.backend.is_accelerated() {
            let backend_config = BackendConfig::new(scenario.backend, config.num_channels, length)
                .with_normalization(config.normalization);
            match self.run_accelerated(
                &backend_config,
                &workload,
                config,
                cancel,
                &mut samples,
                &mut highlights,
            ) {
                Ok(end) => end,
                Err(e) if e.is_backend_failure() => {
                    warn!("{label}: falling back to CPU reference: {e}");
                    fallback = Some(e.to_string());
                    samples.clear();
                    self.run_reference(&workload, config, cancel, &mut samples, &mut highlights)?
                }
                Err(e) => return Err(e),
            }
        } else {
            self.run_reference(&workload, config, cancel, &mut samples, &mut highlights)?
        };

        self.state = match end {
            LoopEnd::Completed => RunState::Completed,
            LoopEnd::Cancelled => RunState::Cancelled,
        };

        let elapsed = started.elapsed();
        let end_snapshot = self.telemetry.capture_snapshot();
        let timings = TimingStats::from_samples(&samples);
        let input_size = workload.input_size(length);
        let throughput = throughput_ops_per_sec(input_size, timings.total.mean);

        let summary = ScenarioRunSummary {
            scenario,
            label,
            scale,
            state: self.state,
            iterations_requested: config.iterations,
            iterations_completed: samples.len(),
            packets: workload.packets(),
            input_size,
            timings,
            samples,
            throughput,
            highlights,
            fallback,
            telemetry: TelemetryDelta::between(
                start_snapshot.as_ref(),
                end_snapshot.as_ref(),
                elapsed,
            ),
            elapsed_ms: duration_ms(elapsed),
        };
        info!("{}", summary.summary_text());
        Ok(summary)
    }

    /// Run every scenario at every scale in order.
    ///
    /// Reference-path failures are recorded as [`SuiteEntry::Failed`] and the
    /// suite moves on. Cancellation is checked before each run.
    pub fn run_suite<F>(
        &mut self,
        suite: &SuiteConfig,
        cancel: &CancellationToken,
        sink: &mut dyn ResultSink,
        mut on_progress: F,
    ) -> SuiteReport
    where
        F: FnMut(&SuiteProgress),
    {
        let config = suite.run_config();
        let mut report = SuiteReport {
            entries: Vec::with_capacity(suite.total_runs()),
            total: suite.total_runs(),
            cancelled: false,
        };

        let runs = suite
            .scales
            .iter()
            .flat_map(|&scale| suite.scenarios.iter().map(move |&scenario| (scenario, scale)));

        for (index, (scenario, scale)) in runs.enumerate() {
            if cancel.is_cancelled() {
                info!("Suite cancelled after {index}/{} runs", report.total);
                report.cancelled = true;
                break;
            }
            on_progress(&SuiteProgress {
                current: index + 1,
                total: report.total,
                label: scenario.label(config.batch_size),
                scale,
            });

            match self.run_scenario(scenario, scale, &config, cancel) {
                Ok(summary) => {
                    sink.record_scenario(&ScenarioRecord::from_summary(&summary));
                    let cancelled = summary.state == RunState::Cancelled;
                    report.entries.push(SuiteEntry::Ran(summary));
                    if cancelled {
                        report.cancelled = true;
                        break;
                    }
                }
                Err(e) => {
                    warn!("{} at {scale} failed: {e}", scenario.id());
                    report.entries.push(SuiteEntry::Failed {
                        scenario_id: scenario.id(),
                        scale,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }

    fn prepare(
        &mut self,
        scenario: BenchmarkScenario,
        length: usize,
        config: &RunConfig,
    ) -> Result<Workload> {
        let packets = scenario.batch_mode.packet_count(config.batch_size);
        match scenario.algorithm {
            Algorithm::Mad => {
                let batch = self.inputs.batch(length, config.num_channels, config.seed)?;
                let channels: Vec<usize> = (0..packets).map(|i| i % batch.num_channels()).collect();
                let readings = channels
                    .iter()
                    .map(|&c| readings_from_channel(&batch.channels[c]))
                    .collect();
                Ok(Workload::Mad {
                    batch,
                    channels,
                    readings,
                })
            }
            Algorithm::Fft => {
                let input = self.inputs.fft_input(length, config.num_channels, config.seed)?;
                // Plan before timing starts
                self.engines
                    .get_or_create(length, config.num_channels, config.normalization)?;
                Ok(Workload::Fft { input, packets })
            }
        }
    }

    fn run_reference(
        &mut self,
        workload: &Workload,
        config: &RunConfig,
        cancel: &CancellationToken,
        samples: &mut Vec<InferenceTiming>,
        highlights: &mut String,
    ) -> Result<LoopEnd> {
        for iteration in 0..config.iterations {
            if cancel.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }
            self.state = RunState::Running {
                iteration: iteration + 1,
                of: config.iterations,
            };

            let timing = match workload {
                Workload::Mad { readings, .. } => {
                    let start = Instant::now();
                    let mut last = MadResult::ZERO;
                    for packet in readings {
                        last = compute_mad(packet);
                    }
                    let timing = InferenceTiming::compute_only(start.elapsed());
                    *highlights = format_mad_result(&last);
                    timing
                }
                Workload::Fft { input, packets } => {
                    let engine = self.engines.get_or_create(
                        input.signal_length(),
                        input.num_channels(),
                        config.normalization,
                    )?;
                    let mut compute_ms = 0.0;
                    for _ in 0..*packets {
                        let mut highlight = FftHighlight::default();
                        let start = Instant::now();
                        engine.process_streaming(&input.samples, &input.weights, |out| {
                            highlight.observe(out.channel, out.weighted);
                            Ok(())
                        })?;
                        let packet_ms = duration_ms(start.elapsed());
                        compute_ms += packet_ms;
                        *highlights = highlight.format("FFT CPU", packet_ms);
                    }
                    InferenceTiming {
                        transfer_ms: 0.0,
                        compute_ms,
                    }
                }
            };
            debug!("iteration {}: {:.3} ms", iteration + 1, timing.total_ms());
            samples.push(timing);
        }
        Ok(LoopEnd::Completed)
    }

    fn run_accelerated(
        &mut self,
        backend_config: &BackendConfig,
        workload: &Workload,
        config: &RunConfig,
        cancel: &CancellationToken,
        samples: &mut Vec<InferenceTiming>,
        highlights: &mut String,
    ) -> Result<LoopEnd> {
        let mut backend = self.factory.try_create(backend_config)?;
        let result = self.accelerated_loop(
            backend.as_mut(),
            workload,
            config,
            cancel,
            samples,
            highlights,
        );
        backend.close();
        result
    }

    fn accelerated_loop(
        &mut self,
        backend: &mut dyn AcceleratedBackend,
        workload: &Workload,
        config: &RunConfig,
        cancel: &CancellationToken,
        samples: &mut Vec<InferenceTiming>,
        highlights: &mut String,
    ) -> Result<LoopEnd> {
        let label = format!("FFT {}", backend.backend_kind());
        for iteration in 0..config.iterations {
            if cancel.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }
            self.state = RunState::Running {
                iteration: iteration + 1,
                of: config.iterations,
            };

            let mut total = InferenceTiming::default();
            match workload {
                Workload::Mad {
                    batch, channels, ..
                } => {
                    for &c in channels {
                        let out = backend.process_mad(&batch.channels[c])?;
                        total.transfer_ms += out.timing.transfer_ms;
                        total.compute_ms += out.timing.compute_ms;
                        *highlights = format_mad_result(&out.value);
                    }
                }
                Workload::Fft { input, packets } => {
                    for _ in 0..*packets {
                        let out = backend.process_fft(input)?;
                        total.transfer_ms += out.timing.transfer_ms;
                        total.compute_ms += out.timing.compute_ms;
                        *highlights = FftHighlight::from_result(&out.value)
                            .format(&label, out.timing.total_ms());
                    }
                }
            }
            debug!("iteration {}: {:.3} ms", iteration + 1, total.total_ms());
            samples.push(total);
        }
        Ok(LoopEnd::Completed)
    }
}

/// `Mean=… | Std=… | Min=… | Max=…`
pub fn format_mad_result(r: &MadResult) -> String {
    format!(
        "Mean={:.3} | Std={:.3} | Min={:.3} | Max={:.3}",
        r.mean, r.std_dev, r.min, r.max
    )
}

const HIGHLIGHT_CHANNELS: usize = 4;
const HIGHLIGHT_BINS: usize = 3;

/// Weighted-magnitude sums of the first channels and the first bins of
/// channel 0, collected while streaming.
#[derive(Debug, Default)]
struct FftHighlight {
    sums: Vec<f64>,
    first_bins: Vec<f32>,
}

impl FftHighlight {
    fn observe(&mut self, channel: usize, weighted: &[f32]) {
        if channel < HIGHLIGHT_CHANNELS {
            self.sums.push(weighted.iter().map(|&v| f64::from(v)).sum());
        }
        if channel == 0 {
            self.first_bins = weighted.iter().take(HIGHLIGHT_BINS).copied().collect();
        }
    }

    fn from_result(result: &FftResult) -> Self {
        let mut highlight = Self::default();
        for (channel, weighted) in result.weighted_magnitudes.iter().enumerate() {
            highlight.observe(channel, weighted);
        }
        highlight
    }

    fn format(&self, label: &str, duration_ms: f64) -> String {
        let sums: Vec<String> = self
            .sums
            .iter()
            .enumerate()
            .map(|(i, s)| format!("S{i}={s:.2}"))
            .collect();
        let bins: Vec<String> = self.first_bins.iter().map(|b| format!("{b:.2}")).collect();
        format!(
            "{label} -> {duration_ms:.3} ms | Σ weights (first {HIGHLIGHT_CHANNELS}): {} | S0 bins[0..2]: {}",
            sums.join(" | "),
            if bins.is_empty() { "-".to_string() } else { bins.join(", ") }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::report::MemorySink;
    use crate::scenario::BatchMode;

    fn small() -> RunConfig {
        RunConfig::default()
            .with_iterations(3)
            .with_batch_size(4)
            .with_num_channels(3)
    }

    #[test]
    fn cpu_mad_completes_all_iterations() {
        let mut exec = ScenarioExecutor::new();
        let scenario =
            BenchmarkScenario::new(Algorithm::Mad, BackendKind::CpuReference, BatchMode::Batched);
        let s = exec
            .run_scenario(scenario, DataScale::Micro512, &small(), &CancellationToken::new())
            .unwrap();

        assert_eq!(s.state, RunState::Completed);
        assert_eq!(exec.state(), RunState::Completed);
        assert_eq!(s.iterations_completed, 3);
        assert_eq!(s.packets, 4);
        assert_eq!(s.input_size, 512 * 4);
        assert!(s.highlights.starts_with("Mean="), "{}", s.highlights);
        assert!(s.timings.transfer.max == 0.0);
        assert!(!s.fell_back());
    }

    #[test]
    fn software_fft_reports_transfer_and_compute() {
        let mut exec = ScenarioExecutor::new();
        let scenario =
            BenchmarkScenario::new(Algorithm::Fft, BackendKind::Software, BatchMode::Single);
        let s = exec
            .run_scenario(scenario, DataScale::Micro1K, &small(), &CancellationToken::new())
            .unwrap();
        assert!(!s.fell_back(), "{}", s.notes());
        assert_eq!(s.samples.len(), 3);
        assert_eq!(s.input_size, 1024 * 3);
        assert!(s.highlights.contains("S0 bins[0..2]"), "{}", s.highlights);
        assert!(s.throughput >= 0.0);
    }

    #[test]
    fn unavailable_backend_falls_back_with_note() {
        let mut exec = ScenarioExecutor::new();
        let scenario = BenchmarkScenario::new(Algorithm::Fft, BackendKind::Gpu, BatchMode::Batched);
        let s = exec
            .run_scenario(scenario, DataScale::Micro512, &small(), &CancellationToken::new())
            .unwrap();
        assert!(s.fell_back());
        assert_eq!(s.iterations_completed, 3);
        assert!(s.notes().contains("Fallback CPU"), "{}", s.notes());
        assert!(s.highlights.starts_with("FFT CPU"), "{}", s.highlights);
    }

    #[test]
    fn pre_cancelled_run_has_no_samples() {
        let mut exec = ScenarioExecutor::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scenario =
            BenchmarkScenario::new(Algorithm::Mad, BackendKind::CpuReference, BatchMode::Single);
        let s = exec
            .run_scenario(scenario, DataScale::Micro512, &small(), &cancel)
            .unwrap();
        assert_eq!(s.state, RunState::Cancelled);
        assert_eq!(s.iterations_completed, 0);
        assert_eq!(s.timings, TimingStats::default());
    }

    #[test]
    fn invalid_config_fails_the_run() {
        let mut exec = ScenarioExecutor::new();
        let scenario =
            BenchmarkScenario::new(Algorithm::Mad, BackendKind::CpuReference, BatchMode::Single);
        let err = exec.run_scenario(
            scenario,
            DataScale::Micro512,
            &small().with_num_channels(0),
            &CancellationToken::new(),
        );
        assert!(matches!(err, Err(BenchError::InvalidInput { .. })));
        assert_eq!(exec.state(), RunState::Failed);
    }

    #[test]
    fn suite_reports_progress_in_order() {
        let suite = SuiteConfig::default()
            .with_scenarios(vec![
                BenchmarkScenario::new(Algorithm::Mad, BackendKind::CpuReference, BatchMode::Single),
                BenchmarkScenario::new(Algorithm::Fft, BackendKind::Npu, BatchMode::Single),
            ])
            .with_scales(vec![DataScale::Micro512, DataScale::Micro1K])
            .with_iterations(2);

        let mut exec = ScenarioExecutor::new();
        let mut sink = MemorySink::default();
        let mut seen = Vec::new();
        let report = exec.run_suite(&suite, &CancellationToken::new(), &mut sink, |p| {
            seen.push((p.current, p.total, p.label.clone(), p.scale));
        });

        assert_eq!(report.total, 4);
        assert_eq!(report.entries.len(), 4);
        assert!(!report.cancelled);
        assert_eq!(report.failures(), 0);
        assert_eq!(seen[0], (1, 4, "MAD CPU".to_string(), DataScale::Micro512));
        assert_eq!(seen[3], (4, 4, "FFT NPU".to_string(), DataScale::Micro1K));
        assert_eq!(sink.scenarios.len(), 4);
        assert!(sink.scenarios[1].notes.contains("Fallback CPU"));
    }

    #[test]
    fn cancelled_suite_stops_between_scenarios() {
        let cancel = CancellationToken::new();
        let mut exec = ScenarioExecutor::new();
        let mut sink = MemorySink::default();
        let suite = SuiteConfig::default()
            .with_scales(vec![DataScale::Micro512])
            .with_iterations(1);

        let report = exec.run_suite(&suite, &cancel, &mut sink, |p| {
            if p.current == 2 {
                cancel.cancel();
            }
        });
        assert!(report.cancelled);
        assert_eq!(report.entries.len(), 2);
        match &report.entries[1] {
            SuiteEntry::Ran(s) => assert_eq!(s.state, RunState::Cancelled),
            other => panic!("expected a cancelled run, got {other:?}"),
        }
    }

    #[test]
    fn highlight_format() {
        let mut h = FftHighlight::default();
        h.observe(0, &[1.0, 2.0, 3.0, 4.0]);
        h.observe(1, &[0.5]);
        assert_eq!(
            h.format("FFT CPU", 1.5),
            "FFT CPU -> 1.500 ms | Σ weights (first 4): S0=10.00 | S1=0.50 | S0 bins[0..2]: 1.00, 2.00, 3.00"
        );
    }
}
