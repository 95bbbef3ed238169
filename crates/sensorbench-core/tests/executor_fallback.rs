//! Executor fallback and lifecycle tests
//!
//! Custom factories inject construction and mid-run failures; every scenario
//! must still finish all iterations on the CPU reference path and annotate
//! the fallback.

use sensorbench_core::{
    AcceleratedBackend, Algorithm, BackendConfig, BackendFactory, BackendKind, BatchMode,
    BenchError, BenchmarkScenario, CancellationToken, DataScale, FftInput, FftResult,
    MadResult, MemorySink, Result, RunConfig, RunState, ScenarioExecutor, SensorChannel,
    SoftwareBackend, SuiteConfig, Timed,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Factory whose backends can never be constructed.
#[derive(Debug)]
struct UnavailableFactory;

impl BackendFactory for UnavailableFactory {
    fn try_create(&self, config: &BackendConfig) -> Result<Box<dyn AcceleratedBackend>> {
        Err(BenchError::backend_unavailable(config.kind, "delegate rejected"))
    }
}

/// Backend that delegates to the software backend for `healthy_calls` calls,
/// then returns `failure` on every call.
#[derive(Debug)]
struct FlakyBackend {
    inner: SoftwareBackend,
    kind: BackendKind,
    healthy_calls: usize,
    calls: usize,
    failure: fn(BackendKind) -> BenchError,
    closed: Arc<AtomicUsize>,
}

impl FlakyBackend {
    fn tick(&mut self) -> Result<()> {
        self.calls += 1;
        if self.calls > self.healthy_calls {
            return Err((self.failure)(self.kind));
        }
        Ok(())
    }
}

impl AcceleratedBackend for FlakyBackend {
    fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    fn process_fft(&mut self, input: &FftInput) -> Result<Timed<FftResult>> {
        self.tick()?;
        self.inner.process_fft(input)
    }

    fn process_mad(&mut self, channel: &SensorChannel) -> Result<Timed<MadResult>> {
        self.tick()?;
        self.inner.process_mad(channel)
    }

    fn close(&mut self) {
        self.inner.close();
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct FlakyFactory {
    healthy_calls: usize,
    failure: fn(BackendKind) -> BenchError,
    closed: Arc<AtomicUsize>,
}

impl FlakyFactory {
    fn new(healthy_calls: usize, failure: fn(BackendKind) -> BenchError) -> Self {
        Self {
            healthy_calls,
            failure,
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl BackendFactory for FlakyFactory {
    fn try_create(&self, config: &BackendConfig) -> Result<Box<dyn AcceleratedBackend>> {
        let software = BackendConfig {
            kind: BackendKind::Software,
            ..config.clone()
        };
        Ok(Box::new(FlakyBackend {
            inner: SoftwareBackend::init(&software)?,
            kind: config.kind,
            healthy_calls: self.healthy_calls,
            calls: 0,
            failure: self.failure,
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// Healthy backend that trips the run's cancellation token on its
/// `cancel_on`-th call and still returns that call's result.
#[derive(Debug)]
struct CancellingBackend {
    inner: SoftwareBackend,
    cancel: CancellationToken,
    cancel_on: usize,
    calls: usize,
}

impl CancellingBackend {
    fn tick(&mut self) {
        self.calls += 1;
        if self.calls == self.cancel_on {
            self.cancel.cancel();
        }
    }
}

impl AcceleratedBackend for CancellingBackend {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Npu
    }

    fn process_fft(&mut self, input: &FftInput) -> Result<Timed<FftResult>> {
        self.tick();
        self.inner.process_fft(input)
    }

    fn process_mad(&mut self, channel: &SensorChannel) -> Result<Timed<MadResult>> {
        self.tick();
        self.inner.process_mad(channel)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[derive(Debug)]
struct CancellingFactory {
    cancel: CancellationToken,
    cancel_on: usize,
}

impl BackendFactory for CancellingFactory {
    fn try_create(&self, config: &BackendConfig) -> Result<Box<dyn AcceleratedBackend>> {
        let software = BackendConfig {
            kind: BackendKind::Software,
            ..config.clone()
        };
        Ok(Box::new(CancellingBackend {
            inner: SoftwareBackend::init(&software)?,
            cancel: self.cancel.clone(),
            cancel_on: self.cancel_on,
            calls: 0,
        }))
    }
}

fn processing_failure(kind: BackendKind) -> BenchError {
    BenchError::backend_processing(kind, "device lost")
}

fn config() -> RunConfig {
    RunConfig::default()
        .with_iterations(4)
        .with_batch_size(3)
        .with_num_channels(2)
}

#[test]
fn construction_failure_runs_every_iteration_on_cpu() {
    let mut exec = ScenarioExecutor::new().with_factory(Box::new(UnavailableFactory));
    for algorithm in [Algorithm::Fft, Algorithm::Mad] {
        let scenario = BenchmarkScenario::new(algorithm, BackendKind::Npu, BatchMode::Batched);
        let s = exec
            .run_scenario(scenario, DataScale::Micro1K, &config(), &CancellationToken::new())
            .unwrap();

        assert_eq!(s.state, RunState::Completed);
        assert_eq!(s.iterations_completed, 4);
        assert_eq!(s.packets, 3);
        assert!(s.fell_back());
        assert!(s.notes().contains("Fallback CPU"), "{}", s.notes());
        assert!(s.notes().contains("delegate rejected"), "{}", s.notes());
        assert_eq!(s.timings.transfer.max, 0.0);
    }
}

#[test]
fn mid_run_failure_discards_partial_samples_and_closes_backend() {
    // Three packets per iteration: fails on the second packet of iteration 2
    let factory = FlakyFactory::new(4, processing_failure);
    let closed = Arc::clone(&factory.closed);
    let mut exec = ScenarioExecutor::new().with_factory(Box::new(factory));

    let scenario = BenchmarkScenario::new(Algorithm::Fft, BackendKind::Gpu, BatchMode::Batched);
    let s = exec
        .run_scenario(scenario, DataScale::Micro512, &config(), &CancellationToken::new())
        .unwrap();

    assert!(s.fell_back());
    assert_eq!(s.iterations_completed, 4);
    assert_eq!(s.samples.len(), 4);
    assert!(s.samples.iter().all(|t| t.transfer_ms == 0.0));
    assert!(s.highlights.starts_with("FFT CPU"), "{}", s.highlights);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn healthy_backend_is_closed_once() {
    let factory = FlakyFactory::new(usize::MAX, processing_failure);
    let closed = Arc::clone(&factory.closed);
    let mut exec = ScenarioExecutor::new().with_factory(Box::new(factory));

    let scenario = BenchmarkScenario::new(Algorithm::Mad, BackendKind::Npu, BatchMode::Single);
    let s = exec
        .run_scenario(scenario, DataScale::Micro512, &config(), &CancellationToken::new())
        .unwrap();

    assert!(!s.fell_back());
    assert_eq!(s.notes(), s.highlights);
    assert_eq!(s.iterations_completed, 4);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn non_backend_errors_are_not_masked() {
    let factory = FlakyFactory::new(0, |_| BenchError::invalid_input("corrupt packet"));
    let closed = Arc::clone(&factory.closed);
    let mut exec = ScenarioExecutor::new().with_factory(Box::new(factory));

    let scenario = BenchmarkScenario::new(Algorithm::Fft, BackendKind::Npu, BatchMode::Single);
    let result = exec.run_scenario(scenario, DataScale::Micro512, &config(), &CancellationToken::new());

    assert!(matches!(result, Err(BenchError::InvalidInput { .. })));
    assert_eq!(exec.state(), RunState::Failed);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn suite_continues_after_fallbacks() {
    let suite = SuiteConfig::default()
        .with_scales(vec![DataScale::Micro512])
        .with_iterations(1);
    let mut exec = ScenarioExecutor::new().with_factory(Box::new(UnavailableFactory));
    let mut sink = MemorySink::default();
    let mut progress = Vec::new();

    let report = exec.run_suite(&suite, &CancellationToken::new(), &mut sink, |p| {
        progress.push(p.current);
    });

    assert_eq!(report.total, 16);
    assert_eq!(report.entries.len(), 16);
    assert_eq!(report.failures(), 0);
    assert_eq!(progress, (1..=16).collect::<Vec<_>>());

    let fallbacks = sink.scenarios.iter().filter(|r| r.cpu_fallback).count();
    let accelerated = sink
        .scenarios
        .iter()
        .filter(|r| r.processing_mode == "Accelerated")
        .count();
    assert_eq!(fallbacks, accelerated);
    assert_eq!(accelerated, 12);
}

#[test]
fn record_serializes_with_kebab_case_backend() {
    let mut exec = ScenarioExecutor::new();
    let scenario =
        BenchmarkScenario::new(Algorithm::Mad, BackendKind::CpuReference, BatchMode::Single);
    let summary = exec
        .run_scenario(scenario, DataScale::Micro512, &config(), &CancellationToken::new())
        .unwrap();
    let record = sensorbench_core::ScenarioRecord::from_summary(&summary);

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["backend"], "cpu-reference");
    assert_eq!(json["scenario_id"], "mad_cpu_single");
    assert_eq!(json["iterations_completed"], 4);
    assert_eq!(json["cpu_fallback"], false);
}

#[test]
fn cancellation_mid_run_keeps_completed_iterations() {
    for algorithm in [Algorithm::Fft, Algorithm::Mad] {
        let cancel = CancellationToken::new();
        let factory = CancellingFactory {
            cancel: cancel.clone(),
            cancel_on: 2,
        };
        let mut exec = ScenarioExecutor::new().with_factory(Box::new(factory));
        let config = config().with_num_channels(1);

        let scenario = BenchmarkScenario::new(algorithm, BackendKind::Npu, BatchMode::Single);
        let s = exec
            .run_scenario(scenario, DataScale::Micro1K, &config, &cancel)
            .unwrap();

        assert_eq!(s.state, RunState::Cancelled);
        assert_eq!(exec.state(), RunState::Cancelled);
        assert_eq!(s.iterations_requested, 4);
        assert_eq!(s.iterations_completed, 2);
        assert_eq!(s.samples.len(), 2);
        assert!(s.timings.total.mean > 0.0, "{:?}", s.timings.total);
        assert!(!s.fell_back());
        assert!(s.summary_text().contains("cancelled after 2/4"), "{}", s.summary_text());
    }
}
