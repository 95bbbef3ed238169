//! Result records and the sink they are handed to.
//!
//! The core performs no I/O. Binaries implement [`ResultSink`] to persist
//! records (the CLI writes JSON lines to stdout).

use crate::backend::BackendKind;
use crate::executor::{RunState, ScenarioRunSummary};
use crate::telemetry::TelemetryDelta;
use crate::timing::{InferenceTiming, TimingStats};
use crate::validation::{MadPrecision, PrecisionRecord};
use serde::{Deserialize, Serialize};

/// Flat, persistable record of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    /// Stable scenario id
    pub scenario_id: String,
    /// Display label
    pub label: String,
    /// Which path the scenario exercises
    pub processing_mode: String,
    /// Requested backend
    pub backend: BackendKind,
    /// Samples per channel
    pub data_length: usize,
    /// Terminal state
    pub state: RunState,
    /// Iteration budget
    pub iterations: usize,
    /// Iterations timed
    pub iterations_completed: usize,
    /// Packets per iteration
    pub batch_size: usize,
    /// Elements fed per iteration
    pub input_size: usize,
    /// Aggregated timing
    pub timings: TimingStats,
    /// Per-iteration samples
    pub samples: Vec<InferenceTiming>,
    /// Operations per second
    pub throughput: f64,
    /// Whether the run fell back to the CPU reference
    pub cpu_fallback: bool,
    /// Highlights plus fallback annotation
    pub notes: String,
    /// Battery and thermal change
    pub telemetry: Option<TelemetryDelta>,
}

impl ScenarioRecord {
    /// Flatten a run summary
    pub fn from_summary(summary: &ScenarioRunSummary) -> Self {
        Self {
            scenario_id: summary.scenario.id(),
            label: summary.label.clone(),
            processing_mode: summary.scenario.processing_mode().to_string(),
            backend: summary.scenario.backend,
            data_length: summary.scale.length(),
            state: summary.state,
            iterations: summary.iterations_requested,
            iterations_completed: summary.iterations_completed,
            batch_size: summary.packets,
            input_size: summary.input_size,
            timings: summary.timings,
            samples: summary.samples.clone(),
            throughput: summary.throughput,
            cpu_fallback: summary.fell_back(),
            notes: summary.notes(),
            telemetry: summary.telemetry.clone(),
        }
    }
}

/// Receiver of result records
pub trait ResultSink {
    /// One scenario run finished
    fn record_scenario(&mut self, record: &ScenarioRecord);

    /// One FFT precision comparison finished
    fn record_precision(&mut self, record: &PrecisionRecord);

    /// One MAD precision comparison finished
    fn record_mad_precision(&mut self, _record: &MadPrecision) {}
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn record_scenario(&mut self, _record: &ScenarioRecord) {}

    fn record_precision(&mut self, _record: &PrecisionRecord) {}
}

/// Sink that keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Scenario records, in arrival order
    pub scenarios: Vec<ScenarioRecord>,
    /// FFT precision records, in arrival order
    pub precision: Vec<PrecisionRecord>,
    /// MAD precision records, in arrival order
    pub mad_precision: Vec<MadPrecision>,
}

impl ResultSink for MemorySink {
    fn record_scenario(&mut self, record: &ScenarioRecord) {
        self.scenarios.push(record.clone());
    }

    fn record_precision(&mut self, record: &PrecisionRecord) {
        self.precision.push(record.clone());
    }

    fn record_mad_precision(&mut self, record: &MadPrecision) {
        self.mad_precision.push(record.clone());
    }
}
