//! Reference signal-processing engines and cross-backend precision validation.
//!
//! Two algorithms are benchmarked over synthetic accelerometer data: a weighted
//! one-sided FFT and MAD, a windowed statistical summary of block-averaged
//! magnitudes. Each runs on a deterministic CPU reference path and on
//! accelerated backends, and the results are compared within bounded error.
//!
//! # Pipeline
//!
//! ```text
//! generator ──► input ──┬──► fft / mad (CPU reference) ──┐
//!                       │                                ├──► metrics ──► validation
//!                       └──► AcceleratedBackend ─────────┘
//!                                   │
//!                   executor (iterations, timing, fallback, cancellation)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use sensorbench_core::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let mut exec = ScenarioExecutor::new();
//! let scenario = BenchmarkScenario::new(Algorithm::Fft, BackendKind::Software, BatchMode::Single);
//! let summary = exec.run_scenario(
//!     scenario,
//!     DataScale::Base,
//!     &RunConfig::default(),
//!     &CancellationToken::new(),
//! )?;
//! println!("{}", summary.summary_text());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod backend;
pub mod backends;
mod cache;
mod error;
mod executor;
pub mod fft;
pub mod generator;
pub mod input;
pub mod mad;
pub mod metrics;
mod report;
mod scenario;
mod telemetry;
mod timing;
pub mod validation;

pub use backend::{
    select_backend, AcceleratedBackend, BackendConfig, BackendFactory, BackendKind,
    DefaultBackendFactory,
};
pub use backends::SoftwareBackend;
pub use cache::{FftEngineCache, InputCache};
pub use error::{BenchError, Result};
pub use executor::{
    format_mad_result, format_stats, CancellationToken, RunConfig, RunState, ScenarioExecutor,
    ScenarioRunSummary, SuiteConfig, SuiteEntry, SuiteProgress, SuiteReport, DEFAULT_BATCH_SIZE,
    DEFAULT_ITERATIONS, FFT_NUM_CHANNELS,
};
pub use fft::{dft_reference, FftCpuProcessor, FftNormalization, FftResult};
pub use generator::{generate, SampleBatch, SensorChannel};
pub use input::{build_fft_input, FftInput};
pub use mad::{compute_mad, readings_from_channel, MadReading, MadResult};
pub use metrics::{ErrorMetrics, ErrorMetricsAccumulator, RELATIVE_ERROR_GUARD};
pub use report::{MemorySink, NullSink, ResultSink, ScenarioRecord};
pub use scenario::{Algorithm, BatchMode, BenchmarkScenario, DataScale, MEMORY_HEAVY_THRESHOLD};
pub use telemetry::{NoTelemetry, TelemetryCollector, TelemetryDelta, TelemetrySnapshot};
pub use timing::{InferenceTiming, StatsSummary, Timed, TimingStats};
pub use validation::{MadPrecision, PrecisionRecord, PrecisionStats, SweepConfig, Verdict};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AcceleratedBackend, Algorithm, BackendConfig, BackendFactory, BackendKind, BatchMode,
        BenchError, BenchmarkScenario, CancellationToken, DataScale, ErrorMetrics,
        ErrorMetricsAccumulator, FftCpuProcessor, FftInput, FftNormalization, FftResult,
        MadResult, Result, ResultSink, RunConfig, ScenarioExecutor, ScenarioRunSummary,
        SuiteConfig,
    };
}
