//! Accelerated backend abstraction
//!
//! Every non-reference execution path (software emulation, GPU, NPU) is driven
//! through [`AcceleratedBackend`]. Construction goes through a
//! [`BackendFactory`], which decides from the requested [`BackendKind`] whether
//! the backend can exist on this host. Both construction and per-call failures
//! are returned as errors; recovery is the executor's job.

use crate::error::{BenchError, Result};
use crate::fft::{FftNormalization, FftResult};
use crate::generator::SensorChannel;
use crate::input::FftInput;
use crate::mad::MadResult;
use crate::timing::Timed;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::str::FromStr;

/// Accelerated backend contract
pub trait AcceleratedBackend: Debug + Send {
    /// Which backend this is
    fn backend_kind(&self) -> BackendKind;

    /// Run the FFT pipeline on one input
    ///
    /// # Errors
    ///
    /// Returns `BackendProcessing` if the backend cannot complete the call.
    fn process_fft(&mut self, input: &FftInput) -> Result<Timed<FftResult>>;

    /// Run the MAD pipeline on one channel
    ///
    /// # Errors
    ///
    /// Returns `BackendProcessing` if the backend cannot complete the call.
    fn process_mad(&mut self, channel: &SensorChannel) -> Result<Timed<MadResult>>;

    /// Release backend resources. Safe to call more than once.
    fn close(&mut self);
}

/// Capability-based backend construction
pub trait BackendFactory: Debug {
    /// Construct the backend described by `config`
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot run here.
    fn try_create(&self, config: &BackendConfig) -> Result<Box<dyn AcceleratedBackend>>;
}

/// Backend identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Reference engines called directly, no backend object
    CpuReference,

    /// Single-precision CPU emulation of an accelerator
    Software,

    /// GPU delegate
    Gpu,

    /// Neural processing unit delegate
    Npu,
}

impl BackendKind {
    /// All kinds, reference first
    pub const ALL: [Self; 4] = [Self::CpuReference, Self::Software, Self::Gpu, Self::Npu];

    /// Whether scenarios on this kind go through an [`AcceleratedBackend`]
    pub const fn is_accelerated(self) -> bool {
        !matches!(self, Self::CpuReference)
    }

    /// Short tag used in scenario ids and labels
    pub const fn tag(self) -> &'static str {
        match self {
            Self::CpuReference => "cpu",
            Self::Software => "software",
            Self::Gpu => "gpu",
            Self::Npu => "npu",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpuReference => write!(f, "CPU reference"),
            Self::Software => write!(f, "Software (f32 emulation)"),
            Self::Gpu => write!(f, "GPU"),
            Self::Npu => write!(f, "NPU"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" | "cpu-reference" | "reference" => Ok(Self::CpuReference),
            "software" | "sw" => Ok(Self::Software),
            "gpu" => Ok(Self::Gpu),
            "npu" => Ok(Self::Npu),
            other => Err(BenchError::invalid_input(format!("unknown backend '{other}'"))),
        }
    }
}

/// Backend construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Requested backend
    pub kind: BackendKind,
    /// FFT channel count the backend should expect
    pub num_channels: usize,
    /// FFT signal length the backend should expect
    pub signal_length: usize,
    /// FFT normalization
    pub normalization: FftNormalization,
}

impl BackendConfig {
    /// Config for `kind` with the given FFT shape
    pub fn new(kind: BackendKind, num_channels: usize, signal_length: usize) -> Self {
        Self {
            kind,
            num_channels,
            signal_length,
            normalization: FftNormalization::None,
        }
    }

    /// Set FFT normalization
    #[must_use]
    pub fn with_normalization(mut self, normalization: FftNormalization) -> Self {
        self.normalization = normalization;
        self
    }
}

/// Factory for the backends this crate ships.
///
/// `Software` is always available. `Gpu` and `Npu` have no in-tree
/// implementation and report `BackendUnavailable`, which makes the executor
/// fall back to the reference path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn try_create(&self, config: &BackendConfig) -> Result<Box<dyn AcceleratedBackend>> {
        use crate::backends::software::SoftwareBackend;

        match config.kind {
            BackendKind::Software => {
                let backend = SoftwareBackend::init(config)?;
                tracing::info!(
                    "Using software backend ({} × {})",
                    config.num_channels,
                    config.signal_length
                );
                Ok(Box::new(backend))
            }
            BackendKind::Gpu | BackendKind::Npu => Err(BenchError::backend_unavailable(
                config.kind,
                "no delegate available on this host",
            )),
            BackendKind::CpuReference => Err(BenchError::invalid_input(
                "the CPU reference path does not use a backend",
            )),
        }
    }
}

/// Build a backend with the default factory
///
/// # Errors
///
/// Returns error if the requested backend cannot be constructed.
pub fn select_backend(config: &BackendConfig) -> Result<Box<dyn AcceleratedBackend>> {
    DefaultBackendFactory.try_create(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_is_always_available() {
        let backend = select_backend(&BackendConfig::new(BackendKind::Software, 2, 64)).unwrap();
        assert_eq!(backend.backend_kind(), BackendKind::Software);
    }

    #[test]
    fn hardware_kinds_are_unavailable() {
        for kind in [BackendKind::Gpu, BackendKind::Npu] {
            let err = select_backend(&BackendConfig::new(kind, 2, 64)).unwrap_err();
            assert!(err.is_backend_failure(), "{kind}: {err}");
        }
    }

    #[test]
    fn reference_kind_has_no_backend() {
        let err = select_backend(&BackendConfig::new(BackendKind::CpuReference, 2, 64));
        assert!(matches!(err, Err(BenchError::InvalidInput { .. })));
    }

    #[test]
    fn kind_parses_from_tags() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.tag().parse::<BackendKind>().unwrap(), kind);
        }
        assert!("tpu".parse::<BackendKind>().is_err());
        assert!(!BackendKind::CpuReference.is_accelerated());
        assert!(BackendKind::Npu.is_accelerated());
    }
}
