//! Error types for benchmark and validation operations

use crate::backend::BackendKind;
use thiserror::Error;

/// Result type alias for sensorbench operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur while generating inputs, running engines or backends
#[derive(Debug, Error)]
pub enum BenchError {
    /// Precondition violated on a count, length or configuration value
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Reason for failure
        reason: String,
    },

    /// A channel holds fewer samples than the requested signal length
    #[error("Channel {channel} has {available} samples, {required} required")]
    InsufficientSamples {
        /// Offending channel index
        channel: usize,
        /// Requested signal length
        required: usize,
        /// Samples actually present
        available: usize,
    },

    /// Array shapes disagree with what the engine was configured for
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Which array or dimension mismatched
        what: String,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Backend could not be constructed on this device or configuration
    #[error("Backend {backend} unavailable: {reason}")]
    BackendUnavailable {
        /// Backend that failed to construct
        backend: BackendKind,
        /// Reason for failure
        reason: String,
    },

    /// Backend failed while processing a request
    #[error("Backend {backend} processing failed: {reason}")]
    BackendProcessing {
        /// Backend that failed
        backend: BackendKind,
        /// Reason for failure
        reason: String,
    },

    /// Cooperative cancellation was observed
    #[error("Cancellation requested")]
    Cancelled,
}

impl BenchError {
    /// Create an invalid input error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable(backend: BackendKind, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    /// Create a backend processing error
    pub fn backend_processing(backend: BackendKind, reason: impl Into<String>) -> Self {
        Self::BackendProcessing {
            backend,
            reason: reason.into(),
        }
    }

    /// Whether the executor recovers from this error by falling back to the CPU path
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::BackendProcessing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_are_recoverable() {
        assert!(BenchError::backend_unavailable(BackendKind::Gpu, "no device").is_backend_failure());
        assert!(BenchError::backend_processing(BackendKind::Npu, "timeout").is_backend_failure());
        assert!(!BenchError::invalid_input("bad").is_backend_failure());
        assert!(!BenchError::Cancelled.is_backend_failure());
    }

    #[test]
    fn messages_name_the_shape() {
        let err = BenchError::shape_mismatch("weights[0]", 5, 4);
        assert_eq!(err.to_string(), "Shape mismatch for weights[0]: expected 5, got 4");
    }
}
