//! Streaming error metrics between a reference and a candidate array.
//!
//! Feed element pairs channel by channel with [`ErrorMetricsAccumulator::consume`]
//! and read the result with [`ErrorMetricsAccumulator::build`]. Splitting the
//! input into several calls yields the same metrics as one call over the
//! concatenation.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};

/// Reference magnitudes below this are excluded from relative error
pub const RELATIVE_ERROR_GUARD: f64 = 1e3;

const EPSILON: f64 = 1e-12;

/// Aggregate error between two arrays.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorMetrics {
    /// Largest relative error over guarded elements
    pub max_relative_error: f64,
    /// Mean relative error over guarded elements
    pub mean_relative_error: f64,
    /// Largest absolute error
    pub max_absolute_error: f64,
    /// Mean absolute error
    pub mean_absolute_error: f64,
    /// Root mean squared error
    pub rmse: f64,
}

impl ErrorMetrics {
    /// Whether the largest relative error is finite and within `tolerance`
    pub fn within_relative(&self, tolerance: f64) -> bool {
        self.max_relative_error.is_finite() && self.max_relative_error <= tolerance
    }
}

/// Incremental error accumulator.
#[derive(Debug, Clone)]
pub struct ErrorMetricsAccumulator {
    guard: f64,
    max_relative: f64,
    sum_relative: f64,
    relative_count: usize,
    max_absolute: f64,
    sum_absolute: f64,
    sum_squared: f64,
    count: usize,
    non_finite: usize,
}

impl Default for ErrorMetricsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorMetricsAccumulator {
    /// Accumulator with the standard relative-error guard
    pub fn new() -> Self {
        Self::with_guard(RELATIVE_ERROR_GUARD)
    }

    /// Accumulator with a custom relative-error guard
    pub fn with_guard(guard: f64) -> Self {
        Self {
            guard,
            max_relative: 0.0,
            sum_relative: 0.0,
            relative_count: 0,
            max_absolute: 0.0,
            sum_absolute: 0.0,
            sum_squared: 0.0,
            count: 0,
            non_finite: 0,
        }
    }

    /// Elements observed so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Elements that contributed to relative error so far
    pub fn relative_count(&self) -> usize {
        self.relative_count
    }

    /// Elements whose difference was NaN or infinite
    pub fn non_finite_count(&self) -> usize {
        self.non_finite
    }

    /// Compare `candidate` against `reference` element-wise.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the slices differ in length; nothing is
    /// accumulated in that case.
    pub fn consume(&mut self, reference: &[f32], candidate: &[f32]) -> Result<()> {
        if reference.len() != candidate.len() {
            return Err(BenchError::shape_mismatch(
                "candidate",
                reference.len(),
                candidate.len(),
            ));
        }

        for (&r, &c) in reference.iter().zip(candidate) {
            let r = f64::from(r);
            let abs = (r - f64::from(c)).abs();
            self.count += 1;

            // NaN would vanish in f64::max; poison the result in build() instead
            if !abs.is_finite() {
                self.non_finite += 1;
                continue;
            }

            if r.abs() >= self.guard {
                let rel = abs / r.abs().max(EPSILON);
                self.max_relative = self.max_relative.max(rel);
                self.sum_relative += rel;
                self.relative_count += 1;
            }

            self.max_absolute = self.max_absolute.max(abs);
            self.sum_absolute += abs;
            self.sum_squared += abs * abs;
        }
        Ok(())
    }

    /// Finalize. Zero observed elements produce all-zero metrics; any
    /// non-finite difference makes every field infinite.
    #[allow(clippy::cast_precision_loss)]
    pub fn build(&self) -> ErrorMetrics {
        if self.count == 0 {
            return ErrorMetrics::default();
        }
        if self.non_finite > 0 {
            return ErrorMetrics {
                max_relative_error: f64::INFINITY,
                mean_relative_error: f64::INFINITY,
                max_absolute_error: f64::INFINITY,
                mean_absolute_error: f64::INFINITY,
                rmse: f64::INFINITY,
            };
        }
        let n = self.count as f64;
        let mean_relative_error = if self.relative_count == 0 {
            0.0
        } else {
            self.sum_relative / self.relative_count as f64
        };
        ErrorMetrics {
            max_relative_error: self.max_relative,
            mean_relative_error,
            max_absolute_error: self.max_absolute,
            mean_absolute_error: self.sum_absolute / n,
            rmse: (self.sum_squared / n).sqrt(),
        }
    }
}
