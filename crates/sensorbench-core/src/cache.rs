//! Per-session caches owned by the executor.
//!
//! Generating a batch and building FFT inputs for the large scales costs far
//! more than one benchmark iteration, so both are built once per
//! `(length, channels, seed)` and shared by `Arc`. FFT planning is cached per
//! `(length, channels, normalization)`.
//!
//! Neither cache is synchronized; each executor owns its own.

use crate::error::Result;
use crate::fft::{FftCpuProcessor, FftNormalization};
use crate::generator::{self, SampleBatch};
use crate::input::{build_fft_input, FftInput};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BatchKey {
    length: usize,
    num_channels: usize,
    seed: u64,
}

/// Generated batches and derived FFT inputs.
#[derive(Debug, Default)]
pub struct InputCache {
    batches: HashMap<BatchKey, Arc<SampleBatch>>,
    fft_inputs: HashMap<BatchKey, Arc<FftInput>>,
}

impl InputCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch of `num_channels × length` samples for `seed`, generated on first use.
    ///
    /// # Errors
    ///
    /// Propagates generator precondition failures.
    pub fn batch(&mut self, length: usize, num_channels: usize, seed: u64) -> Result<Arc<SampleBatch>> {
        let key = BatchKey {
            length,
            num_channels,
            seed,
        };
        if let Some(batch) = self.batches.get(&key) {
            return Ok(Arc::clone(batch));
        }
        debug!("InputCache: generating {num_channels} × {length} (seed {seed})");
        let batch = Arc::new(generator::generate(num_channels, length, seed)?);
        self.batches.insert(key, Arc::clone(&batch));
        Ok(batch)
    }

    /// FFT input over the full length of the matching batch.
    ///
    /// # Errors
    ///
    /// Propagates generator and input-adapter failures.
    pub fn fft_input(&mut self, length: usize, num_channels: usize, seed: u64) -> Result<Arc<FftInput>> {
        let key = BatchKey {
            length,
            num_channels,
            seed,
        };
        if let Some(input) = self.fft_inputs.get(&key) {
            return Ok(Arc::clone(input));
        }
        let batch = self.batch(length, num_channels, seed)?;
        let input = Arc::new(build_fft_input(&batch, length)?);
        self.fft_inputs.insert(key, Arc::clone(&input));
        Ok(input)
    }

    /// Drop every entry whose length differs from `length`
    pub fn retain_length(&mut self, length: usize) {
        self.batches.retain(|k, _| k.length == length);
        self.fft_inputs.retain(|k, _| k.length == length);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.batches.clear();
        self.fft_inputs.clear();
    }

    /// Number of cached batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether no batch is cached
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EngineKey {
    length: usize,
    num_channels: usize,
    normalization: FftNormalization,
}

/// Planned reference FFT engines.
#[derive(Debug, Default)]
pub struct FftEngineCache {
    engines: HashMap<EngineKey, FftCpuProcessor>,
}

impl FftEngineCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine for the given shape, planned on first use.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for shapes the engine rejects.
    pub fn get_or_create(
        &mut self,
        length: usize,
        num_channels: usize,
        normalization: FftNormalization,
    ) -> Result<&mut FftCpuProcessor> {
        let key = EngineKey {
            length,
            num_channels,
            normalization,
        };
        match self.engines.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!("FftEngineCache: planning N={length} × {num_channels}");
                let engine =
                    FftCpuProcessor::with_normalization(num_channels, length, normalization)?;
                Ok(entry.insert(engine))
            }
        }
    }

    /// Drop every engine whose length differs from `length`
    pub fn retain_length(&mut self, length: usize) {
        self.engines.retain(|k, _| k.length == length);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.engines.clear();
    }

    /// Number of cached engines
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Whether no engine is cached
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_are_shared() {
        let mut cache = InputCache::new();
        let a = cache.batch(64, 2, 9).unwrap();
        let b = cache.batch(64, 2, 9).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = cache.batch(64, 2, 10).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn fft_input_reuses_the_batch() {
        let mut cache = InputCache::new();
        let input = cache.fft_input(32, 3, 1).unwrap();
        assert_eq!(input.num_channels(), 3);
        assert_eq!(input.signal_length(), 32);
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&input, &cache.fft_input(32, 3, 1).unwrap()));
    }

    #[test]
    fn retain_drops_other_lengths() {
        let mut cache = InputCache::new();
        cache.fft_input(32, 1, 1).unwrap();
        cache.fft_input(64, 1, 1).unwrap();
        cache.retain_length(64);
        assert_eq!(cache.len(), 1);

        let mut engines = FftEngineCache::new();
        engines.get_or_create(32, 1, FftNormalization::None).unwrap();
        engines.get_or_create(64, 1, FftNormalization::None).unwrap();
        engines.get_or_create(64, 1, FftNormalization::None).unwrap();
        assert_eq!(engines.len(), 2);
        engines.retain_length(32);
        assert_eq!(engines.len(), 1);
        engines.clear();
        assert!(engines.is_empty());
    }

    #[test]
    fn bad_shapes_are_not_cached() {
        let mut engines = FftEngineCache::new();
        assert!(engines.get_or_create(1, 1, FftNormalization::None).is_err());
        assert!(engines.is_empty());
        assert!(InputCache::new().batch(0, 1, 1).is_err());
    }
}
