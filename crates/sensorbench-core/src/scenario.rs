//! Benchmark scenario and data-scale catalogues.

use crate::backend::BackendKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal lengths at or above this are flagged as memory-heavy
pub const MEMORY_HEAVY_THRESHOLD: usize = 262_144;

/// Benchmarked algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Windowed magnitude statistics
    Mad,
    /// Weighted one-sided spectrum
    Fft,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mad => write!(f, "MAD"),
            Self::Fft => write!(f, "FFT"),
        }
    }
}

/// Packets processed per iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchMode {
    /// One packet per iteration
    Single,
    /// `batch_size` packets per iteration
    Batched,
}

impl BatchMode {
    /// Packets per iteration for a configured batch size
    pub const fn packet_count(self, batch_size: usize) -> usize {
        match self {
            Self::Single => 1,
            Self::Batched => batch_size,
        }
    }
}

/// One cell of the benchmark matrix (without its data scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BenchmarkScenario {
    /// Algorithm under test
    pub algorithm: Algorithm,
    /// Backend selector
    pub backend: BackendKind,
    /// Batch mode
    pub batch_mode: BatchMode,
}

impl BenchmarkScenario {
    /// Build a scenario
    pub const fn new(algorithm: Algorithm, backend: BackendKind, batch_mode: BatchMode) -> Self {
        Self {
            algorithm,
            backend,
            batch_mode,
        }
    }

    /// Full suite in run order: MAD before FFT, single before batched,
    /// reference backend first.
    pub fn suite_order() -> Vec<Self> {
        let mut scenarios = Vec::with_capacity(16);
        for algorithm in [Algorithm::Mad, Algorithm::Fft] {
            for batch_mode in [BatchMode::Single, BatchMode::Batched] {
                for backend in BackendKind::ALL {
                    scenarios.push(Self::new(algorithm, backend, batch_mode));
                }
            }
        }
        scenarios
    }

    /// Stable identifier, e.g. `fft_software_batch`
    pub fn id(&self) -> String {
        let algorithm = match self.algorithm {
            Algorithm::Mad => "mad",
            Algorithm::Fft => "fft",
        };
        let mode = match self.batch_mode {
            BatchMode::Single => "single",
            BatchMode::Batched => "batch",
        };
        format!("{algorithm}_{}_{mode}", self.backend.tag())
    }

    /// Display label, e.g. `FFT Software x10`
    pub fn label(&self, batch_size: usize) -> String {
        let backend = match self.backend {
            BackendKind::CpuReference => "CPU",
            BackendKind::Software => "Software",
            BackendKind::Gpu => "GPU",
            BackendKind::Npu => "NPU",
        };
        match self.batch_mode {
            BatchMode::Single => format!("{} {backend}", self.algorithm),
            BatchMode::Batched => format!("{} {backend} x{batch_size}", self.algorithm),
        }
    }

    /// Which execution path the scenario exercises
    pub fn processing_mode(&self) -> &'static str {
        if self.backend.is_accelerated() {
            "Accelerated"
        } else {
            "CPU reference"
        }
    }

    /// Find a scenario by its [`id`](Self::id)
    pub fn from_id(id: &str) -> Option<Self> {
        Self::suite_order().into_iter().find(|s| s.id() == id)
    }
}

/// Named signal length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataScale {
    /// 512
    Micro512,
    /// 1 024
    Micro1K,
    /// 2 048
    Micro2K,
    /// 4 096
    Base,
    /// 8 192
    Double,
    /// 16 384
    Quadruple,
    /// 32 768
    Extreme32K,
    /// 65 536
    Extreme64K,
    /// 131 072
    Extreme128K,
    /// 262 144
    Extreme256K,
    /// 526 000
    Extreme526K,
}

impl DataScale {
    /// Every scale, ascending
    pub const ALL: [Self; 11] = [
        Self::Micro512,
        Self::Micro1K,
        Self::Micro2K,
        Self::Base,
        Self::Double,
        Self::Quadruple,
        Self::Extreme32K,
        Self::Extreme64K,
        Self::Extreme128K,
        Self::Extreme256K,
        Self::Extreme526K,
    ];

    /// Samples per channel
    pub const fn length(self) -> usize {
        match self {
            Self::Micro512 => 512,
            Self::Micro1K => 1_024,
            Self::Micro2K => 2_048,
            Self::Base => 4_096,
            Self::Double => 8_192,
            Self::Quadruple => 16_384,
            Self::Extreme32K => 32_768,
            Self::Extreme64K => 65_536,
            Self::Extreme128K => 131_072,
            Self::Extreme256K => 262_144,
            Self::Extreme526K => 526_000,
        }
    }

    /// Whether runs at this scale should be flagged for memory pressure
    pub const fn is_memory_heavy(self) -> bool {
        self.length() >= MEMORY_HEAVY_THRESHOLD
    }

    /// Scale with exactly this length, if any
    pub fn from_length(length: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.length() == length)
    }

    /// Base, double and quadruple
    pub const fn default_scales() -> [Self; 3] {
        [Self::Base, Self::Double, Self::Quadruple]
    }

    /// 32K, 64K and 128K
    pub const fn extreme_scales() -> [Self; 3] {
        [Self::Extreme32K, Self::Extreme64K, Self::Extreme128K]
    }

    /// Small scales plus 128K
    pub const fn focused_scales() -> [Self; 4] {
        [Self::Micro512, Self::Micro1K, Self::Micro2K, Self::Extreme128K]
    }

    /// 256K and 526K
    pub const fn experimental_scales() -> [Self; 2] {
        [Self::Extreme256K, Self::Extreme526K]
    }

    /// 512 through 64K, ascending
    pub const fn unified_scales() -> [Self; 8] {
        [
            Self::Micro512,
            Self::Micro1K,
            Self::Micro2K,
            Self::Base,
            Self::Double,
            Self::Quadruple,
            Self::Extreme32K,
            Self::Extreme64K,
        ]
    }

    /// Resolve a group name (`default`, `extreme`, `focused`, `experimental`,
    /// `unified`, `all`)
    pub fn group(name: &str) -> Option<Vec<Self>> {
        match name {
            "default" => Some(Self::default_scales().to_vec()),
            "extreme" => Some(Self::extreme_scales().to_vec()),
            "focused" => Some(Self::focused_scales().to_vec()),
            "experimental" => Some(Self::experimental_scales().to_vec()),
            "unified" => Some(Self::unified_scales().to_vec()),
            "all" => Some(Self::ALL.to_vec()),
            _ => None,
        }
    }
}

impl fmt::Display for DataScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({} samples)", self, self.length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn suite_covers_the_full_matrix() {
        let suite = BenchmarkScenario::suite_order();
        assert_eq!(suite.len(), 16);
        let ids: HashSet<_> = suite.iter().map(BenchmarkScenario::id).collect();
        assert_eq!(ids.len(), 16, "scenario ids must be unique");
        assert_eq!(suite[0].id(), "mad_cpu_single");
        assert_eq!(suite[15].id(), "fft_npu_batch");
    }

    #[test]
    fn labels_and_lookup() {
        let s = BenchmarkScenario::new(Algorithm::Fft, BackendKind::Software, BatchMode::Batched);
        assert_eq!(s.label(10), "FFT Software x10");
        assert_eq!(s.processing_mode(), "Accelerated");
        assert_eq!(BenchmarkScenario::from_id("fft_software_batch"), Some(s));
        assert_eq!(BenchmarkScenario::from_id("fft_tpu_batch"), None);

        let cpu = BenchmarkScenario::new(Algorithm::Mad, BackendKind::CpuReference, BatchMode::Single);
        assert_eq!(cpu.label(10), "MAD CPU");
        assert_eq!(BatchMode::Single.packet_count(10), 1);
        assert_eq!(BatchMode::Batched.packet_count(10), 10);
    }

    #[test]
    fn scale_lengths_ascend() {
        assert!(DataScale::ALL.windows(2).all(|w| w[0].length() < w[1].length()));
        assert!(DataScale::unified_scales()
            .windows(2)
            .all(|w| w[0].length() < w[1].length()));
        assert_eq!(DataScale::unified_scales().len(), 8);
    }

    #[test]
    fn memory_heavy_flag() {
        assert!(!DataScale::Extreme128K.is_memory_heavy());
        assert!(DataScale::Extreme256K.is_memory_heavy());
        assert!(DataScale::Extreme526K.is_memory_heavy());
        assert_eq!(DataScale::from_length(526_000), Some(DataScale::Extreme526K));
    }

    #[test]
    fn named_groups() {
        assert_eq!(DataScale::group("default").unwrap().len(), 3);
        assert_eq!(DataScale::group("all").unwrap().len(), 11);
        assert!(DataScale::group("huge").is_none());
    }
}
