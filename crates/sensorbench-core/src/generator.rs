//! Deterministic synthetic accelerometer batches.
//!
//! Every channel draws its noise from an independent ChaCha8 stream seeded
//! with `seed + channel_index`, so the same `(seed, shape)` pair always yields
//! the same batch on every platform.
//!
//! ```text
//! axis[i] = trunc(A · (sin(2π f t) + ½ sin(2π 2f t)) · 1024 + noise)
//!   t = i / len          f = 0.2 + 0.05 · channel
//!   noise ∈ [-½, ½) · 0.3 · (channel + 1)
//! ```

use crate::error::{BenchError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Timestamp step between consecutive samples (ms, ~50 Hz)
pub const TIMESTAMP_STEP_MS: i64 = 20;

/// Default generator seed
pub const DEFAULT_SEED: u64 = 42;

const ACC_SCALE: f32 = 1024.0;
const X_AMPLITUDE: f32 = 0.8;
const Y_AMPLITUDE: f32 = 1.1;
const Z_AMPLITUDE: f32 = 1.3;

/// One sensor channel: timestamps plus three integer axes of equal length.
///
/// Every axis holds exactly `len()` samples; deserialization is checked by
/// [`SensorChannel::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChannel")]
pub struct SensorChannel {
    timestamps: Vec<i64>,
    x: Vec<i32>,
    y: Vec<i32>,
    z: Vec<i32>,
}

#[derive(Deserialize)]
struct RawChannel {
    timestamps: Vec<i64>,
    x: Vec<i32>,
    y: Vec<i32>,
    z: Vec<i32>,
}

impl TryFrom<RawChannel> for SensorChannel {
    type Error = BenchError;

    fn try_from(raw: RawChannel) -> Result<Self> {
        Self::new(raw.timestamps, raw.x, raw.y, raw.z)
    }
}

impl SensorChannel {
    /// Build a channel, checking that every axis has the same positive length.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` on empty or ragged axes.
    pub fn new(timestamps: Vec<i64>, x: Vec<i32>, y: Vec<i32>, z: Vec<i32>) -> Result<Self> {
        let len = timestamps.len();
        if len == 0 {
            return Err(BenchError::invalid_input("channel has no samples"));
        }
        if x.len() != len || y.len() != len || z.len() != len {
            return Err(BenchError::invalid_input(format!(
                "ragged channel: t={len} x={} y={} z={}",
                x.len(),
                y.len(),
                z.len()
            )));
        }
        Ok(Self { timestamps, x, y, z })
    }

    /// Sample timestamps in milliseconds
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// X axis samples
    pub fn x(&self) -> &[i32] {
        &self.x
    }

    /// Y axis samples
    pub fn y(&self) -> &[i32] {
        &self.y
    }

    /// Z axis samples
    pub fn z(&self) -> &[i32] {
        &self.z
    }

    /// `(x, y, z)` of sample `i`, `None` past the end
    pub fn axes(&self, i: usize) -> Option<(i32, i32, i32)> {
        Some((*self.x.get(i)?, *self.y.get(i)?, *self.z.get(i)?))
    }

    /// Number of samples in this channel
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the channel holds no samples
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Euclidean norm of sample `i`
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    pub fn magnitude(&self, i: usize) -> f64 {
        let (x, y, z) = (
            i64::from(self.x[i]),
            i64::from(self.y[i]),
            i64::from(self.z[i]),
        );
        #[allow(clippy::cast_precision_loss)]
        let sum = (x * x + y * y + z * z) as f64;
        sum.sqrt()
    }
}

/// A fixed set of channels produced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBatch {
    /// Channels, indexed by sensor number
    pub channels: Vec<SensorChannel>,
}

impl SampleBatch {
    /// Wrap pre-built channels
    pub fn from_channels(channels: Vec<SensorChannel>) -> Self {
        Self { channels }
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel (shortest channel, 0 when empty)
    pub fn samples_per_channel(&self) -> usize {
        self.channels.iter().map(SensorChannel::len).min().unwrap_or(0)
    }
}

/// Generate a reproducible batch.
///
/// # Errors
///
/// Returns `InvalidInput` if either count is zero.
pub fn generate(num_channels: usize, samples_per_channel: usize, seed: u64) -> Result<SampleBatch> {
    if num_channels == 0 {
        return Err(BenchError::invalid_input("num_channels must be > 0"));
    }
    if samples_per_channel == 0 {
        return Err(BenchError::invalid_input("samples_per_channel must be > 0"));
    }

    let channels = (0..num_channels)
        .map(|c| generate_channel(c, samples_per_channel, seed))
        .collect();
    Ok(SampleBatch { channels })
}

fn generate_channel(channel: usize, len: usize, seed: u64) -> SensorChannel {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(channel as u64));

    #[allow(clippy::cast_possible_wrap)]
    let base = (channel * len) as i64 * TIMESTAMP_STEP_MS;
    #[allow(clippy::cast_possible_wrap)]
    let timestamps = (0..len)
        .map(|i| base + i as i64 * TIMESTAMP_STEP_MS)
        .collect();

    let x = generate_axis(&mut rng, len, channel, X_AMPLITUDE);
    let y = generate_axis(&mut rng, len, channel, Y_AMPLITUDE);
    let z = generate_axis(&mut rng, len, channel, Z_AMPLITUDE);

    SensorChannel { timestamps, x, y, z }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn generate_axis(rng: &mut ChaCha8Rng, len: usize, channel: usize, amplitude: f32) -> Vec<i32> {
    let base_frequency = 0.2f32 + channel as f32 * 0.05;
    let noise_scale = (channel + 1) as f32 * 0.3;
    (0..len)
        .map(|i| {
            let t = i as f32 / len as f32;
            let wave = (2.0 * PI * base_frequency * t).sin()
                + 0.5 * (2.0 * PI * base_frequency * 2.0 * t).sin();
            let noise = (rng.gen::<f32>() - 0.5) * noise_scale;
            (amplitude * wave * ACC_SCALE + noise) as i32
        })
        .collect()
}
