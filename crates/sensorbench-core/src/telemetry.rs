//! Optional device telemetry around scenario runs.
//!
//! The core never reads hardware sensors itself. Callers plug in a
//! [`TelemetryCollector`]; snapshots taken before and after a scenario become
//! a [`TelemetryDelta`] on the summary.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// Point-in-time battery and thermal readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Battery level, percent
    pub level_percent: f64,
    /// Battery temperature (°C)
    pub temperature_c: Option<f64>,
    /// CPU temperature (°C)
    pub cpu_temperature_c: Option<f64>,
    /// GPU temperature (°C)
    pub gpu_temperature_c: Option<f64>,
    /// Remaining charge (mAh)
    pub charge_mah: Option<f64>,
    /// Remaining energy (Wh)
    pub energy_wh: Option<f64>,
}

/// Source of telemetry snapshots
pub trait TelemetryCollector: Debug {
    /// Take a snapshot, or `None` if telemetry is unavailable right now
    fn capture_snapshot(&self) -> Option<TelemetrySnapshot>;
}

/// Collector for hosts without telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTelemetry;

impl TelemetryCollector for NoTelemetry {
    fn capture_snapshot(&self) -> Option<TelemetrySnapshot> {
        None
    }
}

/// Change between two snapshots over a scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryDelta {
    /// Battery level drop, percent points
    pub drop_percent: Option<f64>,
    /// Charge consumed (mAh)
    pub charge_drop_mah: Option<f64>,
    /// Average current over the run (mA)
    pub avg_current_ma: Option<f64>,
    /// Energy consumed (mWh)
    pub energy_drop_mwh: Option<f64>,
    /// Average power over the run (mW)
    pub avg_power_mw: Option<f64>,
    /// `Temperatures: Battery a -> b | CPU ...`, if any temperature was seen
    pub temperature_summary: Option<String>,
}

impl TelemetryDelta {
    /// Derive the delta for a run that lasted `elapsed`.
    ///
    /// Returns `None` when neither snapshot is available.
    pub fn between(
        start: Option<&TelemetrySnapshot>,
        end: Option<&TelemetrySnapshot>,
        elapsed: Duration,
    ) -> Option<Self> {
        if start.is_none() && end.is_none() {
            return None;
        }
        let both = start.zip(end);
        let hours = elapsed.as_secs_f64() / 3_600.0;

        let charge_drop_mah = both
            .and_then(|(s, e)| s.charge_mah.zip(e.charge_mah))
            .map(|(s, e)| s - e);
        let energy_drop_wh = both
            .and_then(|(s, e)| s.energy_wh.zip(e.energy_wh))
            .map(|(s, e)| s - e);

        Some(Self {
            drop_percent: both.map(|(s, e)| s.level_percent - e.level_percent),
            charge_drop_mah,
            avg_current_ma: charge_drop_mah.filter(|_| hours > 0.0).map(|q| q / hours),
            energy_drop_mwh: energy_drop_wh.map(|wh| wh * 1_000.0),
            avg_power_mw: energy_drop_wh
                .filter(|_| hours > 0.0)
                .map(|wh| wh / hours * 1_000.0),
            temperature_summary: temperature_summary(start, end),
        })
    }
}

fn temperature_summary(
    start: Option<&TelemetrySnapshot>,
    end: Option<&TelemetrySnapshot>,
) -> Option<String> {
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |t| format!("{t:.1}°C"));

    let readings: [(&str, fn(&TelemetrySnapshot) -> Option<f64>); 3] = [
        ("Battery", |s| s.temperature_c),
        ("CPU", |s| s.cpu_temperature_c),
        ("GPU", |s| s.gpu_temperature_c),
    ];

    let segments: Vec<String> = readings
        .into_iter()
        .filter_map(|(label, read)| {
            let (a, b) = (start.and_then(read), end.and_then(read));
            if a.is_none() && b.is_none() {
                return None;
            }
            Some(format!("{label} {} -> {}", fmt(a), fmt(b)))
        })
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(format!("Temperatures: {}", segments.join(" | ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(level: f64, charge: f64, temp: f64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            level_percent: level,
            temperature_c: Some(temp),
            charge_mah: Some(charge),
            ..TelemetrySnapshot::default()
        }
    }

    #[test]
    fn no_snapshots_no_delta() {
        assert!(NoTelemetry.capture_snapshot().is_none());
        assert!(TelemetryDelta::between(None, None, Duration::from_secs(1)).is_none());
    }

    #[test]
    fn charge_drop_and_current() {
        let start = snapshot(80.0, 3_000.0, 30.0);
        let end = snapshot(79.5, 2_990.0, 31.3);
        let delta =
            TelemetryDelta::between(Some(&start), Some(&end), Duration::from_secs(1_800)).unwrap();

        assert!((delta.drop_percent.unwrap() - 0.5).abs() < 1e-12);
        assert!((delta.charge_drop_mah.unwrap() - 10.0).abs() < 1e-12);
        assert!((delta.avg_current_ma.unwrap() - 20.0).abs() < 1e-9);
        assert!(delta.energy_drop_mwh.is_none());
        assert_eq!(
            delta.temperature_summary.as_deref(),
            Some("Temperatures: Battery 30.0°C -> 31.3°C")
        );
    }

    #[test]
    fn zero_elapsed_has_no_rates() {
        let s = snapshot(50.0, 100.0, 25.0);
        let delta = TelemetryDelta::between(Some(&s), Some(&s), Duration::ZERO).unwrap();
        assert!(delta.avg_current_ma.is_none());
        assert_eq!(delta.charge_drop_mah, Some(0.0));
    }

    #[test]
    fn one_sided_snapshot_still_reports_temperatures() {
        let s = snapshot(50.0, 100.0, 25.0);
        let delta = TelemetryDelta::between(Some(&s), None, Duration::from_secs(1)).unwrap();
        assert!(delta.drop_percent.is_none());
        assert_eq!(
            delta.temperature_summary.as_deref(),
            Some("Temperatures: Battery 25.0°C -> -")
        );
    }
}
