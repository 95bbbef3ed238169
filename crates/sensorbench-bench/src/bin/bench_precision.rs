// SPDX-License-Identifier: AGPL-3.0-only

//! FFT and MAD precision sweep — accelerated backend vs CPU reference.
//!
//! For each signal length, runs the candidate backend on `--repeats` freshly
//! seeded batches and compares its weighted magnitudes with the f64 reference.
//! Relative error is only taken for reference bins with |r| ≥ 1e3; all other
//! bins count towards absolute error and RMSE.
//!
//! | Backend  | FFT max-rel tolerance |
//! |----------|-----------------------|
//! | software | 10 %                  |
//! | gpu      | 4 %                   |
//! | npu      | 3 %                   |
//!
//! MAD: mean/std/max within 1.5 % relative, min within 200 absolute.
//! Lengths ≥ 131072 are recorded without a verdict.
//!
//! Usage:
//!   cargo run --release --bin bench_precision
//!   cargo run --release --bin bench_precision -- --repeats 10 --channels 4
//!   cargo run --release --bin bench_precision -- --backend gpu

use anyhow::Result;
use sensorbench_core::validation::{run_precision_sweep, validate_mad, SweepConfig};
use sensorbench_core::{
    generate, select_backend, BackendConfig, BackendKind, DefaultBackendFactory, MemorySink,
    Verdict,
};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_REPEATS: usize = 5;
const DEFAULT_CHANNELS: usize = 2;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let repeats = parse_arg(&args, "--repeats", DEFAULT_REPEATS);
    let channels = parse_arg(&args, "--channels", DEFAULT_CHANNELS);
    let backend: BackendKind = args
        .windows(2)
        .find(|w| w[0] == "--backend")
        .map_or(Ok(BackendKind::Software), |w| w[1].parse())?;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  sensorbench — precision sweep                               ║");
    println!("║  {:<10} vs CPU reference (f64)                            ║", backend.to_string());
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let sweep = SweepConfig::default()
        .with_backend(backend)
        .with_repeats(repeats)
        .with_num_channels(channels);

    let mut sink = MemorySink::default();
    let t0 = Instant::now();
    let stats = match run_precision_sweep(&DefaultBackendFactory, &sweep, &mut sink) {
        Ok(stats) => stats,
        Err(e) if e.is_backend_failure() => {
            println!("{backend} backend unavailable: {e}");
            println!("Re-run with --backend software.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    println!("FFT ({repeats} runs × {channels} channels per length)");
    println!("  {:>8}  {:>12}  {:>12}  {:>12}  {:>12}", "length", "maxRel avg", "maxRel max", "meanRel avg", "rmse avg");
    println!("  {:-<8}  {:-<12}  {:-<12}  {:-<12}  {:-<12}", "", "", "", "", "");
    for s in &stats {
        println!(
            "  {:>8}  {:>11.4}%  {:>11.4}%  {:>11.5}%  {:>12.4}",
            s.signal_length,
            s.max_relative.mean * 100.0,
            s.max_relative.max * 100.0,
            s.avg_mean_relative * 100.0,
            s.avg_rmse
        );
    }
    let fft_failed = sink
        .precision
        .iter()
        .filter(|r| r.verdict == Verdict::Fail)
        .count();
    println!();

    println!("MAD (1 channel per length)");
    println!("  {:>8}  {:>10}  {:>10}  {:>10}  {:>10}  {:>13}", "length", "Δmean", "Δstd", "Δmax", "|Δmin|", "verdict");
    println!("  {:-<8}  {:-<10}  {:-<10}  {:-<10}  {:-<10}  {:-<13}", "", "", "", "", "", "");
    let mut mad_failed = 0usize;
    for &length in &sweep.lengths {
        let batch = generate(1, length, sweep.seed)?;
        let mut candidate = select_backend(&BackendConfig::new(backend, 1, length))?;
        let record = validate_mad(candidate.as_mut(), &batch.channels[0]);
        candidate.close();
        let record = record?;
        if record.verdict.is_failure() {
            mad_failed += 1;
        }
        println!(
            "  {:>8}  {:>9.4}%  {:>9.4}%  {:>9.4}%  {:>10.3}  {:>13?}",
            length,
            record.relative_mean * 100.0,
            record.relative_std * 100.0,
            record.relative_max * 100.0,
            record.absolute_min,
            record.verdict
        );
    }
    println!();

    let elapsed = t0.elapsed();
    println!(
        "FFT comparisons: {} ({} failed)   MAD comparisons: {} ({} failed)   {:.1} s",
        sink.precision.len(),
        fft_failed,
        sweep.lengths.len(),
        mad_failed,
        elapsed.as_secs_f64()
    );

    if fft_failed + mad_failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_arg(args: &[String], flag: &str, default: usize) -> usize {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
