//! FFT and MAD scaling across data scales — CPU reference vs software backend.
//!
//! Runs every single-packet scenario through the executor at each scale of the
//! chosen group and prints mean total/transfer/compute time and throughput.
//! For lengths up to 4096 the O(N²) direct DFT of one channel is timed as well,
//! to show where the planned transform pays off.
//! Scales at or above 262144 samples per channel are memory-heavy; the
//! `experimental` group allocates several hundred MB.
//!
//! Usage:
//!   cargo run --release --bin bench_fft_scaling
//!   cargo run --release --bin bench_fft_scaling -- --group unified --iterations 20
//!   cargo run --release --bin bench_fft_scaling -- --batch

use anyhow::Result;
use sensorbench_core::{
    build_fft_input, dft_reference, generate, Algorithm, BackendKind, BatchMode,
    BenchmarkScenario, CancellationToken, DataScale, RunConfig, ScenarioExecutor,
};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_ITERATIONS: usize = 10;
const DFT_MAX_LENGTH: usize = 4096;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let iterations = parse_arg(&args, "--iterations", DEFAULT_ITERATIONS);
    let batch_mode = if args.iter().any(|a| a == "--batch") {
        BatchMode::Batched
    } else {
        BatchMode::Single
    };
    let group = args
        .windows(2)
        .find(|w| w[0] == "--group")
        .map_or("unified", |w| w[1].as_str());
    let Some(scales) = DataScale::group(group) else {
        anyhow::bail!("Unknown scale group: {group}");
    };

    println!("FFT/MAD scaling benchmark");
    println!("=========================");
    println!("Scale group : {group} ({} scales)", scales.len());
    println!("Iterations  : {iterations}");
    println!("Batch mode  : {batch_mode:?}");
    println!();

    let config = RunConfig::default().with_iterations(iterations);
    let cancel = CancellationToken::new();
    let mut exec = ScenarioExecutor::new();

    for algorithm in [Algorithm::Fft, Algorithm::Mad] {
        println!("{algorithm}");
        println!(
            "  {:>8}  {:<20}  {:>10}  {:>10}  {:>10}  {:>14}",
            "length", "scenario", "total ms", "xfer ms", "comp ms", "ops/s"
        );
        println!("  {:-<8}  {:-<20}  {:-<10}  {:-<10}  {:-<10}  {:-<14}", "", "", "", "", "", "");

        for &scale in &scales {
            let mut cpu_mean = None;
            for backend in [BackendKind::CpuReference, BackendKind::Software] {
                let scenario = BenchmarkScenario::new(algorithm, backend, batch_mode);
                let s = exec.run_scenario(scenario, scale, &config, &cancel)?;
                let mean = s.timings.total.mean;
                let speedup = match cpu_mean {
                    None => {
                        cpu_mean = Some(mean);
                        String::new()
                    }
                    Some(cpu) if mean > 0.0 => format!("  {:.2}× vs CPU", cpu / mean),
                    Some(_) => String::new(),
                };
                let note = if s.fell_back() { "  (fallback)" } else { "" };
                println!(
                    "  {:>8}  {:<20}  {:>10.3}  {:>10.3}  {:>10.3}  {:>14.0}{speedup}{note}",
                    scale.length(),
                    s.label,
                    mean,
                    s.timings.transfer.mean,
                    s.timings.compute.mean,
                    s.throughput
                );
            }
            if algorithm == Algorithm::Fft && scale.length() <= DFT_MAX_LENGTH {
                let ms = time_direct_dft(scale.length(), config.seed)?;
                println!("  {:>8}  {:<20}  {:>10.3}", scale.length(), "direct DFT (1 ch)", ms);
            }
        }
        println!();
    }

    Ok(())
}

fn time_direct_dft(length: usize, seed: u64) -> Result<f64> {
    let batch = generate(1, length, seed)?;
    let input = build_fft_input(&batch, length)?;
    let t0 = Instant::now();
    let spectrum = dft_reference(&input.samples[0]);
    let ms = t0.elapsed().as_secs_f64() * 1e3;
    std::hint::black_box(spectrum);
    Ok(ms)
}

fn parse_arg(args: &[String], flag: &str, default: usize) -> usize {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
