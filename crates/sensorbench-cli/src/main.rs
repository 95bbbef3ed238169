//! `sensorbench` — command-line front end for the scenario executor.
//!
//! ```text
//! USAGE:
//!   sensorbench scales [group]              List data scales (or one group)
//!   sensorbench scenarios                   List scenario ids
//!   sensorbench run <scenario> <length>     Run one scenario at one scale
//!   sensorbench suite [--config file.json]  Run scenarios × scales
//!   sensorbench validate [--backend sw]     FFT/MAD precision sweep
//! ```
//!
//! Records are written to stdout as JSON lines; human-readable summaries and
//! progress go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sensorbench_core::validation::{run_precision_sweep, validate_mad, SweepConfig};
use sensorbench_core::{
    generate, BackendConfig, BackendKind, BenchmarkScenario, CancellationToken, DataScale,
    DefaultBackendFactory, FftNormalization, MadPrecision, PrecisionRecord, ResultSink,
    RunConfig, ScenarioExecutor, ScenarioRecord, SuiteConfig, SuiteEntry,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sensorbench", about = "FFT/MAD backend benchmark harness", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List data scales.
    Scales {
        /// Group name: default, extreme, focused, experimental, unified, all.
        group: Option<String>,
    },
    /// List scenario ids in suite order.
    Scenarios,
    /// Run one scenario at one data scale.
    Run {
        /// Scenario id (e.g. fft_software_batch).
        scenario: String,
        /// Samples per channel; must name a known scale.
        #[arg(default_value_t = 4096)]
        length: usize,
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Run a suite of scenarios across scales.
    Suite {
        /// JSON suite configuration; overrides the defaults.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Scale group to run when no config is given.
        #[arg(long, default_value = "default")]
        scales: String,
        /// Iterations per scenario.
        #[arg(long)]
        iterations: Option<usize>,
    },
    /// Compare an accelerated backend against the CPU reference.
    Validate {
        /// Candidate backend (software, gpu, npu).
        #[arg(long, default_value = "software")]
        backend: String,
        /// Signal lengths; defaults to 512..65536.
        #[arg(long, value_delimiter = ',')]
        lengths: Vec<usize>,
        /// Runs per length.
        #[arg(long, default_value_t = 5)]
        repeats: usize,
        /// Also compare MAD at each length.
        #[arg(long)]
        mad: bool,
    },
}

#[derive(clap::Args)]
struct RunOpts {
    /// Iterations to time.
    #[arg(long, default_value_t = sensorbench_core::DEFAULT_ITERATIONS)]
    iterations: usize,
    /// Packets per iteration in batched mode.
    #[arg(long, default_value_t = sensorbench_core::DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// Generator seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Channels per generated batch.
    #[arg(long, default_value_t = sensorbench_core::FFT_NUM_CHANNELS)]
    channels: usize,
    /// FFT output normalization.
    #[arg(long, value_enum, default_value_t = Normalization::None)]
    normalization: Normalization,
}

#[derive(Clone, Copy, ValueEnum)]
enum Normalization {
    None,
    Length,
    SqrtLength,
}

impl From<Normalization> for FftNormalization {
    fn from(n: Normalization) -> Self {
        match n {
            Normalization::None => Self::None,
            Normalization::Length => Self::BySignalLength,
            Normalization::SqrtLength => Self::BySqrtSignalLength,
        }
    }
}

/// Writes every record as one tagged JSON object per line and counts
/// precision records that failed their tolerance.
struct JsonLinesSink<W: Write> {
    out: W,
    failed: usize,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Scenario(&'a ScenarioRecord),
    FftPrecision(&'a PrecisionRecord),
    MadPrecision(&'a MadPrecision),
}

impl<W: Write> JsonLinesSink<W> {
    fn new(out: W) -> Self {
        Self { out, failed: 0 }
    }

    fn ensure_all_passed(&self) -> Result<()> {
        if self.failed > 0 {
            bail!("{} precision comparison(s) outside tolerance", self.failed);
        }
        Ok(())
    }

    fn emit(&mut self, line: &Line<'_>) {
        let written = serde_json::to_writer(&mut self.out, line)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.out));
        if let Err(e) = written {
            tracing::warn!("failed to write record: {e}");
        }
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn record_scenario(&mut self, record: &ScenarioRecord) {
        self.emit(&Line::Scenario(record));
    }

    fn record_precision(&mut self, record: &PrecisionRecord) {
        if record.verdict.is_failure() {
            self.failed += 1;
        }
        self.emit(&Line::FftPrecision(record));
    }

    fn record_mad_precision(&mut self, record: &MadPrecision) {
        if record.verdict.is_failure() {
            self.failed += 1;
        }
        self.emit(&Line::MadPrecision(record));
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Scales { group } => cmd_scales(group.as_deref())?,
        Cmd::Scenarios => cmd_scenarios(),
        Cmd::Run {
            scenario,
            length,
            opts,
        } => cmd_run(&scenario, length, &opts)?,
        Cmd::Suite {
            config,
            scales,
            iterations,
        } => cmd_suite(config.as_deref(), &scales, iterations)?,
        Cmd::Validate {
            backend,
            lengths,
            repeats,
            mad,
        } => cmd_validate(&backend, lengths, repeats, mad)?,
    }

    Ok(())
}

fn cmd_scales(group: Option<&str>) -> Result<()> {
    let scales = match group {
        Some(name) => DataScale::group(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown scale group: {name}"))?,
        None => DataScale::ALL.to_vec(),
    };
    for scale in scales {
        let heavy = if scale.is_memory_heavy() { "  (memory-heavy)" } else { "" };
        println!("{:<12} {:>8}{heavy}", format!("{scale:?}"), scale.length());
    }
    Ok(())
}

fn cmd_scenarios() {
    for scenario in BenchmarkScenario::suite_order() {
        println!(
            "{:<22} {:<20} {}",
            scenario.id(),
            scenario.label(sensorbench_core::DEFAULT_BATCH_SIZE),
            scenario.processing_mode()
        );
    }
}

fn cmd_run(id: &str, length: usize, opts: &RunOpts) -> Result<()> {
    let scenario = BenchmarkScenario::from_id(id)
        .ok_or_else(|| anyhow::anyhow!("Unknown scenario: {id} (see `sensorbench scenarios`)"))?;
    let scale = DataScale::from_length(length)
        .ok_or_else(|| anyhow::anyhow!("No data scale has length {length}"))?;

    let config = RunConfig::default()
        .with_iterations(opts.iterations)
        .with_batch_size(opts.batch_size)
        .with_seed(opts.seed)
        .with_num_channels(opts.channels)
        .with_normalization(opts.normalization.into());

    let mut exec = ScenarioExecutor::new();
    let summary = exec.run_scenario(scenario, scale, &config, &CancellationToken::new())?;

    eprintln!("{}", summary.summary_text());
    let mut sink = JsonLinesSink::new(std::io::stdout().lock());
    sink.record_scenario(&ScenarioRecord::from_summary(&summary));
    Ok(())
}

fn cmd_suite(config: Option<&std::path::Path>, scales: &str, iterations: Option<usize>) -> Result<()> {
    let mut suite = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<SuiteConfig>(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => SuiteConfig::default().with_scales(
            DataScale::group(scales)
                .ok_or_else(|| anyhow::anyhow!("Unknown scale group: {scales}"))?,
        ),
    };
    if let Some(n) = iterations {
        suite = suite.with_iterations(n);
    }

    let mut exec = ScenarioExecutor::new();
    let mut sink = JsonLinesSink::new(std::io::stdout().lock());
    let report = exec.run_suite(&suite, &CancellationToken::new(), &mut sink, |p| {
        eprintln!("[{}/{}] {} @ {}", p.current, p.total, p.label, p.scale);
    });

    for entry in &report.entries {
        match entry {
            SuiteEntry::Ran(summary) => eprintln!("{}\n", summary.summary_text()),
            SuiteEntry::Failed {
                scenario_id,
                scale,
                reason,
            } => eprintln!("{scenario_id} @ {scale}: FAILED ({reason})\n"),
        }
    }
    eprintln!(
        "Suite: {}/{} runs, {} failed{}",
        report.entries.len(),
        report.total,
        report.failures(),
        if report.cancelled { ", cancelled" } else { "" }
    );

    if report.failures() > 0 {
        bail!("{} scenario run(s) failed", report.failures());
    }
    Ok(())
}

fn cmd_validate(backend: &str, lengths: Vec<usize>, repeats: usize, mad: bool) -> Result<()> {
    let kind: BackendKind = backend.parse()?;
    let mut sweep = SweepConfig::default().with_backend(kind).with_repeats(repeats);
    if !lengths.is_empty() {
        sweep = sweep.with_lengths(lengths);
    }

    let mut sink = JsonLinesSink::new(std::io::stdout().lock());
    let stats = run_precision_sweep(&DefaultBackendFactory, &sweep, &mut sink)?;

    eprintln!("{:>8}  {:>12}  {:>12}  {:>12}", "length", "maxRel avg", "maxRel std", "rmse avg");
    for s in &stats {
        eprintln!(
            "{:>8}  {:>11.4}%  {:>11.4}%  {:>12.6}",
            s.signal_length,
            s.max_relative.mean * 100.0,
            s.max_relative.std_dev * 100.0,
            s.avg_rmse
        );
    }

    if mad {
        for &length in &sweep.lengths {
            let batch = generate(1, length, sweep.seed)?;
            let config = BackendConfig::new(kind, 1, length);
            let mut backend = sensorbench_core::select_backend(&config)?;
            let record = validate_mad(backend.as_mut(), &batch.channels[0]);
            backend.close();
            let record = record?;
            eprintln!(
                "MAD {length:>8}: mean {:.3e} std {:.3e} max {:.3e} |min| {:.3} -> {:?}",
                record.relative_mean,
                record.relative_std,
                record.relative_max,
                record.absolute_min,
                record.verdict
            );
            sink.record_mad_precision(&record);
        }
    }

    sink.ensure_all_passed()
}
