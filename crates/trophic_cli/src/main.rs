//! Command-line driver for Trophic q-sweeps.
//!
//! Thin glue around `trophic_core`: parses flags, validates the sweep
//! configuration eagerly, runs the requested sweep, and writes the CSV
//! datasets consumed by the plotting tools.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use trophic_core::params::EcologicalInputs;
use trophic_core::sweep::{
    default_worker_count, run_chain_sweep, run_web_sweep, SweepConfig,
};

#[derive(Parser, Debug)]
#[command(name = "trophic")]
#[command(about = "Bifurcation and biodiversity q-sweeps of food-chain and food-web models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep the 3-species chain and write per-species bifurcation tables.
    Chain(ChainArgs),
    /// Sweep the 10-species web and write the diversity table.
    Web(WebArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Lower end of the q sweep.
    #[arg(long, default_value = "0.0")]
    q_min: f64,

    /// Upper end of the q sweep (inclusive).
    #[arg(long, default_value = "0.3")]
    q_max: f64,

    /// Spacing between sweep points.
    #[arg(long, default_value = "0.01")]
    q_step: f64,

    /// Nominal step size h.
    #[arg(long, default_value = "0.5")]
    steplength: f64,

    /// Trailing fraction of simulated time analyzed, in (0, 1].
    #[arg(long, default_value = "0.05")]
    analyze_ts: f64,

    /// Worker (chunk) count; defaults to 3/4 of available parallelism.
    #[arg(long)]
    workers: Option<usize>,

    /// Master seed for shuffling, initial conditions, and body-mass draws.
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Destination directory for the CSV tables.
    #[arg(long, default_value = "out")]
    output: PathBuf,

    /// Half-saturation density N0 of the functional response.
    #[arg(long, default_value = "0.5")]
    half_saturation: f64,

    /// Allometric constant a of the metabolic-rate law.
    #[arg(long, default_value = "0.2227")]
    metabolic_constant: f64,

    /// Allometric exponent b.
    #[arg(long, default_value = "-0.25", allow_hyphen_values = true)]
    metabolic_exponent: f64,

    /// Assimilation efficiency e.
    #[arg(long, default_value = "0.85")]
    assimilation: f64,

    /// Max feeding rate relative to the metabolic rate (y).
    #[arg(long, default_value = "8.0")]
    feeding_ratio: f64,
}

#[derive(Args, Debug)]
struct ChainArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Integration horizon in nominal steps.
    #[arg(long, default_value = "10000")]
    ts_length: usize,

    /// Deduplicate extrema to unique values.
    #[arg(long)]
    unique_out: bool,

    /// Cap on retained extrema per species per q-value (0 = unbounded).
    #[arg(long, default_value = "200")]
    max_out: usize,

    /// Top:basal per-trophic-level body-mass ratio R.
    #[arg(long, default_value = "100.0")]
    mass_ratio: f64,
}

#[derive(Args, Debug)]
struct WebArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of chained integration segments.
    #[arg(long, default_value = "10")]
    ts_runs: usize,

    /// Nominal steps per segment.
    #[arg(long, default_value = "1000")]
    ts_run_length: usize,

    /// Lower bound of the body-mass-ratio draw.
    #[arg(long, default_value = "10.0")]
    r_min: f64,

    /// Upper bound of the body-mass-ratio draw.
    #[arg(long, default_value = "100.0")]
    r_max: f64,

    /// Regime label appended to the diversity filename.
    #[arg(long)]
    label: Option<String>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Chain(args) => run_chain(args),
        Command::Web(args) => run_web(args),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Builds the ascending sweep points [q_min, q_min + q_step, ..], never
/// exceeding q_max beyond round-off; an on-grid q_max is always included.
fn build_qrange(q_min: f64, q_max: f64, q_step: f64) -> Result<Vec<f64>> {
    if !(q_step > 0.0 && q_step.is_finite()) {
        bail!("q_step must be positive and finite, got {q_step}");
    }
    if !(q_min.is_finite() && q_max.is_finite() && q_min <= q_max) {
        bail!("q range requires finite q_min <= q_max, got [{q_min}, {q_max}]");
    }

    let span = (q_max - q_min) / q_step;
    let count = (span * (1.0 + 1e-12) + 1e-12).floor() as usize + 1;
    Ok((0..count).map(|i| q_min + i as f64 * q_step).collect())
}

fn base_config(common: &CommonArgs) -> Result<SweepConfig> {
    Ok(SweepConfig {
        qrange: build_qrange(common.q_min, common.q_max, common.q_step)?,
        steplength: common.steplength,
        analyze_ts: common.analyze_ts,
        workers: common.workers.unwrap_or_else(default_worker_count),
        seed: common.seed,
        inputs: EcologicalInputs {
            metabolic_constant: common.metabolic_constant,
            metabolic_exponent: common.metabolic_exponent,
            assimilation: common.assimilation,
            feeding_ratio: common.feeding_ratio,
            half_saturation: common.half_saturation,
        },
        ..SweepConfig::default()
    })
}

fn run_chain(args: ChainArgs) -> Result<()> {
    let config = SweepConfig {
        ts_length: args.ts_length,
        unique_out: args.unique_out,
        max_out: args.max_out,
        mass_ratio: args.mass_ratio,
        ..base_config(&args.common)?
    };
    config.validate()?;

    info!(
        points = config.qrange.len(),
        workers = config.workers,
        "starting chain sweep"
    );
    let output = run_chain_sweep(&config)?;
    let paths = output.write(&args.common.output)?;
    for (path, table) in paths.iter().zip(&output.species) {
        info!(rows = table.len(), path = %path.display(), "wrote bifurcation table");
    }
    Ok(())
}

fn run_web(args: WebArgs) -> Result<()> {
    let config = SweepConfig {
        ts_runs: args.ts_runs,
        ts_run_length: args.ts_run_length,
        mass_ratio_range: (args.r_min, args.r_max),
        ..base_config(&args.common)?
    };
    config.validate()?;

    info!(
        points = config.qrange.len(),
        workers = config.workers,
        "starting web sweep"
    );
    let output = run_web_sweep(&config)?;
    let path = output.write(&args.common.output, args.label.as_deref())?;
    info!(rows = output.diversity.len(), path = %path.display(), "wrote diversity table");
    Ok(())
}
