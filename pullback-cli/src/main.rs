//! Pullback CLI: run, sweep and verify commands.
//!
//! Commands:
//! - `run` executes one backtest from a TOML config over CSV or synthetic data
//! - `sweep` runs a parameter grid, in parallel unless `--sequential`
//! - `verify` recomputes a saved artifact's reproducibility hash
//!
//! Logging goes to stderr via `RUST_LOG` (default `info`); `PULLBACK_PROFILE=1`
//! adds phase timings.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pullback_core::fidelity::FidelityTolerances;
use pullback_runner::runner::load_data;
use pullback_runner::{
    check_parallel_fidelity, profiling, run_loaded, run_sweep, BacktestConfig, DataSource,
    ParamGrid, RunArtifact,
};

#[derive(Parser)]
#[command(name = "pullback", about = "Pullback: deterministic FX trend-pullback backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where a command reads its candles from. Defaults to `run.data_path`.
#[derive(Args)]
struct DataArgs {
    /// CSV file overriding `run.data_path`.
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Generate this many synthetic hourly bars instead of reading a file.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for `--synthetic`.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl DataArgs {
    fn source(&self) -> DataSource<'_> {
        match (&self.data, self.synthetic) {
            (Some(path), _) => DataSource::Csv(path),
            (None, Some(bars)) => DataSource::Synthetic { bars, seed: self.seed },
            (None, None) => DataSource::Config,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one backtest.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Write the run artifact (JSON) here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run a parameter grid over one dataset.
    Sweep {
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Stop-loss ATR multipliers, comma separated.
        #[arg(long, value_delimiter = ',')]
        stop_multipliers: Vec<f64>,

        /// Risk per trade in percent, comma separated.
        #[arg(long, value_delimiter = ',')]
        risk_pcts: Vec<f64>,

        /// Take-profit distances in R, comma separated.
        #[arg(long, value_delimiter = ',')]
        take_profits: Vec<f64>,

        /// Run grid points one after another.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Also run the other path and compare executions.
        #[arg(long, default_value_t = false)]
        check_fidelity: bool,
    },
    /// Re-verify a saved artifact.
    Verify {
        #[arg(long)]
        artifact: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    profiling::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config, data, out } => run_cmd(&config, &data, out.as_deref()),
        Commands::Sweep {
            config,
            data,
            stop_multipliers,
            risk_pcts,
            take_profits,
            sequential,
            check_fidelity,
        } => {
            let grid = ParamGrid {
                stop_loss_atr_multipliers: stop_multipliers,
                risk_per_trade_pcts: risk_pcts,
                take_profit_rs: take_profits,
            };
            sweep_cmd(&config, &data, &grid, !sequential, check_fidelity)
        }
        Commands::Verify { artifact } => verify_cmd(&artifact),
    }
}

fn load_config(path: &Path) -> Result<BacktestConfig> {
    BacktestConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))
}

fn run_cmd(config_path: &Path, data: &DataArgs, out: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let loaded = load_data(&config, data.source()).context("loading candles")?;
    let artifact = run_loaded(&config, &loaded).context("running backtest")?;
    print_summary(&artifact);

    if let Some(path) = out {
        artifact
            .save(path)
            .with_context(|| format!("writing artifact {}", path.display()))?;
        tracing::info!(path = %path.display(), "artifact saved");
    }
    Ok(())
}

fn print_summary(artifact: &RunArtifact) {
    let s = &artifact.output.summary;
    println!("Pair:            {}", artifact.pair());
    println!("Signals:         {}", artifact.output.signal_count);
    println!("Trades:          {} ({} wins, {} losses)", s.trade_count, s.wins, s.losses);
    println!("Win rate:        {:.1}%", s.win_rate * 100.0);
    println!("Total R:         {:+.2}", s.total_r);
    println!("Expectancy:      {:+.3}R", s.expectancy);
    println!("Max drawdown:    {:.2}R", s.max_drawdown_r);
    println!("Sharpe (per tr): {:.3}", s.sharpe_estimate);
    println!("Costs:           {:.2}R", s.costs_total_r);
    for (reason, count) in &s.exit_reasons {
        println!("  {reason:<14} {count}");
    }
    println!("Hash:            {}", artifact.output.reproducibility_hash);
}

fn sweep_cmd(
    config_path: &Path,
    data: &DataArgs,
    grid: &ParamGrid,
    parallel: bool,
    check_fidelity: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let loaded = load_data(&config, data.source()).context("loading candles")?;
    let base = config.to_strategy_params();
    let pair = config.run.pair.as_str();

    let runs = run_sweep(&loaded.candles, &loaded.manifest, &base, pair, grid, parallel)
        .context("invalid sweep grid")?;
    println!(
        "{:>4}  {:>6}  {:>6}  {:>5}  {:>6}  {:>9}  {:>8}  hash",
        "#", "stop", "risk%", "tp", "trades", "total_r", "max_dd"
    );
    let mut failed = 0;
    for run in &runs {
        let p = &run.params;
        match &run.result {
            Ok(out) => println!(
                "{:>4}  {:>6.2}  {:>6.2}  {:>5.2}  {:>6}  {:>+9.2}  {:>8.2}  {}",
                run.index,
                p.signal.stop_loss_atr_multiplier,
                p.risk.risk_per_trade_pct,
                p.risk.take_profit_r,
                out.summary.trade_count,
                out.summary.total_r,
                out.summary.max_drawdown_r,
                out.reproducibility_hash.get(..16).unwrap_or(&out.reproducibility_hash),
            ),
            Err(err) => {
                failed += 1;
                println!("{:>4}  failed: {err}", run.index);
            }
        }
    }

    if check_fidelity {
        let fidelity = check_parallel_fidelity(
            &loaded.candles,
            &loaded.manifest,
            &base,
            pair,
            grid,
            &FidelityTolerances::default(),
        )
        .context("invalid sweep grid")?;
        if !fidelity.is_clean() {
            bail!(
                "parallel sweep diverged: {} hash mismatches, {} error mismatches",
                fidelity.hash_mismatches.len(),
                fidelity.error_mismatches.len()
            );
        }
        println!("Fidelity: parallel and sequential paths agree");
    }

    if failed > 0 {
        bail!("{failed} of {} sweep runs failed", runs.len());
    }
    Ok(())
}

fn verify_cmd(path: &Path) -> Result<()> {
    let artifact =
        RunArtifact::load(path).with_context(|| format!("reading artifact {}", path.display()))?;
    if !artifact.verify().context("recomputing hash")? {
        bail!(
            "hash mismatch: {} does not reproduce {}",
            path.display(),
            artifact.output.reproducibility_hash
        );
    }
    println!("OK {} {}", artifact.pair(), artifact.output.reproducibility_hash);
    Ok(())
}
