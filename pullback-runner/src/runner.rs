//! Single-run orchestration: config in, verified artifact out.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use pullback_core::{PipelineError, RunContext, StrategyPipeline};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_candles, load_candles_checked, LoadError, LoadedData};
use crate::profiling::{self, ProfileHooks, ProfileScope};
use crate::result::{ArtifactError, RunArtifact};
use crate::synthetic::synthetic_dataset;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("run failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("no data source: set run.data_path, pass a CSV, or request synthetic bars")]
    NoDataSource,
}

/// Where the candles come from.
#[derive(Debug, Clone, Copy)]
pub enum DataSource<'a> {
    /// `run.data_path` from the config, checked against `run.data_checksum` when set.
    Config,
    Csv(&'a Path),
    Synthetic { bars: usize, seed: u64 },
}

/// Load or generate the candles for `config`.
pub fn load_data(config: &BacktestConfig, source: DataSource<'_>) -> Result<LoadedData, RunError> {
    let _scope = ProfileScope::new("load_data");
    let pair = config.run.pair.as_str();
    let data = match source {
        DataSource::Csv(path) => load_candles(path, pair, &config.indicators)?,
        DataSource::Config => {
            let path = config.run.data_path.as_deref().ok_or(RunError::NoDataSource)?;
            load_candles_checked(path, pair, &config.indicators, config.run.data_checksum.as_deref())?
        }
        DataSource::Synthetic { bars, seed } => synthetic_dataset(bars, seed, pair, &config.indicators)?,
    };
    Ok(data)
}

/// Run one backtest over already-loaded data.
pub fn run_loaded(config: &BacktestConfig, data: &LoadedData) -> Result<RunArtifact, RunError> {
    let params = config.to_strategy_params();
    let mut ctx = RunContext::new(config.run.pair.clone()).with_manifest(data.manifest.clone());
    let hooks = profiling::is_enabled().then(|| Arc::new(ProfileHooks::new()));
    if let Some(hooks) = &hooks {
        ctx = ctx.with_hooks(hooks.clone());
    }
    let output = StrategyPipeline::new(params.clone(), ctx).run(&data.candles)?;
    if let Some(hooks) = hooks {
        let timings = hooks.timings();
        let total: Duration = timings.iter().map(|(_, d)| *d).sum();
        tracing::info!(
            target: "profile",
            phases = timings.len(),
            total_ms = total.as_secs_f64() * 1000.0,
            "run phases"
        );
    }
    Ok(RunArtifact::new(params, data.manifest.clone(), output))
}

pub fn run_backtest(config: &BacktestConfig, source: DataSource<'_>) -> Result<RunArtifact, RunError> {
    config.validate()?;
    let data = load_data(config, source)?;
    run_loaded(config, &data)
}
