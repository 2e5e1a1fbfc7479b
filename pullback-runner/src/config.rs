//! TOML backtest configuration.
//!
//! ```toml
//! [run]
//! pair = "EURUSD"
//! data_path = "data/eurusd_h1.csv"
//! data_checksum = "9f2c..."   # optional BLAKE3 of data_path
//! initial_equity = 10000.0
//! max_gap_seconds = 259200
//!
//! [risk]
//! risk_per_trade_pct = 0.5
//!
//! [execution.slippage]
//! type = "fixed"
//! entry_pips = 0.2
//! exit_pips = 0.3
//! ```
//!
//! Every strategy section is optional and falls back to its defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pullback_core::params::{
    DataParams, ExecutionParams, IndicatorParams, PullbackParams, RiskParams, SignalParams,
    SlippageParams, StrategyParams, TrendParams,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// The `[run]` table: what to trade and where the data lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSection {
    pub pair: String,
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    /// Expected BLAKE3 hex digest of `data_path`; a mismatch refuses the file.
    #[serde(default)]
    pub data_checksum: Option<String>,
    /// Overrides `[risk].initial_equity`.
    #[serde(default)]
    pub initial_equity: Option<f64>,
    #[serde(default)]
    pub max_gap_seconds: Option<i64>,
    /// Overrides `[signal].version`.
    #[serde(default)]
    pub strategy_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestConfig {
    pub run: RunSection,
    #[serde(default)]
    pub indicators: IndicatorParams,
    #[serde(default)]
    pub trend: TrendParams,
    #[serde(default)]
    pub pullback: PullbackParams,
    #[serde(default)]
    pub signal: SignalParams,
    #[serde(default)]
    pub risk: RiskParams,
    #[serde(default)]
    pub execution: ExecutionParams,
}

fn check(ok: bool, field: &str, reason: impl Into<String>) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        })
    }
}

impl BacktestConfig {
    /// Defaults for every strategy section, trading `pair`.
    pub fn for_pair(pair: impl Into<String>) -> Self {
        Self {
            run: RunSection {
                pair: pair.into(),
                data_path: None,
                data_checksum: None,
                initial_equity: None,
                max_gap_seconds: None,
                strategy_version: None,
            },
            indicators: IndicatorParams::default(),
            trend: TrendParams::default(),
            pullback: PullbackParams::default(),
            signal: SignalParams::default(),
            risk: RiskParams::default(),
            execution: ExecutionParams::default(),
        }
    }

    /// Parse and validate.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Flatten into the parameter set the strategy core consumes, applying `[run]` overrides.
    pub fn to_strategy_params(&self) -> StrategyParams {
        let mut risk = self.risk.clone();
        if let Some(equity) = self.run.initial_equity {
            risk.initial_equity = equity;
        }
        let mut signal = self.signal.clone();
        if let Some(version) = &self.run.strategy_version {
            signal.version = version.clone();
        }
        StrategyParams {
            indicators: self.indicators.clone(),
            trend: self.trend.clone(),
            pullback: self.pullback.clone(),
            signal,
            risk,
            execution: self.execution.clone(),
            data: DataParams {
                max_gap_seconds: self.run.max_gap_seconds,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check(!self.run.pair.trim().is_empty(), "run.pair", "must not be empty")?;
        if let Some(gap) = self.run.max_gap_seconds {
            check(gap > 0, "run.max_gap_seconds", "must be positive")?;
        }
        if let Some(equity) = self.run.initial_equity {
            check(equity > 0.0, "run.initial_equity", "must be positive")?;
        }
        if let Some(checksum) = &self.run.data_checksum {
            check(
                checksum.len() == 64 && checksum.chars().all(|c| c.is_ascii_hexdigit()),
                "run.data_checksum",
                "must be a 64-character hex BLAKE3 digest",
            )?;
        }

        // ── Indicators ──
        let ind = &self.indicators;
        for (field, period) in [
            ("indicators.ema_fast_period", ind.ema_fast_period),
            ("indicators.ema_slow_period", ind.ema_slow_period),
            ("indicators.atr_period", ind.atr_period),
            ("indicators.rsi_period", ind.rsi_period),
        ] {
            check(period >= 1, field, "period must be >= 1")?;
        }
        check(
            ind.ema_fast_period < ind.ema_slow_period,
            "indicators.ema_fast_period",
            format!(
                "fast period {} must be shorter than slow period {}",
                ind.ema_fast_period, ind.ema_slow_period
            ),
        )?;
        if let Some(window) = ind.stoch_rsi_window {
            check(window >= 1, "indicators.stoch_rsi_window", "window must be >= 1")?;
        }

        // ── Strategy stages ──
        check(self.trend.cross_lookback >= 1, "trend.cross_lookback", "must be >= 1")?;
        let pb = &self.pullback;
        check(pb.pullback_max_age >= 1, "pullback.pullback_max_age", "must be >= 1")?;
        check(pb.zone_buffer_atr >= 0.0, "pullback.zone_buffer_atr", "must be >= 0")?;
        check(
            0.0 <= pb.rsi_oversold && pb.rsi_oversold < pb.rsi_overbought && pb.rsi_overbought <= 100.0,
            "pullback.rsi_oversold",
            "need 0 <= rsi_oversold < rsi_overbought <= 100",
        )?;
        check(
            0.0 <= pb.stoch_low && pb.stoch_low < pb.stoch_high && pb.stoch_high <= 1.0,
            "pullback.stoch_low",
            "need 0 <= stoch_low < stoch_high <= 1",
        )?;
        check(
            self.signal.min_candles_reversal >= 1,
            "signal.min_candles_reversal",
            "must be >= 1",
        )?;
        check(
            self.signal.stop_loss_atr_multiplier > 0.0,
            "signal.stop_loss_atr_multiplier",
            "must be positive",
        )?;
        check(!self.signal.version.is_empty(), "signal.version", "must not be empty")?;

        // ── Risk ──
        let risk = &self.risk;
        check(risk.initial_equity > 0.0, "risk.initial_equity", "must be positive")?;
        check(
            risk.risk_per_trade_pct > 0.0 && risk.risk_per_trade_pct <= 100.0,
            "risk.risk_per_trade_pct",
            "must be in (0, 100]",
        )?;
        check(risk.pip_size > 0.0, "risk.pip_size", "must be positive")?;
        check(risk.pip_value > 0.0, "risk.pip_value", "must be positive")?;
        check(risk.take_profit_r > 0.0, "risk.take_profit_r", "must be positive")?;
        check(risk.max_drawdown_r > 0.0, "risk.max_drawdown_r", "must be positive")?;

        // ── Execution ──
        let exec = &self.execution;
        check(exec.spread_pips >= 0.0, "execution.spread_pips", "must be >= 0")?;
        check(
            exec.commission_per_lot >= 0.0,
            "execution.commission_per_lot",
            "must be >= 0",
        )?;
        check(
            exec.max_holding_candles >= 1,
            "execution.max_holding_candles",
            "must be >= 1",
        )?;
        match exec.slippage {
            SlippageParams::Fixed {
                entry_pips,
                exit_pips,
            } => check(
                entry_pips >= 0.0 && exit_pips >= 0.0,
                "execution.slippage",
                "pips must be >= 0",
            )?,
            SlippageParams::AtrFraction { fraction } => {
                check(fraction >= 0.0, "execution.slippage.fraction", "must be >= 0")?
            }
            SlippageParams::None => {}
        }
        if let Some(trailing) = &exec.trailing {
            check(
                trailing.activation_r >= 0.0,
                "execution.trailing.activation_r",
                "must be >= 0",
            )?;
            check(
                trailing.atr_multiplier > 0.0,
                "execution.trailing.atr_multiplier",
                "must be positive",
            )?;
        }
        Ok(())
    }
}
