//! Resolved strategy parameters.
//!
//! The core never parses configuration files; it receives these structs already
//! resolved and validated. Every field has a default so partial configs deserialize.
//! The whole tree feeds the reproducibility hash, so any change here changes run identity.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub atr_period: usize,
    pub rsi_period: usize,
    /// Window for StochRSI; `None` leaves the column unset.
    pub stoch_rsi_window: Option<usize>,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_fast_period: 20,
            ema_slow_period: 50,
            atr_period: 14,
            rsi_period: 14,
            stoch_rsi_window: Some(14),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendParams {
    /// Candles a crossover stays in the activity window.
    pub cross_lookback: usize,
    /// Crossovers inside the window above which the market counts as ranging.
    pub max_cross_count: usize,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            cross_lookback: 50,
            max_cross_count: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullbackParams {
    pub pullback_max_age: usize,
    /// Extra room around EMA20, in ATRs, that still counts as re-entering the zone.
    pub zone_buffer_atr: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stoch_low: f64,
    pub stoch_high: f64,
}

impl Default for PullbackParams {
    fn default() -> Self {
        Self {
            pullback_max_age: 10,
            zone_buffer_atr: 0.25,
            rsi_oversold: 40.0,
            rsi_overbought: 60.0,
            stoch_low: 0.2,
            stoch_high: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    pub min_candles_reversal: usize,
    pub stop_loss_atr_multiplier: f64,
    pub version: String,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            min_candles_reversal: 1,
            stop_loss_atr_multiplier: 1.5,
            version: "1.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParams {
    pub initial_equity: f64,
    /// Percent of equity risked per trade (0.25 = 0.25%).
    pub risk_per_trade_pct: f64,
    pub pip_size: f64,
    /// Account-currency value of one pip for one standard lot.
    pub pip_value: f64,
    pub take_profit_r: f64,
    pub max_drawdown_r: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            risk_per_trade_pct: 0.25,
            pip_size: 0.0001,
            pip_value: 10.0,
            take_profit_r: 2.0,
            max_drawdown_r: 10.0,
        }
    }
}

/// Slippage model selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlippageParams {
    /// Constant slippage in pips.
    Fixed { entry_pips: f64, exit_pips: f64 },
    /// Slippage as a fraction of the bar's ATR.
    AtrFraction { fraction: f64 },
    None,
}

impl Default for SlippageParams {
    fn default() -> Self {
        Self::Fixed {
            entry_pips: 0.2,
            exit_pips: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingParams {
    /// Favorable excursion, in R, before the trailing stop arms.
    pub activation_r: f64,
    pub atr_multiplier: f64,
}

impl Default for TrailingParams {
    fn default() -> Self {
        Self {
            activation_r: 1.0,
            atr_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionParams {
    pub slippage: SlippageParams,
    pub spread_pips: f64,
    /// Round-trip commission per standard lot, in account currency.
    pub commission_per_lot: f64,
    pub max_holding_candles: usize,
    pub trailing: Option<TrailingParams>,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            slippage: SlippageParams::default(),
            spread_pips: 1.0,
            commission_per_lot: 7.0,
            max_holding_candles: 48,
            trailing: Some(TrailingParams::default()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataParams {
    /// Largest tolerated gap between consecutive candles; `None` disables the check.
    pub max_gap_seconds: Option<i64>,
}

/// Every parameter a strategy run depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub indicators: IndicatorParams,
    pub trend: TrendParams,
    pub pullback: PullbackParams,
    pub signal: SignalParams,
    pub risk: RiskParams,
    pub execution: ExecutionParams,
    pub data: DataParams,
}
