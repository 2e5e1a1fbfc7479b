//! TradeExecution: the terminal, immutable record of a simulated trade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SignalId;
use super::signal::Direction;

/// Why a trade closed. Order matches exit-check priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Target,
    TrailingStop,
    StopLoss,
    Expiry,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Target => "TARGET",
            Self::TrailingStop => "TRAILING_STOP",
            Self::StopLoss => "STOP_LOSS",
            Self::Expiry => "EXPIRY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExecution {
    pub signal_id: SignalId,
    pub direction: Direction,

    // ── Entry ──
    pub open_timestamp: DateTime<Utc>,
    pub entry_index: usize,
    pub entry_fill: f64,

    // ── Exit ──
    pub close_timestamp: DateTime<Utc>,
    pub exit_index: usize,
    pub exit_fill: f64,
    pub exit_reason: ExitReason,

    // ── Result ──
    pub position_size: f64,
    pub pnl_r: f64,
    pub slippage_entry_pips: f64,
    pub slippage_exit_pips: f64,
    /// Spread plus commission, in R.
    pub costs_total: f64,
    /// Bars from entry to exit inclusive; a same-bar exit is 1.
    pub holding_duration: usize,
    /// Seconds between the signal bar and the entry fill.
    pub latency_seconds: f64,
}

impl TradeExecution {
    pub fn is_winner(&self) -> bool {
        self.pnl_r > 0.0
    }
}
