//! Per-candle snapshots emitted by the trend classifier and pullback detector.
//!
//! Snapshots are superseded, never mutated: each update produces a fresh value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::Direction;

/// Market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Up,
    Down,
    Range,
}

impl Trend {
    /// Trade direction a pullback in this regime would take.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Up => Some(Direction::Long),
            Self::Down => Some(Direction::Short),
            Self::Range => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendState {
    pub state: Trend,
    /// EMA20/EMA50 sign flips inside the lookback window.
    pub cross_count: usize,
    pub last_change_timestamp: Option<DateTime<Utc>>,
}

impl TrendState {
    pub fn range() -> Self {
        Self {
            state: Trend::Range,
            cross_count: 0,
            last_change_timestamp: None,
        }
    }
}

/// Active pullback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullbackState {
    pub active: bool,
    pub direction: Direction,
    pub start_timestamp: DateTime<Utc>,
    /// Candle identifiers (timestamps) in the window, oldest first.
    pub candles: Vec<DateTime<Utc>>,
    pub oscillator_extreme_flag: bool,
}

impl PullbackState {
    /// Number of candles observed since the window opened, including the opening one.
    pub fn age(&self) -> usize {
        self.candles.len()
    }
}
