//! Trend classification from the EMA20/EMA50 relationship.
//!
//! The classifier is the only mutable object here; every update returns a fresh,
//! immutable `TrendState`. Crossovers (sign flips of ema20 - ema50) are kept in a
//! bounded window: too many inside the lookback means the EMAs are braiding and the
//! market is classified as `RANGE` regardless of which EMA is on top.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::domain::{Candle, Trend, TrendState};
use crate::params::TrendParams;

/// Per-candle trend classifier.
pub trait TrendClassifier: Send {
    fn update(&mut self, candle: &Candle) -> TrendState;
}

#[derive(Debug, Clone)]
pub struct EmaTrendClassifier {
    params: TrendParams,
    last_state: Trend,
    last_change_timestamp: Option<DateTime<Utc>>,
    prev_sign: Option<i8>,
    /// Sequence numbers of crossovers still inside the lookback.
    crossovers: VecDeque<usize>,
    seen: usize,
}

impl EmaTrendClassifier {
    pub fn new(params: TrendParams) -> Self {
        Self {
            params,
            last_state: Trend::Range,
            last_change_timestamp: None,
            prev_sign: None,
            crossovers: VecDeque::new(),
            seen: 0,
        }
    }

    fn snapshot(&self, state: Trend) -> TrendState {
        TrendState {
            state,
            cross_count: self.crossovers.len(),
            last_change_timestamp: self.last_change_timestamp,
        }
    }
}

impl TrendClassifier for EmaTrendClassifier {
    fn update(&mut self, candle: &Candle) -> TrendState {
        let index = self.seen;
        self.seen += 1;

        let lookback = self.params.cross_lookback;
        while let Some(&oldest) = self.crossovers.front() {
            if oldest + lookback <= index {
                self.crossovers.pop_front();
            } else {
                break;
            }
        }

        // Warm-up: no opinion, crossover state untouched
        if !candle.ema20.is_finite() || !candle.ema50.is_finite() {
            self.last_state = Trend::Range;
            return self.snapshot(Trend::Range);
        }

        let diff = candle.ema20 - candle.ema50;
        let sign: i8 = if diff > 0.0 {
            1
        } else if diff < 0.0 {
            -1
        } else {
            0
        };

        if sign != 0 {
            if matches!(self.prev_sign, Some(prev) if prev != sign) {
                self.crossovers.push_back(index);
                self.last_change_timestamp = Some(candle.timestamp);
            }
            self.prev_sign = Some(sign);
        }

        let state = if self.crossovers.len() > self.params.max_cross_count {
            Trend::Range
        } else {
            match sign {
                1 => Trend::Up,
                -1 => Trend::Down,
                _ => Trend::Range,
            }
        };

        if state != self.last_state {
            tracing::trace!(
                from = ?self.last_state,
                to = ?state,
                cross_count = self.crossovers.len(),
                at = %candle.timestamp,
                "trend changed"
            );
        }
        self.last_state = state;
        self.snapshot(state)
    }
}
