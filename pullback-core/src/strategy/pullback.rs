//! Pullback detection inside an established trend.
//!
//! A window opens when price re-enters the EMA20 zone in the trend's direction. Every
//! later candle is appended; an oscillator extreme (RSI or StochRSI beyond its band)
//! seen at any point sets `oscillator_extreme_flag`. The window expires once it is older
//! than `pullback_max_age` candles, and is dropped at once when the trend turns to
//! `RANGE` or flips against it.

use crate::domain::{Candle, Direction, PullbackState, TrendState};
use crate::params::PullbackParams;

/// Per-candle pullback tracker.
pub trait PullbackDetector: Send {
    fn update(&mut self, candle: &Candle, trend: &TrendState) -> Option<PullbackState>;

    /// Drop the active window, e.g. once a signal has consumed it.
    fn reset(&mut self);
}

#[derive(Debug, Clone)]
pub struct ZonePullbackDetector {
    params: PullbackParams,
    window: Option<PullbackState>,
}

impl ZonePullbackDetector {
    pub fn new(params: PullbackParams) -> Self {
        Self {
            params,
            window: None,
        }
    }

    pub fn active(&self) -> Option<&PullbackState> {
        self.window.as_ref()
    }

    /// Price touches EMA20 (plus buffer) from the trend side.
    fn in_zone(&self, candle: &Candle, direction: Direction) -> bool {
        let buffer = self.params.zone_buffer_atr * candle.atr;
        match direction {
            Direction::Long => candle.low <= candle.ema20 + buffer,
            Direction::Short => candle.high >= candle.ema20 - buffer,
        }
    }

    fn is_extreme(&self, candle: &Candle, direction: Direction) -> bool {
        let p = &self.params;
        match direction {
            Direction::Long => {
                candle.rsi < p.rsi_oversold || candle.stoch_rsi.is_some_and(|s| s < p.stoch_low)
            }
            Direction::Short => {
                candle.rsi > p.rsi_overbought
                    || candle.stoch_rsi.is_some_and(|s| s > p.stoch_high)
            }
        }
    }
}

impl PullbackDetector for ZonePullbackDetector {
    fn update(&mut self, candle: &Candle, trend: &TrendState) -> Option<PullbackState> {
        let direction = trend.state.direction();

        if let Some(window) = &self.window {
            if direction != Some(window.direction) {
                tracing::trace!(
                    started = %window.start_timestamp,
                    trend = ?trend.state,
                    "pullback invalidated by trend"
                );
                self.window = None;
            }
        }

        let direction = direction?;

        match self.window.take() {
            Some(mut window) => {
                window.candles.push(candle.timestamp);
                if self.is_extreme(candle, direction) {
                    window.oscillator_extreme_flag = true;
                }
                self.window = Some(window);
            }
            None => {
                if candle.indicators_ready() && self.in_zone(candle, direction) {
                    self.window = Some(PullbackState {
                        active: true,
                        direction,
                        start_timestamp: candle.timestamp,
                        candles: vec![candle.timestamp],
                        oscillator_extreme_flag: self.is_extreme(candle, direction),
                    });
                }
            }
        }

        if let Some(window) = &self.window {
            if window.age() > self.params.pullback_max_age {
                tracing::trace!(started = %window.start_timestamp, age = window.age(), "pullback expired");
                self.window = None;
            }
        }

        self.window.clone()
    }

    fn reset(&mut self) {
        self.window = None;
    }
}
