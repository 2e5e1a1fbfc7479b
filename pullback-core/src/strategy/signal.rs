//! Signal generation: turns a trend + pullback + reversal into a `TradeSignal`.
//!
//! The generator is a pure function of the candle history, the index being evaluated,
//! and the upstream snapshots. It never looks past `candles[index]`, holds no mutable
//! state, and therefore emits byte-identical signals however often it is called.

use crate::domain::{Candle, Direction, PullbackState, SignalId, TradeSignal, TrendState};
use crate::params::{PullbackParams, SignalParams};
use crate::risk::calculate_atr_stop;

pub trait SignalGenerator: Send + Sync {
    fn evaluate(
        &self,
        candles: &[Candle],
        index: usize,
        trend: &TrendState,
        pullback: Option<&PullbackState>,
    ) -> Option<TradeSignal>;
}

/// Pullback-continuation signal: trend + active pullback + reversal bars + momentum turn.
#[derive(Debug, Clone)]
pub struct PullbackSignalGenerator {
    pair: String,
    risk_per_trade_pct: f64,
    params: SignalParams,
    bands: PullbackParams,
}

impl PullbackSignalGenerator {
    pub fn new(
        pair: impl Into<String>,
        risk_per_trade_pct: f64,
        params: SignalParams,
        bands: PullbackParams,
    ) -> Self {
        Self {
            pair: pair.into(),
            risk_per_trade_pct,
            params,
            bands,
        }
    }

    /// The last `min_candles_reversal` bars close in the trade direction and the
    /// latest close is back on the trend side of EMA20.
    fn reversal_confirmed(&self, candles: &[Candle], index: usize, direction: Direction) -> bool {
        let n = self.params.min_candles_reversal.max(1);
        if index + 1 < n {
            return false;
        }
        let pattern = &candles[index + 1 - n..=index];
        let current = &candles[index];
        match direction {
            Direction::Long => pattern.iter().all(Candle::is_bullish) && current.close > current.ema20,
            Direction::Short => pattern.iter().all(Candle::is_bearish) && current.close < current.ema20,
        }
    }

    /// The oscillator crosses back out of its extreme band on this bar: the previous
    /// reading was beyond the threshold and the current one is not. Returns the
    /// oscillator that turned, RSI first.
    fn momentum_turn(&self, prev: &Candle, current: &Candle, direction: Direction) -> Option<&'static str> {
        let b = &self.bands;
        let stoch = prev.stoch_rsi.zip(current.stoch_rsi);
        let (rsi_turn, stoch_turn) = match direction {
            Direction::Long => (
                prev.rsi < b.rsi_oversold && current.rsi >= b.rsi_oversold,
                stoch.is_some_and(|(p, c)| p < b.stoch_low && c >= b.stoch_low),
            ),
            Direction::Short => (
                prev.rsi > b.rsi_overbought && current.rsi <= b.rsi_overbought,
                stoch.is_some_and(|(p, c)| p > b.stoch_high && c <= b.stoch_high),
            ),
        };
        if rsi_turn {
            Some("rsi_turn")
        } else if stoch_turn {
            Some("stoch_turn")
        } else {
            None
        }
    }
}

impl SignalGenerator for PullbackSignalGenerator {
    fn evaluate(
        &self,
        candles: &[Candle],
        index: usize,
        trend: &TrendState,
        pullback: Option<&PullbackState>,
    ) -> Option<TradeSignal> {
        let direction = trend.state.direction()?;
        let pullback = pullback.filter(|p| p.active)?;
        if pullback.direction != direction || !pullback.oscillator_extreme_flag {
            return None;
        }
        if index == 0 {
            return None;
        }
        let current = candles.get(index)?;
        let prev = &candles[index - 1];
        if !current.indicators_ready() || !prev.rsi.is_finite() || current.atr <= 0.0 {
            return None;
        }

        if !self.reversal_confirmed(candles, index, direction) {
            return None;
        }
        let turn = self.momentum_turn(prev, current, direction)?;

        let entry_price = current.close;
        let initial_stop_price = calculate_atr_stop(
            entry_price,
            current.atr,
            self.params.stop_loss_atr_multiplier,
            direction,
        )
        .ok()?;
        if !initial_stop_price.is_finite() || initial_stop_price == entry_price {
            return None;
        }

        let id = SignalId::compute(
            current.timestamp,
            &self.pair,
            direction,
            entry_price,
            &self.params.version,
        );

        Some(TradeSignal {
            id,
            timestamp: current.timestamp,
            pair: self.pair.clone(),
            direction,
            entry_price,
            initial_stop_price,
            risk_per_trade_pct: self.risk_per_trade_pct,
            calc_position_size: None,
            take_profit_price: None,
            atr: current.atr,
            tags: vec![
                "pullback_continuation".to_string(),
                direction.as_str().to_lowercase(),
                turn.to_string(),
            ],
            version: self.params.version.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Trend;
    use crate::strategy::test_support::candle;
    use approx::assert_relative_eq;

    fn up_trend() -> TrendState {
        TrendState {
            state: Trend::Up,
            cross_count: 0,
            last_change_timestamp: None,
        }
    }

    fn long_pullback(flag: bool) -> PullbackState {
        PullbackState {
            active: true,
            direction: Direction::Long,
            start_timestamp: candle(0, 1.0, 1.0, 1.0, 1.0).timestamp,
            candles: vec![candle(0, 1.0, 1.0, 1.0, 1.0).timestamp],
            oscillator_extreme_flag: flag,
        }
    }

    fn generator() -> PullbackSignalGenerator {
        PullbackSignalGenerator::new(
            "EURUSD",
            0.25,
            SignalParams::default(),
            PullbackParams::default(),
        )
    }

    /// Bar 0: dip into EMA20 with RSI 35. Bar 1: bullish close back above EMA20, RSI 45.
    fn history() -> Vec<Candle> {
        let mut dip = candle(0, 1.1010, 1.1012, 1.0995, 1.0998);
        dip.rsi = 35.0;
        let mut turn = candle(1, 1.0998, 1.1030, 1.0996, 1.1025);
        turn.rsi = 45.0;
        turn.atr = 0.0010;
        for c in [&mut dip, &mut turn] {
            c.ema20 = 1.1000;
            c.ema50 = 1.0950;
        }
        vec![dip, turn]
    }

    #[test]
    fn emits_long_signal_with_atr_stop() {
        let candles = history();
        let signal = generator()
            .evaluate(&candles, 1, &up_trend(), Some(&long_pullback(true)))
            .unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.entry_price, 1.1025);
        assert_relative_eq!(signal.initial_stop_price, 1.1010, epsilon = 1e-12);
        assert_eq!(signal.timestamp, candles[1].timestamp);
        assert_eq!(signal.calc_position_size, None);
        assert!(signal.tags.contains(&"rsi_turn".to_string()));
        assert_eq!(
            signal.id,
            SignalId::compute(candles[1].timestamp, "EURUSD", Direction::Long, 1.1025, "1.0.0")
        );
    }

    #[test]
    fn repeated_calls_are_identical() {
        let candles = history();
        let g = generator();
        let pb = long_pullback(true);
        let first = g.evaluate(&candles, 1, &up_trend(), Some(&pb)).unwrap();
        for _ in 0..3 {
            assert_eq!(g.evaluate(&candles, 1, &up_trend(), Some(&pb)).unwrap(), first);
        }
    }

    #[test]
    fn no_signal_without_pullback_or_flag() {
        let candles = history();
        let g = generator();
        assert!(g.evaluate(&candles, 1, &up_trend(), None).is_none());
        assert!(g
            .evaluate(&candles, 1, &up_trend(), Some(&long_pullback(false)))
            .is_none());
    }

    #[test]
    fn no_signal_in_range_or_against_pullback() {
        let candles = history();
        let g = generator();
        let mut trend = up_trend();
        trend.state = Trend::Range;
        assert!(g
            .evaluate(&candles, 1, &trend, Some(&long_pullback(true)))
            .is_none());
        trend.state = Trend::Down;
        assert!(g
            .evaluate(&candles, 1, &trend, Some(&long_pullback(true)))
            .is_none());
    }

    #[test]
    fn no_signal_without_reversal_bar() {
        let mut candles = history();
        candles[1].close = 1.0997; // bearish, below ema20
        assert!(generator()
            .evaluate(&candles, 1, &up_trend(), Some(&long_pullback(true)))
            .is_none());
    }

    #[test]
    fn no_signal_without_momentum_turn() {
        let mut candles = history();
        candles[1].rsi = 34.0;
        assert!(generator()
            .evaluate(&candles, 1, &up_trend(), Some(&long_pullback(true)))
            .is_none());
    }

    #[test]
    fn rising_rsi_already_outside_the_band_is_not_a_turn() {
        let mut candles = history();
        candles[0].rsi = 42.0;
        candles[1].rsi = 48.0;
        assert!(generator()
            .evaluate(&candles, 1, &up_trend(), Some(&long_pullback(true)))
            .is_none());
    }

    #[test]
    fn stoch_cross_turns_when_rsi_does_not() {
        let mut candles = history();
        candles[0].rsi = 42.0;
        candles[1].rsi = 48.0;
        candles[0].stoch_rsi = Some(0.10);
        candles[1].stoch_rsi = Some(0.25);
        let signal = generator()
            .evaluate(&candles, 1, &up_trend(), Some(&long_pullback(true)))
            .unwrap();
        assert!(signal.tags.contains(&"stoch_turn".to_string()));

        candles[0].stoch_rsi = Some(0.30);
        candles[1].stoch_rsi = Some(0.45);
        assert!(generator()
            .evaluate(&candles, 1, &up_trend(), Some(&long_pullback(true)))
            .is_none());
    }

    /// Mirror of `history`: rally into EMA20 with RSI 65, then a bearish close below it at RSI 55.
    fn short_history() -> Vec<Candle> {
        let mut rally = candle(0, 1.0990, 1.1005, 1.0988, 1.1002);
        rally.rsi = 65.0;
        let mut turn = candle(1, 1.1002, 1.1004, 1.0970, 1.0975);
        turn.rsi = 55.0;
        turn.atr = 0.0010;
        for c in [&mut rally, &mut turn] {
            c.ema20 = 1.1000;
            c.ema50 = 1.1050;
        }
        vec![rally, turn]
    }

    fn short_setup() -> (TrendState, PullbackState) {
        let mut trend = up_trend();
        trend.state = Trend::Down;
        let mut pullback = long_pullback(true);
        pullback.direction = Direction::Short;
        (trend, pullback)
    }

    #[test]
    fn emits_short_signal_on_rsi_cross_down() {
        let candles = short_history();
        let (trend, pullback) = short_setup();
        let signal = generator().evaluate(&candles, 1, &trend, Some(&pullback)).unwrap();
        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.entry_price, 1.0975);
        assert_relative_eq!(signal.initial_stop_price, 1.0990, epsilon = 1e-12);
        assert!(signal.tags.contains(&"rsi_turn".to_string()));
        assert!(signal.tags.contains(&"short".to_string()));
    }

    #[test]
    fn short_needs_rsi_or_stoch_to_leave_overbought() {
        let mut candles = short_history();
        let (trend, pullback) = short_setup();
        candles[0].rsi = 58.0;
        candles[1].rsi = 52.0;
        assert!(generator().evaluate(&candles, 1, &trend, Some(&pullback)).is_none());

        candles[0].stoch_rsi = Some(0.90);
        candles[1].stoch_rsi = Some(0.70);
        let signal = generator().evaluate(&candles, 1, &trend, Some(&pullback)).unwrap();
        assert!(signal.tags.contains(&"stoch_turn".to_string()));
    }

    #[test]
    fn min_candles_reversal_requires_consecutive_bars() {
        let candles = history();
        let g = PullbackSignalGenerator::new(
            "EURUSD",
            0.25,
            SignalParams {
                min_candles_reversal: 2,
                ..SignalParams::default()
            },
            PullbackParams::default(),
        );
        // bar 0 is bearish, so a two-bar bullish pattern is not confirmed
        assert!(g
            .evaluate(&candles, 1, &up_trend(), Some(&long_pullback(true)))
            .is_none());
    }

    #[test]
    fn warm_up_candle_yields_nothing() {
        let mut candles = history();
        candles[1].atr = f64::NAN;
        assert!(generator()
            .evaluate(&candles, 1, &up_trend(), Some(&long_pullback(true)))
            .is_none());
    }
}
