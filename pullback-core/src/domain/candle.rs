//! Candle: the fundamental market data unit consumed by the strategy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw OHLCV bar as delivered by the ingestion collaborator, before indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Indicator-enriched OHLCV candle. Immutable once built.
///
/// Indicator columns may be NaN inside their warm-up window; OHLC never is.
/// The candle's identifier is its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub atr: f64,
    pub rsi: f64,
    pub stoch_rsi: Option<f64>,
}

impl Candle {
    /// True when the candle closed above its open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// True when the candle closed below its open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// True once every required indicator has left its warm-up window.
    pub fn indicators_ready(&self) -> bool {
        self.ema20.is_finite() && self.ema50.is_finite() && self.atr.is_finite() && self.rsi.is_finite()
    }

    /// Name of the first non-finite OHLC field, if any.
    pub fn non_finite_price_field(&self) -> Option<&'static str> {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open: 1.1000,
            high: 1.1020,
            low: 1.0990,
            close: 1.1010,
            volume: 1200.0,
            ema20: 1.1005,
            ema50: 1.0980,
            atr: 0.0012,
            rsi: 55.0,
            stoch_rsi: None,
        }
    }

    #[test]
    fn candle_direction_helpers() {
        let c = sample();
        assert!(c.is_bullish());
        assert!(!c.is_bearish());
    }

    #[test]
    fn warm_up_candle_is_not_ready() {
        let mut c = sample();
        assert!(c.indicators_ready());
        c.ema50 = f64::NAN;
        assert!(!c.indicators_ready());
    }

    #[test]
    fn detects_non_finite_price() {
        let mut c = sample();
        assert_eq!(c.non_finite_price_field(), None);
        c.high = f64::INFINITY;
        assert_eq!(c.non_finite_price_field(), Some("high"));
    }
}
