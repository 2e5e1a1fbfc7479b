//! Vectorized indicator engine.
//!
//! Every indicator is a pure function over price slices returning a series of the same
//! length, NaN inside its warm-up window. Indicators are computed once up front by
//! `enrich`, never recomputed per candle.

pub mod atr;
pub mod ema;
pub mod rsi;
pub mod stoch_rsi;

pub use atr::{atr, true_range};
pub use ema::ema;
pub use rsi::rsi;
pub use stoch_rsi::stoch_rsi;

use crate::domain::{Candle, RawBar};
use crate::error::ValidationError;
use crate::params::IndicatorParams;

/// Compute every indicator column for `bars` and build enriched candles.
pub fn enrich(bars: &[RawBar], params: &IndicatorParams) -> Result<Vec<Candle>, ValidationError> {
    if bars.is_empty() {
        return Ok(Vec::new());
    }

    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let ema_fast = ema(&close, params.ema_fast_period)?;
    let ema_slow = ema(&close, params.ema_slow_period)?;
    let atr_series = atr(&high, &low, &close, params.atr_period)?;
    let rsi_series = rsi(&close, params.rsi_period)?;
    let stoch = params
        .stoch_rsi_window
        .map(|window| stoch_rsi(&rsi_series, window))
        .transpose()?;

    Ok(bars
        .iter()
        .enumerate()
        .map(|(i, bar)| Candle {
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            ema20: ema_fast[i],
            ema50: ema_slow[i],
            atr: atr_series[i],
            rsi: rsi_series[i],
            stoch_rsi: stoch.as_ref().map(|s| s[i]),
        })
        .collect())
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<RawBar> {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| RawBar {
                timestamp: base + Duration::hours(i as i64),
                open: close,
                high: close + 0.001,
                low: close - 0.001,
                close,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn enrich_aligns_every_column() {
        let closes: Vec<f64> = (0..60).map(|i| 1.1 + i as f64 * 0.0001).collect();
        let candles = enrich(&bars(&closes), &IndicatorParams::default()).unwrap();
        assert_eq!(candles.len(), 60);
        assert!(candles[18].ema20.is_nan());
        assert!(candles[19].ema20.is_finite());
        assert!(candles[48].ema50.is_nan());
        assert!(candles[49].ema50.is_finite());
        assert!(candles[13].rsi.is_nan());
        assert!(candles[14].rsi.is_finite());
        assert!(candles[59].stoch_rsi.is_some());
    }

    #[test]
    fn enrich_without_stoch_leaves_column_unset() {
        let params = IndicatorParams {
            stoch_rsi_window: None,
            ..IndicatorParams::default()
        };
        let candles = enrich(&bars(&[1.0, 1.1, 1.2]), &params).unwrap();
        assert!(candles.iter().all(|c| c.stoch_rsi.is_none()));
    }

    #[test]
    fn enrich_propagates_validation_errors() {
        let params = IndicatorParams {
            atr_period: 0,
            ..IndicatorParams::default()
        };
        assert!(matches!(
            enrich(&bars(&[1.0, 1.1]), &params),
            Err(ValidationError::InvalidPeriod { indicator: "ema", .. })
        ));
    }
}
