//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|); TR[0] = high[0] - low[0].
//! ATR is the EMA of the true-range series, so it shares the EMA warm-up of `period - 1`.

use super::ema::ema;
use crate::error::ValidationError;

/// Compute the True Range series.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Result<Vec<f64>, ValidationError> {
    check_lengths(high, low, close)?;

    let n = high.len();
    let mut tr = Vec::with_capacity(n);
    if n == 0 {
        return Ok(tr);
    }
    tr.push(high[0] - low[0]);
    for i in 1..n {
        let pc = close[i - 1];
        let range = (high[i] - low[i])
            .max((high[i] - pc).abs())
            .max((low[i] - pc).abs());
        tr.push(range);
    }
    Ok(tr)
}

pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Vec<f64>, ValidationError> {
    let tr = true_range(high, low, close)?;
    ema(&tr, period)
}

fn check_lengths(high: &[f64], low: &[f64], close: &[f64]) -> Result<(), ValidationError> {
    let expected = high.len();
    for (field, series) in [("low", low), ("close", close)] {
        if series.len() != expected {
            return Err(ValidationError::LengthMismatch {
                indicator: "atr",
                field,
                expected,
                actual: series.len(),
            });
        }
    }
    Ok(())
}
