//! Relative Strength Index (RSI).
//!
//! Gains and losses come from price deltas, padded with 0 at index 0, and are
//! smoothed with the same EMA as every other series.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Edge cases: avg_loss == 0 and avg_gain > 0 → 100; both zero → 50.
//! Warm-up: the first `period` values are NaN.

use super::ema::ema;
use crate::error::ValidationError;

pub fn rsi(prices: &[f64], period: usize) -> Result<Vec<f64>, ValidationError> {
    if period < 1 {
        return Err(ValidationError::InvalidPeriod {
            indicator: "rsi",
            period,
        });
    }
    if prices.is_empty() {
        return Err(ValidationError::EmptyInput { indicator: "rsi" });
    }

    let n = prices.len();
    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let delta = prices[i] - prices[i - 1];
        if delta > 0.0 {
            gains[i] = delta;
        } else if delta < 0.0 {
            losses[i] = -delta;
        } else if delta.is_nan() {
            gains[i] = f64::NAN;
            losses[i] = f64::NAN;
        }
    }

    let avg_gain = ema(&gains, period)?;
    let avg_loss = ema(&losses, period)?;

    let mut result: Vec<f64> = avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| compute_rsi(g, l))
        .collect();
    for val in result.iter_mut().take(period) {
        *val = f64::NAN;
    }

    Ok(result)
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        f64::NAN
    } else if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn rsi_all_gains() {
        let result = rsi(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0], 3).unwrap();
        assert_approx(result[3], 100.0, 1e-9);
        assert_approx(result[5], 100.0, 1e-9);
    }

    #[test]
    fn rsi_all_losses() {
        let result = rsi(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0], 3).unwrap();
        assert_approx(result[3], 0.0, 1e-9);
    }

    #[test]
    fn rsi_flat_prices_is_fifty() {
        let result = rsi(&[1.1; 8], 3).unwrap();
        for v in &result[3..] {
            assert_approx(*v, 50.0, 1e-12);
        }
    }

    #[test]
    fn rsi_warm_up_is_period_long() {
        let result = rsi(&[44.0, 44.34, 44.09, 43.61, 44.33, 44.83], 3).unwrap();
        assert!(result[..3].iter().all(|v| v.is_nan()));
        assert!(result[3..].iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rsi_bounds() {
        let result = rsi(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0], 3).unwrap();
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "RSI out of bounds at bar {i}: {v}");
            }
        }
    }
}
