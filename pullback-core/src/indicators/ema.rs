//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * price[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: EMA[0] = price[0].
//! Warm-up: the first `period - 1` outputs are NaN even though the recurrence has run.

use crate::error::ValidationError;

pub fn ema(prices: &[f64], period: usize) -> Result<Vec<f64>, ValidationError> {
    if period < 1 {
        return Err(ValidationError::InvalidPeriod {
            indicator: "ema",
            period,
        });
    }
    if prices.is_empty() {
        return Err(ValidationError::EmptyInput { indicator: "ema" });
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(prices.len());
    let mut prev = prices[0];
    result.push(prev);
    for &price in &prices[1..] {
        prev = alpha * price + (1.0 - alpha) * prev;
        result.push(prev);
    }

    // Insufficient-data convention
    for val in result.iter_mut().take(period - 1) {
        *val = f64::NAN;
    }

    Ok(result)
}
