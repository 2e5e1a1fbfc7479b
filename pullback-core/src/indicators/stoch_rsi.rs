//! Stochastic RSI.
//!
//! (rsi - min(rsi, window)) / (max(rsi, window) - min(rsi, window)) over the trailing
//! window ending at each bar. Flat window → 0.5. Incomplete or NaN-tainted window → NaN.

use crate::error::ValidationError;

pub fn stoch_rsi(rsi: &[f64], window: usize) -> Result<Vec<f64>, ValidationError> {
    if window < 1 {
        return Err(ValidationError::InvalidPeriod {
            indicator: "stoch_rsi",
            period: window,
        });
    }
    if rsi.is_empty() {
        return Err(ValidationError::EmptyInput {
            indicator: "stoch_rsi",
        });
    }

    let mut result = vec![f64::NAN; rsi.len()];
    for i in (window - 1)..rsi.len() {
        let slice = &rsi[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let lo = slice.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = slice.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        result[i] = if hi == lo { 0.5 } else { (rsi[i] - lo) / (hi - lo) };
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn stoch_rsi_known_values() {
        let result = stoch_rsi(&[f64::NAN, 30.0, 50.0, 70.0, 40.0], 3).unwrap();
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!(result[2].is_nan()); // window contains NaN
        assert_approx(result[3], 1.0, DEFAULT_EPSILON);
        assert_approx(result[4], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn stoch_rsi_flat_window_is_half() {
        let result = stoch_rsi(&[55.0, 55.0, 55.0], 3).unwrap();
        assert_approx(result[2], 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn stoch_rsi_rejects_zero_window() {
        assert!(stoch_rsi(&[50.0], 0).is_err());
    }
}
