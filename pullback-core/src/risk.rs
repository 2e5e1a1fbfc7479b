//! Risk management: position sizing, ATR stops, targets and drawdown limits.
//!
//! # Formula
//! ```text
//! risk_amount = equity * risk_pct / 100
//! raw_lots    = risk_amount / (stop_distance_pips * pip_value)
//! lots        = floor(raw_lots / 0.01) * 0.01      (never rounded up)
//! ```
//!
//! # Example
//! - Equity: 10,000; risk 0.25% → 25
//! - Stop: 20 pips at 10 per pip per lot → 200 per lot
//! - Raw: 0.125 lots → 0.12 lots

use crate::domain::{Direction, TradeExecution, TradeSignal};
use crate::error::{RiskLimitError, RiskLimitKind};
use crate::params::RiskParams;

/// Smallest tradable lot increment is 0.01, i.e. 100 steps per lot.
const STEPS_PER_LOT: f64 = 100.0;

/// Absorbs binary representation error (0.35 * 100 = 34.999…) before flooring.
const LOT_EPSILON: f64 = 1e-9;

pub fn calculate_position_size(
    equity: f64,
    risk_pct: f64,
    stop_distance_pips: f64,
    pip_value: f64,
) -> Result<f64, RiskLimitError> {
    if !(risk_pct > 0.0) {
        return Err(RiskLimitError::new(RiskLimitKind::RiskPercent, risk_pct, 0.0));
    }
    if !(stop_distance_pips > 0.0) {
        return Err(RiskLimitError::new(
            RiskLimitKind::StopDistance,
            stop_distance_pips,
            0.0,
        ));
    }
    if !(equity > 0.0) {
        return Err(RiskLimitError::new(RiskLimitKind::Equity, equity, 0.0));
    }
    if !(pip_value > 0.0) {
        return Err(RiskLimitError::new(RiskLimitKind::PipValue, pip_value, 0.0));
    }

    let risk_amount = equity * risk_pct / 100.0;
    let raw_lots = risk_amount / (stop_distance_pips * pip_value);
    let steps = (raw_lots * STEPS_PER_LOT + LOT_EPSILON).floor();
    if steps < 1.0 {
        return Ok(0.0);
    }
    Ok(steps / STEPS_PER_LOT)
}

/// Initial stop `multiplier` ATRs beyond the entry, on the losing side.
pub fn calculate_atr_stop(
    entry: f64,
    atr: f64,
    multiplier: f64,
    direction: Direction,
) -> Result<f64, RiskLimitError> {
    if !(atr > 0.0) {
        return Err(RiskLimitError::new(RiskLimitKind::Atr, atr, 0.0));
    }
    let distance = atr * multiplier;
    Ok(match direction {
        Direction::Long => entry - distance,
        Direction::Short => entry + distance,
    })
}

/// Target `r_multiple` risk distances beyond the entry, on the winning side.
pub fn calculate_take_profit(entry: f64, stop: f64, r_multiple: f64, direction: Direction) -> f64 {
    let distance = (entry - stop).abs();
    match direction {
        Direction::Long => entry + distance * r_multiple,
        Direction::Short => entry - distance * r_multiple,
    }
}

/// Fails once the drawdown reaches the limit; equality counts as a breach.
pub fn validate_risk_limits(current_drawdown_r: f64, max_drawdown_r: f64) -> Result<(), RiskLimitError> {
    if current_drawdown_r >= max_drawdown_r {
        return Err(RiskLimitError::new(
            RiskLimitKind::Drawdown,
            current_drawdown_r,
            max_drawdown_r,
        ));
    }
    Ok(())
}

/// Per-run risk accumulator: equity, cumulative R, and drawdown from the R peak.
#[derive(Debug, Clone)]
pub struct RiskManager {
    params: RiskParams,
    equity: f64,
    cumulative_r: f64,
    peak_r: f64,
}

impl RiskManager {
    pub fn new(params: RiskParams) -> Self {
        Self {
            equity: params.initial_equity,
            params,
            cumulative_r: 0.0,
            peak_r: 0.0,
        }
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn cumulative_r(&self) -> f64 {
        self.cumulative_r
    }

    pub fn current_drawdown_r(&self) -> f64 {
        self.peak_r - self.cumulative_r
    }

    pub fn check_limits(&self) -> Result<(), RiskLimitError> {
        validate_risk_limits(self.current_drawdown_r(), self.params.max_drawdown_r)
    }

    fn stop_distance_pips(&self, signal: &TradeSignal) -> f64 {
        signal.risk_distance() / self.params.pip_size
    }

    /// Enriched copy of `signal` with lots and take-profit filled in.
    pub fn size_signal(&self, signal: &TradeSignal) -> Result<TradeSignal, RiskLimitError> {
        let lots = calculate_position_size(
            self.equity,
            signal.risk_per_trade_pct,
            self.stop_distance_pips(signal),
            self.params.pip_value,
        )?;
        let target = calculate_take_profit(
            signal.entry_price,
            signal.initial_stop_price,
            self.params.take_profit_r,
            signal.direction,
        );
        Ok(signal.sized(lots, target))
    }

    /// Account-currency amount at risk for a sized signal (1R in money).
    pub fn risked_amount(&self, signal: &TradeSignal) -> f64 {
        signal.calc_position_size.unwrap_or(0.0) * self.stop_distance_pips(signal) * self.params.pip_value
    }

    /// Book a closed trade whose 1R was worth `risked_amount`.
    pub fn record_outcome(&mut self, execution: &TradeExecution, risked_amount: f64) {
        self.cumulative_r += execution.pnl_r;
        self.peak_r = self.peak_r.max(self.cumulative_r);
        self.equity += execution.pnl_r * risked_amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lot_rounding_floors_to_step() {
        assert_eq!(calculate_position_size(10_000.0, 0.25, 20.0, 10.0).unwrap(), 0.12);
        assert_eq!(calculate_position_size(10_000.0, 0.7, 20.0, 10.0).unwrap(), 0.35);
        assert_eq!(calculate_position_size(10_000.0, 1.0, 30.0, 10.0).unwrap(), 0.33);
    }

    #[test]
    fn below_minimum_lot_is_zero() {
        assert_eq!(calculate_position_size(100.0, 0.25, 50.0, 10.0).unwrap(), 0.0);
    }

    #[test]
    fn invalid_sizing_inputs_raise() {
        let err = calculate_position_size(10_000.0, 0.25, 0.0, 10.0).unwrap_err();
        assert_eq!(err.limit_type, RiskLimitKind::StopDistance);
        let err = calculate_position_size(10_000.0, -1.0, 20.0, 10.0).unwrap_err();
        assert_eq!(err.limit_type, RiskLimitKind::RiskPercent);
        assert_eq!(err.current, -1.0);
    }

    #[test]
    fn atr_stop_direction() {
        let long = calculate_atr_stop(1.10000, 0.00050, 2.0, Direction::Long).unwrap();
        let short = calculate_atr_stop(1.10000, 0.00050, 2.0, Direction::Short).unwrap();
        assert_relative_eq!(long, 1.09900, epsilon = 1e-12);
        assert_relative_eq!(short, 1.10100, epsilon = 1e-12);
    }

    #[test]
    fn atr_stop_rejects_non_positive_atr() {
        let err = calculate_atr_stop(1.1, 0.0, 2.0, Direction::Long).unwrap_err();
        assert_eq!(err.limit_type, RiskLimitKind::Atr);
        assert!(calculate_atr_stop(1.1, f64::NAN, 2.0, Direction::Long).is_err());
    }

    #[test]
    fn take_profit_mirrors_risk_distance() {
        assert_relative_eq!(
            calculate_take_profit(1.1000, 1.0990, 2.0, Direction::Long),
            1.1020,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            calculate_take_profit(1.1000, 1.1010, 2.0, Direction::Short),
            1.0980,
            epsilon = 1e-12
        );
    }

    #[test]
    fn drawdown_boundary_is_strict() {
        assert!(validate_risk_limits(10.0, 10.0).is_err());
        assert!(validate_risk_limits(9.999, 10.0).is_ok());
        let err = validate_risk_limits(12.0, 10.0).unwrap_err();
        assert_eq!(err.current, 12.0);
        assert_eq!(err.limit, 10.0);
    }
}
