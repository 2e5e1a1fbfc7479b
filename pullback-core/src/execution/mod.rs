//! Execution simulator: replays a sized signal against subsequent candles.
//!
//! Key rules:
//! - **Entry**: the bar after the signal bar, at the signal price plus adverse slippage
//! - **Exit priority** within a bar: TARGET, TRAILING_STOP, STOP_LOSS, EXPIRY
//! - **Gaps**: a stop gapped through fills at the bar open, never at the trigger
//! - **Trailing**: arms after `activation_r` of favourable excursion and only tightens
//! - **Costs**: spread and commission are charged in R against every trade
//!
//! The same-bar case (entry and exit on one bar) is legal and has `holding_duration == 1`.

pub mod lifecycle;
pub mod slippage;

pub use lifecycle::{EntryFill, ExitFill, LifecycleState, TradeLifecycle};
pub use slippage::{slippage_from_params, AtrSlippage, FixedPipSlippage, NoSlippage, SlippageModel};

use crate::domain::{Candle, Direction, ExitReason, TradeExecution, TradeSignal};
use crate::error::{ExecutionFault, ExecutionSimulationError, LifecycleStage};
use crate::params::{ExecutionParams, TrailingParams};

/// Trailing stop that can only tighten once armed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStop {
    params: TrailingParams,
    direction: Direction,
    entry: f64,
    risk: f64,
    initial_stop: f64,
    best: f64,
    level: Option<f64>,
}

impl TrailingStop {
    pub fn new(params: TrailingParams, signal: &TradeSignal) -> Self {
        Self {
            params,
            direction: signal.direction,
            entry: signal.entry_price,
            risk: signal.risk_distance(),
            initial_stop: signal.initial_stop_price,
            best: signal.entry_price,
            level: None,
        }
    }

    pub fn level(&self) -> Option<f64> {
        self.level
    }

    /// Fold a completed bar into the trail. Called after the bar's exit checks so a
    /// level set from a bar's extreme is only tested from the next bar on.
    pub fn observe(&mut self, candle: &Candle, fallback_atr: f64) {
        self.best = match self.direction {
            Direction::Long => self.best.max(candle.high),
            Direction::Short => self.best.min(candle.low),
        };
        let excursion_r = self.direction.sign() * (self.best - self.entry) / self.risk;
        if excursion_r < self.params.activation_r {
            return;
        }
        let atr = if candle.atr.is_finite() && candle.atr > 0.0 {
            candle.atr
        } else {
            fallback_atr
        };
        let proposed = self.best - self.direction.sign() * atr * self.params.atr_multiplier;

        // never looser than the initial stop, never looser than before
        let tighter = |a: f64, b: f64| match self.direction {
            Direction::Long => a.max(b),
            Direction::Short => a.min(b),
        };
        let beats_initial = match self.direction {
            Direction::Long => proposed > self.initial_stop,
            Direction::Short => proposed < self.initial_stop,
        };
        if !beats_initial {
            return;
        }
        self.level = Some(match self.level {
            Some(current) => tighter(current, proposed),
            None => proposed,
        });
    }
}

/// Fill for a protective stop at `trigger`, or `None` if the bar never reached it.
fn stop_fill(direction: Direction, trigger: f64, candle: &Candle) -> Option<f64> {
    match direction {
        Direction::Long if candle.low <= trigger => Some(candle.open.min(trigger)),
        Direction::Short if candle.high >= trigger => Some(candle.open.max(trigger)),
        _ => None,
    }
}

/// Fill for a resting take-profit at `target`. Gaps through it fill at the better open.
fn target_fill(direction: Direction, target: f64, candle: &Candle) -> Option<f64> {
    match direction {
        Direction::Long if candle.high >= target => Some(candle.open.max(target)),
        Direction::Short if candle.low <= target => Some(candle.open.min(target)),
        _ => None,
    }
}

pub struct ExecutionSimulator {
    params: ExecutionParams,
    pip_size: f64,
    pip_value: f64,
    slippage: Box<dyn SlippageModel>,
}

impl ExecutionSimulator {
    pub fn new(params: ExecutionParams, pip_size: f64, pip_value: f64) -> Self {
        let slippage = slippage_from_params(&params.slippage, pip_size);
        Self {
            params,
            pip_size,
            pip_value,
            slippage,
        }
    }

    /// Round-trip spread plus commission, expressed in R for a given risk distance.
    pub fn costs_r(&self, risk_distance: f64) -> f64 {
        let commission_pips = if self.pip_value > 0.0 {
            self.params.commission_per_lot / self.pip_value
        } else {
            0.0
        };
        (self.params.spread_pips + commission_pips) * self.pip_size / risk_distance
    }

    /// Simulate `signal` (emitted on `candles[signal_index]`) to completion.
    pub fn execute(
        &self,
        signal: &TradeSignal,
        candles: &[Candle],
        signal_index: usize,
    ) -> Result<TradeExecution, ExecutionSimulationError> {
        let entry_error =
            |fault| ExecutionSimulationError::new(signal.id.clone(), LifecycleStage::Entry, fault);

        let target = match (signal.calc_position_size, signal.take_profit_price) {
            (Some(_), Some(target)) => target,
            _ => return Err(entry_error(ExecutionFault::UnsizedSignal)),
        };
        let risk = signal.risk_distance();
        if !(risk > 0.0) {
            return Err(entry_error(ExecutionFault::DegenerateRisk));
        }

        let entry_index = signal_index + 1;
        let entry_candle = candles
            .get(entry_index)
            .ok_or_else(|| entry_error(ExecutionFault::MissingCandle { index: entry_index }))?;

        let direction = signal.direction;
        let sign = direction.sign();
        let entry_slip = self.slippage.entry_pips(entry_candle, signal);
        let mut trade = TradeLifecycle::new(signal);
        trade.open(EntryFill {
            index: entry_index,
            timestamp: entry_candle.timestamp,
            price: signal.entry_price + sign * entry_slip * self.pip_size,
            slippage_pips: entry_slip,
        })?;

        let mut trailing = self
            .params
            .trailing
            .map(|params| TrailingStop::new(params, signal));
        let last_index = candles.len() - 1;

        for (index, candle) in candles.iter().enumerate().skip(entry_index) {
            let held = index - entry_index + 1;
            let trail_level = trailing.as_ref().and_then(TrailingStop::level);

            let hit = target_fill(direction, target, candle)
                .map(|price| (price, ExitReason::Target))
                .or_else(|| {
                    trail_level
                        .and_then(|level| stop_fill(direction, level, candle))
                        .map(|price| (price, ExitReason::TrailingStop))
                })
                .or_else(|| {
                    stop_fill(direction, signal.initial_stop_price, candle)
                        .map(|price| (price, ExitReason::StopLoss))
                })
                .or_else(|| {
                    (held >= self.params.max_holding_candles || index == last_index)
                        .then_some((candle.close, ExitReason::Expiry))
                });

            if let Some((raw, reason)) = hit {
                let slip = match reason {
                    ExitReason::Target => 0.0,
                    _ => self.slippage.exit_pips(candle, signal),
                };
                trade.close(ExitFill {
                    index,
                    timestamp: candle.timestamp,
                    price: raw - sign * slip * self.pip_size,
                    slippage_pips: slip,
                    reason,
                })?;
                let execution = trade.into_execution(signal, self.costs_r(risk))?;
                tracing::debug!(
                    signal_id = %execution.signal_id,
                    reason = ?execution.exit_reason,
                    pnl_r = execution.pnl_r,
                    holding = execution.holding_duration,
                    "trade closed"
                );
                return Ok(execution);
            }

            if let Some(trail) = trailing.as_mut() {
                trail.observe(candle, signal.atr);
            }
        }

        // unreachable while the last bar forces an expiry
        Err(ExecutionSimulationError::new(
            signal.id.clone(),
            LifecycleStage::Exit,
            ExecutionFault::InvalidTransition {
                from: trade.state().name(),
                to: "CLOSED",
            },
        ))
    }
}
