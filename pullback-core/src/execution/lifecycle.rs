//! Trade lifecycle state machine: PENDING → OPEN → CLOSED.
//!
//! Every transition is checked. Skipping a state, reopening, or closing before the
//! entry bar produces an `ExecutionSimulationError` tagged with the signal and stage.

use chrono::{DateTime, Utc};

use crate::domain::{ExitReason, SignalId, TradeExecution, TradeSignal};
use crate::error::{ExecutionFault, ExecutionSimulationError, LifecycleStage};

/// Filled entry, as recorded by the `open` transition.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFill {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub slippage_pips: f64,
}

/// Filled exit, as recorded by the `close` transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitFill {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub slippage_pips: f64,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleState {
    Pending,
    Open(EntryFill),
    Closed(EntryFill, ExitFill),
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Open(_) => "OPEN",
            Self::Closed(..) => "CLOSED",
        }
    }
}

/// One signal's trip through the lifecycle.
#[derive(Debug, Clone)]
pub struct TradeLifecycle {
    signal_id: SignalId,
    state: LifecycleState,
}

impl TradeLifecycle {
    pub fn new(signal: &TradeSignal) -> Self {
        Self {
            signal_id: signal.id.clone(),
            state: LifecycleState::Pending,
        }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    fn fault(&self, stage: LifecycleStage, fault: ExecutionFault) -> ExecutionSimulationError {
        ExecutionSimulationError::new(self.signal_id.clone(), stage, fault)
    }

    fn invalid(&self, stage: LifecycleStage, to: &'static str) -> ExecutionSimulationError {
        self.fault(
            stage,
            ExecutionFault::InvalidTransition {
                from: self.state.name(),
                to,
            },
        )
    }

    pub fn open(&mut self, entry: EntryFill) -> Result<(), ExecutionSimulationError> {
        match self.state {
            LifecycleState::Pending => {
                self.state = LifecycleState::Open(entry);
                Ok(())
            }
            _ => Err(self.invalid(LifecycleStage::Entry, "OPEN")),
        }
    }

    pub fn close(&mut self, exit: ExitFill) -> Result<(), ExecutionSimulationError> {
        let entry = match &self.state {
            LifecycleState::Open(entry) => entry.clone(),
            _ => return Err(self.invalid(LifecycleStage::Exit, "CLOSED")),
        };
        if exit.index < entry.index {
            return Err(self.fault(
                LifecycleStage::Exit,
                ExecutionFault::ExitBeforeEntry {
                    entry_index: entry.index,
                    exit_index: exit.index,
                },
            ));
        }
        self.state = LifecycleState::Closed(entry, exit);
        Ok(())
    }

    /// Terminal record. Only valid once the trade is closed.
    pub fn into_execution(
        self,
        signal: &TradeSignal,
        costs_r: f64,
    ) -> Result<TradeExecution, ExecutionSimulationError> {
        let from = self.state.name();
        let LifecycleState::Closed(entry, exit) = self.state else {
            return Err(self.fault(
                LifecycleStage::Exit,
                ExecutionFault::InvalidTransition {
                    from,
                    to: "CLOSED",
                },
            ));
        };

        let risk = signal.risk_distance();
        let gross_r = signal.direction.sign() * (exit.price - entry.price) / risk;
        let latency = entry.timestamp - signal.timestamp;

        Ok(TradeExecution {
            signal_id: signal.id.clone(),
            direction: signal.direction,
            open_timestamp: entry.timestamp,
            entry_index: entry.index,
            entry_fill: entry.price,
            close_timestamp: exit.timestamp,
            exit_index: exit.index,
            exit_fill: exit.price,
            exit_reason: exit.reason,
            position_size: signal.calc_position_size.unwrap_or(0.0),
            pnl_r: gross_r - costs_r,
            slippage_entry_pips: entry.slippage_pips,
            slippage_exit_pips: exit.slippage_pips,
            costs_total: costs_r,
            holding_duration: exit.index - entry.index + 1,
            latency_seconds: latency.num_milliseconds() as f64 / 1000.0,
        })
    }
}
