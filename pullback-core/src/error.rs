//! Error taxonomy for the strategy core.
//!
//! Every variant carries structured context (indices, limits, stages) so callers
//! can match on it instead of parsing messages. Nothing in the core swallows these:
//! they propagate to the caller unmodified and abort the owning run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::SignalId;
use crate::fingerprint::CanonicalizationError;

/// Invalid indicator input (bad period, empty or misaligned series).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{indicator}: period must be >= 1, got {period}")]
    InvalidPeriod { indicator: &'static str, period: usize },
    #[error("{indicator}: input series is empty")]
    EmptyInput { indicator: &'static str },
    #[error("{indicator}: series length mismatch ({field} has {actual}, expected {expected})")]
    LengthMismatch {
        indicator: &'static str,
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Malformed, out-of-order or gapped candle input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataIntegrityError {
    #[error("candle {index} at {timestamp} precedes previous candle at {previous}")]
    OutOfOrder {
        index: usize,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
    #[error("gap of {gap_seconds}s before candle {index} at {timestamp} exceeds tolerance of {tolerance_seconds}s")]
    Gap {
        index: usize,
        timestamp: DateTime<Utc>,
        gap_seconds: i64,
        tolerance_seconds: i64,
    },
    #[error("candle {index} at {timestamp} has non-finite {field}")]
    NonFinite {
        index: usize,
        timestamp: DateTime<Utc>,
        field: &'static str,
    },
    #[error("candle supplier failed at row {row}: {reason}")]
    Source { row: usize, reason: String },
}

/// Which risk limit was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLimitKind {
    StopDistance,
    RiskPercent,
    Atr,
    Equity,
    PipValue,
    Drawdown,
}

impl fmt::Display for RiskLimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StopDistance => "stop_distance",
            Self::RiskPercent => "risk_pct",
            Self::Atr => "atr",
            Self::Equity => "equity",
            Self::PipValue => "pip_value",
            Self::Drawdown => "max_drawdown_r",
        };
        f.write_str(name)
    }
}

/// Sizing or portfolio risk-limit violation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("risk limit {limit_type} violated: current {current}, limit {limit}")]
pub struct RiskLimitError {
    pub limit_type: RiskLimitKind,
    pub current: f64,
    pub limit: f64,
}

impl RiskLimitError {
    pub fn new(limit_type: RiskLimitKind, current: f64, limit: f64) -> Self {
        Self {
            limit_type,
            current,
            limit,
        }
    }
}

/// Lifecycle stage at which a simulated trade failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStage {
    Entry,
    Exit,
    Ingest,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Ingest => "ingest",
        };
        f.write_str(name)
    }
}

/// What went wrong inside the trade lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFault {
    /// No candle exists after the signal bar to fill the entry.
    MissingCandle { index: usize },
    /// Transition attempted from a state that does not allow it.
    InvalidTransition { from: &'static str, to: &'static str },
    /// Exit bar precedes the entry bar.
    ExitBeforeEntry { entry_index: usize, exit_index: usize },
    /// Signal lacks sizing or carries a degenerate stop.
    UnsizedSignal,
    DegenerateRisk,
    /// Execution already ingested into the metrics aggregator.
    DuplicateExecution,
}

impl fmt::Display for ExecutionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCandle { index } => write!(f, "missing candle at index {index}"),
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid transition {from} -> {to}")
            }
            Self::ExitBeforeEntry {
                entry_index,
                exit_index,
            } => write!(f, "exit bar {exit_index} precedes entry bar {entry_index}"),
            Self::UnsizedSignal => f.write_str("signal has no position size"),
            Self::DegenerateRisk => f.write_str("entry and stop coincide"),
            Self::DuplicateExecution => f.write_str("execution already ingested"),
        }
    }
}

/// Invalid trade lifecycle transition, tagged with the signal and stage.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("execution of signal {signal_id} failed at {stage}: {fault}")]
pub struct ExecutionSimulationError {
    pub signal_id: SignalId,
    pub stage: LifecycleStage,
    pub fault: ExecutionFault,
}

impl ExecutionSimulationError {
    pub fn new(signal_id: SignalId, stage: LifecycleStage, fault: ExecutionFault) -> Self {
        Self {
            signal_id,
            stage,
            fault,
        }
    }
}

/// Any error that aborts a strategy run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("data integrity: {0}")]
    DataIntegrity(#[from] DataIntegrityError),
    #[error("risk limit: {0}")]
    RiskLimit(#[from] RiskLimitError),
    #[error("execution simulation: {0}")]
    ExecutionSimulation(#[from] ExecutionSimulationError),
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("reproducibility: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}
