//! Metrics aggregation: streaming ingestion of executions, one immutable summary.
//!
//! `MetricsAggregator` keeps running sums while a run is in progress. `finalize`
//! consumes it, so nothing can be ingested after the summary exists.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{SignalId, TradeExecution};
use crate::error::{ExecutionFault, ExecutionSimulationError, LifecycleStage};

/// Slippage paid across the run, in pips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlippageStats {
    pub mean_entry_pips: f64,
    pub mean_exit_pips: f64,
    pub max_entry_pips: f64,
    pub max_exit_pips: f64,
    pub total_pips: f64,
}

/// Immutable aggregate over every execution of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_r: f64,
    pub avg_r: f64,
    pub avg_win_r: f64,
    /// Magnitude of the average losing trade (positive).
    pub avg_loss_r: f64,
    pub expectancy: f64,
    pub sharpe_estimate: f64,
    /// Largest peak-to-trough decline in cumulative R (positive).
    pub max_drawdown_r: f64,
    pub latency_mean_seconds: f64,
    pub latency_p95_seconds: f64,
    pub latency_p99_seconds: f64,
    /// Per trade: cumulative R minus its running maximum. Never positive.
    pub drawdown_curve: Vec<f64>,
    pub slippage: SlippageStats,
    pub costs_total_r: f64,
    pub avg_holding_bars: f64,
    pub exit_reasons: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct MetricsAggregator {
    seen: BTreeSet<SignalId>,
    count: usize,
    wins: usize,
    sum_r: f64,
    sum_sq_r: f64,
    sum_win_r: f64,
    sum_loss_r: f64,

    // ── Drawdown tracker ──
    cumulative_r: f64,
    peak_r: f64,
    drawdown_curve: Vec<f64>,

    latencies: Vec<f64>,
    sum_entry_slip: f64,
    sum_exit_slip: f64,
    max_entry_slip: f64,
    max_exit_slip: f64,
    sum_costs_r: f64,
    sum_holding: usize,
    exit_reasons: BTreeMap<String, usize>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trade_count(&self) -> usize {
        self.count
    }

    /// Fold one execution into the running sums. Each signal id is accepted once.
    pub fn ingest(&mut self, execution: &TradeExecution) -> Result<(), ExecutionSimulationError> {
        if !self.seen.insert(execution.signal_id.clone()) {
            return Err(ExecutionSimulationError::new(
                execution.signal_id.clone(),
                LifecycleStage::Ingest,
                ExecutionFault::DuplicateExecution,
            ));
        }

        let r = execution.pnl_r;
        self.count += 1;
        self.sum_r += r;
        self.sum_sq_r += r * r;
        if execution.is_winner() {
            self.wins += 1;
            self.sum_win_r += r;
        } else {
            self.sum_loss_r += -r;
        }

        self.cumulative_r += r;
        self.peak_r = self.peak_r.max(self.cumulative_r);
        self.drawdown_curve.push(self.cumulative_r - self.peak_r);

        self.latencies.push(execution.latency_seconds);
        self.sum_entry_slip += execution.slippage_entry_pips;
        self.sum_exit_slip += execution.slippage_exit_pips;
        self.max_entry_slip = self.max_entry_slip.max(execution.slippage_entry_pips);
        self.max_exit_slip = self.max_exit_slip.max(execution.slippage_exit_pips);
        self.sum_costs_r += execution.costs_total;
        self.sum_holding += execution.holding_duration;
        *self
            .exit_reasons
            .entry(execution.exit_reason.as_str().to_string())
            .or_default() += 1;
        Ok(())
    }

    pub fn finalize(self) -> MetricsSummary {
        let n = self.count;
        if n == 0 {
            return MetricsSummary::default();
        }
        let nf = n as f64;
        let losses = n - self.wins;
        let win_rate = self.wins as f64 / nf;
        let avg_r = self.sum_r / nf;
        let avg_win_r = if self.wins > 0 {
            self.sum_win_r / self.wins as f64
        } else {
            0.0
        };
        let avg_loss_r = if losses > 0 {
            self.sum_loss_r / losses as f64
        } else {
            0.0
        };

        let sharpe_estimate = if n < 2 {
            0.0
        } else {
            let variance = ((self.sum_sq_r - nf * avg_r * avg_r) / (nf - 1.0)).max(0.0);
            let std = variance.sqrt();
            if std < 1e-12 {
                0.0
            } else {
                avg_r / std
            }
        };

        let max_drawdown_r = self
            .drawdown_curve
            .iter()
            .fold(0.0_f64, |worst, &dd| worst.max(-dd));

        let mut latencies = self.latencies;
        latencies.sort_by(f64::total_cmp);
        let latency_mean_seconds = latencies.iter().sum::<f64>() / nf;

        MetricsSummary {
            trade_count: n,
            wins: self.wins,
            losses,
            win_rate,
            total_r: self.sum_r,
            avg_r,
            avg_win_r,
            avg_loss_r,
            expectancy: avg_win_r * win_rate - avg_loss_r * (1.0 - win_rate),
            sharpe_estimate,
            max_drawdown_r,
            latency_mean_seconds,
            latency_p95_seconds: percentile(&latencies, 95.0),
            latency_p99_seconds: percentile(&latencies, 99.0),
            drawdown_curve: self.drawdown_curve,
            slippage: SlippageStats {
                mean_entry_pips: self.sum_entry_slip / nf,
                mean_exit_pips: self.sum_exit_slip / nf,
                max_entry_pips: self.max_entry_slip,
                max_exit_pips: self.max_exit_slip,
                total_pips: self.sum_entry_slip + self.sum_exit_slip,
            },
            costs_total_r: self.sum_costs_r,
            avg_holding_bars: self.sum_holding as f64 / nf,
            exit_reasons: self.exit_reasons,
        }
    }
}

/// Percentile `p` (0..=100) of an ascending sample, linearly interpolated between ranks.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}
