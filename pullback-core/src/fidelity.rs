//! Fidelity comparison between two execution paths over the same inputs.
//!
//! Used to check that an optimized or parallel path reproduces the baseline:
//! executions are paired by position and each category is checked independently.

use serde::{Deserialize, Serialize};

use crate::domain::TradeExecution;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FidelityTolerances {
    /// Absolute exit price difference.
    pub exit_price: f64,
    /// Relative PnL difference (0.0001 = 0.01%).
    pub pnl_relative: f64,
    /// Holding-duration difference in bars.
    pub holding_bars: usize,
}

impl Default for FidelityTolerances {
    fn default() -> Self {
        Self {
            exit_price: 1e-6,
            pnl_relative: 1e-4,
            holding_bars: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FidelityCategory {
    ExitPrice,
    Pnl,
    HoldingDuration,
    ExitIndex,
    TradeCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityViolation {
    /// Position of the pair; for `TradeCount` this is the shorter length.
    pub index: usize,
    pub category: FidelityCategory,
    pub baseline: f64,
    pub candidate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FidelityReport {
    pub compared: usize,
    pub violations: Vec<FidelityViolation>,
}

impl FidelityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, category: FidelityCategory) -> usize {
        self.violations
            .iter()
            .filter(|v| v.category == category)
            .count()
    }
}

fn relative_diff(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}

pub fn compare_fidelity(
    baseline: &[TradeExecution],
    candidate: &[TradeExecution],
    tolerances: &FidelityTolerances,
) -> FidelityReport {
    let mut violations = Vec::new();
    let mut flag = |index, category, baseline: f64, candidate: f64| {
        violations.push(FidelityViolation {
            index,
            category,
            baseline,
            candidate,
        })
    };

    for (index, (b, c)) in baseline.iter().zip(candidate).enumerate() {
        if (b.exit_fill - c.exit_fill).abs() > tolerances.exit_price {
            flag(index, FidelityCategory::ExitPrice, b.exit_fill, c.exit_fill);
        }
        if relative_diff(b.pnl_r, c.pnl_r) > tolerances.pnl_relative {
            flag(index, FidelityCategory::Pnl, b.pnl_r, c.pnl_r);
        }
        if b.holding_duration.abs_diff(c.holding_duration) > tolerances.holding_bars {
            flag(
                index,
                FidelityCategory::HoldingDuration,
                b.holding_duration as f64,
                c.holding_duration as f64,
            );
        }
        if b.exit_index != c.exit_index {
            flag(
                index,
                FidelityCategory::ExitIndex,
                b.exit_index as f64,
                c.exit_index as f64,
            );
        }
    }

    if baseline.len() != candidate.len() {
        flag(
            baseline.len().min(candidate.len()),
            FidelityCategory::TradeCount,
            baseline.len() as f64,
            candidate.len() as f64,
        );
    }

    FidelityReport {
        compared: baseline.len().min(candidate.len()),
        violations,
    }
}
