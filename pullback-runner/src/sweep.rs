//! Parameter sweeps with full per-run replication.
//!
//! Every grid point gets its own `StrategyPipeline` (and so its own trend, pullback,
//! risk and execution state). Nothing mutable is shared between runs, so the parallel
//! path must reproduce the sequential one exactly; `check_parallel_fidelity` checks that.

use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pullback_core::domain::Candle;
use pullback_core::fidelity::{compare_fidelity, FidelityReport, FidelityTolerances};
use pullback_core::fingerprint::Manifest;
use pullback_core::params::StrategyParams;
use pullback_core::{PipelineError, RunContext, RunOutput, StrategyPipeline};

use crate::profiling::{self, profile, ProfileScope};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid sweep value {value} for {axis}: {reason}")]
pub struct SweepError {
    pub axis: &'static str,
    pub value: f64,
    pub reason: &'static str,
}

/// Values to sweep. An empty list keeps the base configuration's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub stop_loss_atr_multipliers: Vec<f64>,
    pub risk_per_trade_pcts: Vec<f64>,
    pub take_profit_rs: Vec<f64>,
}

fn axis(values: &[f64], base: f64) -> Vec<f64> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl ParamGrid {
    /// Number of parameter sets `generate` produces.
    pub fn size(&self) -> usize {
        [
            self.stop_loss_atr_multipliers.as_slice(),
            &self.risk_per_trade_pcts,
            &self.take_profit_rs,
        ]
        .iter()
        .map(|v| v.len().max(1))
        .product()
    }

    /// Same bounds `BacktestConfig::validate` applies to the swept fields.
    pub fn validate(&self) -> Result<(), SweepError> {
        let axes: [(&'static str, &[f64], fn(f64) -> bool, &'static str); 3] = [
            (
                "stop_loss_atr_multiplier",
                self.stop_loss_atr_multipliers.as_slice(),
                |v| v > 0.0,
                "must be positive",
            ),
            (
                "risk_per_trade_pct",
                self.risk_per_trade_pcts.as_slice(),
                |v| v > 0.0 && v <= 100.0,
                "must be in (0, 100]",
            ),
            ("take_profit_r", self.take_profit_rs.as_slice(), |v| v > 0.0, "must be positive"),
        ];
        for (axis, values, ok, reason) in axes {
            if let Some(&value) = values.iter().find(|v| !(v.is_finite() && ok(**v))) {
                return Err(SweepError {
                    axis,
                    value,
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Cartesian product over the axes, stop multiplier outermost.
    ///
    /// Does not validate; `run_sweep` does.
    pub fn generate(&self, base: &StrategyParams) -> Vec<StrategyParams> {
        let mut out = Vec::with_capacity(self.size());
        for stop in axis(&self.stop_loss_atr_multipliers, base.signal.stop_loss_atr_multiplier) {
            for risk in axis(&self.risk_per_trade_pcts, base.risk.risk_per_trade_pct) {
                for tp in axis(&self.take_profit_rs, base.risk.take_profit_r) {
                    let mut params = base.clone();
                    params.signal.stop_loss_atr_multiplier = stop;
                    params.risk.risk_per_trade_pct = risk;
                    params.risk.take_profit_r = tp;
                    out.push(params);
                }
            }
        }
        out
    }
}

/// One grid point and how its run ended.
#[derive(Debug)]
pub struct SweepRun {
    pub index: usize,
    pub params: StrategyParams,
    pub result: Result<RunOutput, PipelineError>,
    /// Wall time of this grid point's run.
    pub elapsed: Duration,
}

fn run_one(index: usize, params: StrategyParams, candles: &[Candle], manifest: &Manifest, pair: &str) -> SweepRun {
    let span = tracing::info_span!("sweep_run", index, pair);
    let ctx = RunContext::new(pair)
        .with_manifest(manifest.clone())
        .with_span(span);
    let pipeline = StrategyPipeline::new(params.clone(), ctx);
    let (result, elapsed) = profile("sweep_run", || pipeline.run(candles));
    if let Err(err) = &result {
        tracing::warn!(index, error = %err, "sweep run failed");
    }
    SweepRun {
        index,
        params,
        result,
        elapsed,
    }
}

/// Run every grid point over the same candles. Results are in grid order either way,
/// and a failed run does not stop the others. An out-of-range grid value rejects the
/// whole sweep before any run starts.
pub fn run_sweep(
    candles: &[Candle],
    manifest: &Manifest,
    base: &StrategyParams,
    pair: &str,
    grid: &ParamGrid,
    parallel: bool,
) -> Result<Vec<SweepRun>, SweepError> {
    grid.validate()?;
    let sets = grid.generate(base);
    let scope = ProfileScope::new("sweep");
    let operations_before = profiling::total_operations();
    tracing::info!(runs = sets.len(), parallel, "sweep started");
    let runs: Vec<SweepRun> = if parallel {
        sets.into_par_iter()
            .enumerate()
            .map(|(i, params)| run_one(i, params, candles, manifest, pair))
            .collect()
    } else {
        sets.into_iter()
            .enumerate()
            .map(|(i, params)| run_one(i, params, candles, manifest, pair))
            .collect()
    };
    tracing::info!(
        runs = runs.len(),
        failed = runs.iter().filter(|r| r.result.is_err()).count(),
        elapsed_ms = scope.elapsed().as_secs_f64() * 1000.0,
        profiled_operations = profiling::total_operations().saturating_sub(operations_before),
        "sweep finished"
    );
    Ok(runs)
}

/// Sequential-versus-parallel comparison of one sweep.
#[derive(Debug, Clone, Default)]
pub struct ParallelFidelity {
    /// One report per grid point where both paths succeeded.
    pub reports: Vec<(usize, FidelityReport)>,
    /// Grid points whose reproducibility hashes differ.
    pub hash_mismatches: Vec<usize>,
    /// Grid points where exactly one path failed, or both failed differently.
    pub error_mismatches: Vec<usize>,
}

impl ParallelFidelity {
    pub fn is_clean(&self) -> bool {
        self.hash_mismatches.is_empty()
            && self.error_mismatches.is_empty()
            && self.reports.iter().all(|(_, r)| r.is_clean())
    }
}

pub fn check_parallel_fidelity(
    candles: &[Candle],
    manifest: &Manifest,
    base: &StrategyParams,
    pair: &str,
    grid: &ParamGrid,
    tolerances: &FidelityTolerances,
) -> Result<ParallelFidelity, SweepError> {
    let sequential = run_sweep(candles, manifest, base, pair, grid, false)?;
    let parallel = run_sweep(candles, manifest, base, pair, grid, true)?;

    let mut out = ParallelFidelity::default();
    for (seq, par) in sequential.iter().zip(&parallel) {
        match (&seq.result, &par.result) {
            (Ok(a), Ok(b)) => {
                if a.reproducibility_hash != b.reproducibility_hash {
                    out.hash_mismatches.push(seq.index);
                }
                out.reports
                    .push((seq.index, compare_fidelity(&a.executions, &b.executions, tolerances)));
            }
            (Err(a), Err(b)) if a.to_string() == b.to_string() => {}
            _ => out.error_mismatches.push(seq.index),
        }
    }
    if !out.is_clean() {
        tracing::warn!(
            hash_mismatches = out.hash_mismatches.len(),
            error_mismatches = out.error_mismatches.len(),
            "parallel sweep diverged from sequential"
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_is_the_base_config() {
        let base = StrategyParams::default();
        let grid = ParamGrid::default();
        assert_eq!(grid.size(), 1);
        assert_eq!(grid.generate(&base), vec![base]);
    }

    #[test]
    fn grid_is_a_cartesian_product_in_order() {
        let grid = ParamGrid {
            stop_loss_atr_multipliers: vec![1.0, 1.5],
            risk_per_trade_pcts: vec![0.25, 0.5, 1.0],
            take_profit_rs: vec![],
        };
        let sets = grid.generate(&StrategyParams::default());
        assert_eq!(grid.size(), 6);
        assert_eq!(sets.len(), 6);
        assert_eq!(sets[0].signal.stop_loss_atr_multiplier, 1.0);
        assert_eq!(sets[0].risk.risk_per_trade_pct, 0.25);
        assert_eq!(sets[2].risk.risk_per_trade_pct, 1.0);
        assert_eq!(sets[3].signal.stop_loss_atr_multiplier, 1.5);
        assert!(sets.iter().all(|p| p.risk.take_profit_r == 2.0));
    }

    #[test]
    fn out_of_range_axis_values_are_rejected() {
        let negative_stop = ParamGrid {
            stop_loss_atr_multipliers: vec![1.0, -1.5],
            ..ParamGrid::default()
        };
        assert_eq!(
            negative_stop.validate(),
            Err(SweepError {
                axis: "stop_loss_atr_multiplier",
                value: -1.5,
                reason: "must be positive",
            })
        );

        let too_much_risk = ParamGrid {
            risk_per_trade_pcts: vec![0.5, 150.0],
            ..ParamGrid::default()
        };
        assert_eq!(too_much_risk.validate().unwrap_err().axis, "risk_per_trade_pct");

        let zero_target = ParamGrid {
            take_profit_rs: vec![0.0],
            ..ParamGrid::default()
        };
        assert_eq!(zero_target.validate().unwrap_err().axis, "take_profit_r");

        let nan_stop = ParamGrid {
            stop_loss_atr_multipliers: vec![f64::NAN],
            ..ParamGrid::default()
        };
        assert!(nan_stop.validate().is_err());
    }

    #[test]
    fn invalid_grid_runs_nothing() {
        let grid = ParamGrid {
            stop_loss_atr_multipliers: vec![-1.5],
            ..ParamGrid::default()
        };
        let err = run_sweep(&[], &Manifest::new(), &StrategyParams::default(), "EURUSD", &grid, false)
            .unwrap_err();
        assert_eq!(err.axis, "stop_loss_atr_multiplier");
    }
}
