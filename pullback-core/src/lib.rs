//! Pullback Core: indicators, strategy state machines, risk, execution, metrics.
//!
//! This crate contains the deterministic heart of the FX pullback backtester:
//! - Domain types (candles, signals, trend and pullback snapshots, executions)
//! - Vectorized indicators (EMA, ATR, RSI, StochRSI)
//! - Trend classifier, pullback detector and signal generator
//! - Risk manager with lot flooring and drawdown limits
//! - Execution simulator with an explicit trade lifecycle
//! - Metrics aggregation, fidelity comparison and the reproducibility hash
//!
//! One `StrategyPipeline` is one run. Parallelism happens above this crate by
//! building an independent pipeline per worker.

pub mod domain;
pub mod error;
pub mod execution;
pub mod fidelity;
pub mod fingerprint;
pub mod indicators;
pub mod metrics;
pub mod params;
pub mod pipeline;
pub mod risk;
pub mod strategy;
pub mod telemetry;

pub use error::PipelineError;
pub use pipeline::{RunContext, RunOutput, StrategyPipeline};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a sweep worker builds or returns crosses threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::TradeSignal>();
        require_sync::<domain::TradeSignal>();
        require_send::<domain::TradeExecution>();
        require_sync::<domain::TradeExecution>();
        require_send::<domain::TrendState>();
        require_send::<domain::PullbackState>();

        // Results and errors
        require_send::<metrics::MetricsSummary>();
        require_sync::<metrics::MetricsSummary>();
        require_send::<RunOutput>();
        require_sync::<RunOutput>();
        require_send::<PipelineError>();
        require_sync::<PipelineError>();

        // Per-run machinery
        require_send::<StrategyPipeline>();
        require_send::<RunContext>();
        require_sync::<RunContext>();
        require_send::<params::StrategyParams>();
        require_sync::<params::StrategyParams>();
    }
}
