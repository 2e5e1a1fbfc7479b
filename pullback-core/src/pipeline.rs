//! Strategy pipeline: one run over one candle series.
//!
//! Per candle, strictly in order: trend update, pullback update, signal evaluation,
//! risk sizing, execution. At most one position is open at a time. The pipeline owns
//! every stateful component, so a pipeline value is a single run and is consumed by it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, TradeExecution};
use crate::error::{DataIntegrityError, PipelineError};
use crate::execution::ExecutionSimulator;
use crate::fingerprint::{self, hash_run, CanonicalizationError, Manifest};
use crate::metrics::{MetricsAggregator, MetricsSummary};
use crate::params::StrategyParams;
use crate::risk::RiskManager;
use crate::strategy::{
    EmaTrendClassifier, PullbackDetector, PullbackSignalGenerator, SignalGenerator,
    TrendClassifier, ZonePullbackDetector,
};
use crate::telemetry::{in_phase, phase, NoopHooks, PhaseHooks};

/// Collaborators injected by whoever launches the run.
#[derive(Clone)]
pub struct RunContext {
    pub pair: String,
    pub manifest: Manifest,
    pub hooks: Arc<dyn PhaseHooks>,
    /// Parent span for every log event of the run.
    pub span: tracing::Span,
}

impl RunContext {
    pub fn new(pair: impl Into<String>) -> Self {
        let pair = pair.into();
        let span = tracing::info_span!("run", pair = %pair);
        Self {
            pair,
            manifest: Manifest::new(),
            hooks: Arc::new(NoopHooks),
            span,
        }
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PhaseHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }
}

/// What a completed run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub pair: String,
    pub summary: MetricsSummary,
    pub executions: Vec<TradeExecution>,
    pub signal_count: usize,
    /// Signals that produced no trade: no entry bar, or sized below one lot step.
    pub skipped_signals: usize,
    pub reproducibility_hash: String,
}

impl RunOutput {
    /// Recompute the reproducibility hash from the run's inputs and this output's metrics.
    pub fn verify(&self, params: &StrategyParams, manifest: &Manifest) -> Result<bool, CanonicalizationError> {
        let parameters = HashedParameters {
            pair: &self.pair,
            strategy: params,
        };
        fingerprint::verify(&self.reproducibility_hash, &parameters, manifest, &self.summary)
    }
}

/// The hashed parameter document: the pair plus every strategy parameter.
#[derive(Serialize)]
struct HashedParameters<'a> {
    pair: &'a str,
    strategy: &'a StrategyParams,
}

/// Checks ordering, gap tolerance and finite OHLC before any stage sees the data.
pub fn validate_candles(candles: &[Candle], max_gap_seconds: Option<i64>) -> Result<(), DataIntegrityError> {
    for (index, candle) in candles.iter().enumerate() {
        if let Some(field) = candle.non_finite_price_field() {
            return Err(DataIntegrityError::NonFinite {
                index,
                timestamp: candle.timestamp,
                field,
            });
        }
        let Some(prev) = index.checked_sub(1).map(|i| &candles[i]) else {
            continue;
        };
        if candle.timestamp < prev.timestamp {
            return Err(DataIntegrityError::OutOfOrder {
                index,
                timestamp: candle.timestamp,
                previous: prev.timestamp,
            });
        }
        if let Some(tolerance) = max_gap_seconds {
            let gap = (candle.timestamp - prev.timestamp).num_seconds();
            if gap > tolerance {
                return Err(DataIntegrityError::Gap {
                    index,
                    timestamp: candle.timestamp,
                    gap_seconds: gap,
                    tolerance_seconds: tolerance,
                });
            }
        }
    }
    Ok(())
}

struct StrategyPass {
    executions: Vec<TradeExecution>,
    metrics: MetricsAggregator,
    signal_count: usize,
    skipped_signals: usize,
}

pub struct StrategyPipeline {
    params: StrategyParams,
    ctx: RunContext,
    trend: Box<dyn TrendClassifier>,
    pullback: Box<dyn PullbackDetector>,
    signals: Box<dyn SignalGenerator>,
    simulator: ExecutionSimulator,
    risk: RiskManager,
}

impl StrategyPipeline {
    pub fn new(params: StrategyParams, ctx: RunContext) -> Self {
        let trend = Box::new(EmaTrendClassifier::new(params.trend.clone()));
        let pullback = Box::new(ZonePullbackDetector::new(params.pullback.clone()));
        let signals = Box::new(PullbackSignalGenerator::new(
            ctx.pair.clone(),
            params.risk.risk_per_trade_pct,
            params.signal.clone(),
            params.pullback.clone(),
        ));
        let simulator = ExecutionSimulator::new(
            params.execution.clone(),
            params.risk.pip_size,
            params.risk.pip_value,
        );
        let risk = RiskManager::new(params.risk.clone());
        Self {
            params,
            ctx,
            trend,
            pullback,
            signals,
            simulator,
            risk,
        }
    }

    /// Swap in alternative stage implementations.
    pub fn with_components(
        mut self,
        trend: Box<dyn TrendClassifier>,
        pullback: Box<dyn PullbackDetector>,
        signals: Box<dyn SignalGenerator>,
    ) -> Self {
        self.trend = trend;
        self.pullback = pullback;
        self.signals = signals;
        self
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Pull every candle from a lazy supplier, stopping at its first error.
    pub fn run_source<I>(self, source: I) -> Result<RunOutput, PipelineError>
    where
        I: IntoIterator<Item = Result<Candle, DataIntegrityError>>,
    {
        let candles = source.into_iter().collect::<Result<Vec<_>, _>>()?;
        self.run(&candles)
    }

    pub fn run(mut self, candles: &[Candle]) -> Result<RunOutput, PipelineError> {
        let span = self.ctx.span.clone();
        let _guard = span.enter();
        let hooks = Arc::clone(&self.ctx.hooks);
        tracing::info!(candles = candles.len(), "run started");

        in_phase(hooks.as_ref(), phase::VALIDATE, || {
            validate_candles(candles, self.params.data.max_gap_seconds)
        })?;

        let pass = in_phase(hooks.as_ref(), phase::STRATEGY, || self.drive(candles))?;

        let summary = in_phase(hooks.as_ref(), phase::METRICS, || pass.metrics.finalize());

        let reproducibility_hash = in_phase(hooks.as_ref(), phase::HASH, || {
            let parameters = HashedParameters {
                pair: &self.ctx.pair,
                strategy: &self.params,
            };
            hash_run(&parameters, &self.ctx.manifest, &summary)
        })?;

        tracing::info!(
            trades = summary.trade_count,
            total_r = summary.total_r,
            win_rate = summary.win_rate,
            hash = %reproducibility_hash,
            "run finished"
        );

        Ok(RunOutput {
            pair: self.ctx.pair,
            summary,
            executions: pass.executions,
            signal_count: pass.signal_count,
            skipped_signals: pass.skipped_signals,
            reproducibility_hash,
        })
    }

    fn drive(&mut self, candles: &[Candle]) -> Result<StrategyPass, PipelineError> {
        let mut pass = StrategyPass {
            executions: Vec::new(),
            metrics: MetricsAggregator::new(),
            signal_count: 0,
            skipped_signals: 0,
        };
        let mut busy_until: Option<usize> = None;

        for (index, candle) in candles.iter().enumerate() {
            let trend = self.trend.update(candle);
            let pullback = self.pullback.update(candle, &trend);

            if busy_until.is_some_and(|exit| index <= exit) {
                continue;
            }
            let Some(signal) = self
                .signals
                .evaluate(candles, index, &trend, pullback.as_ref())
            else {
                continue;
            };
            pass.signal_count += 1;
            self.pullback.reset();
            tracing::debug!(
                signal_id = %signal.id,
                direction = signal.direction.as_str(),
                entry = signal.entry_price,
                stop = signal.initial_stop_price,
                "signal"
            );

            if index + 1 >= candles.len() {
                tracing::debug!(signal_id = %signal.id, "no entry bar after signal, skipped");
                pass.skipped_signals += 1;
                continue;
            }

            self.risk.check_limits()?;
            let sized = self.risk.size_signal(&signal)?;
            if sized.calc_position_size.unwrap_or(0.0) <= 0.0 {
                tracing::warn!(
                    signal_id = %signal.id,
                    equity = self.risk.equity(),
                    "position rounds below one lot step, skipped"
                );
                pass.skipped_signals += 1;
                continue;
            }

            let execution = self.simulator.execute(&sized, candles, index)?;
            let risked = self.risk.risked_amount(&sized);
            self.risk.record_outcome(&execution, risked);
            pass.metrics.ingest(&execution)?;
            busy_until = Some(execution.exit_index);
            pass.executions.push(execution);
        }

        Ok(pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, PullbackState, SignalId, TradeSignal, TrendState};
    use crate::error::RiskLimitKind;
    use crate::params::SlippageParams;
    use crate::strategy::test_support::{candle, ts};

    /// Emits a long signal on every listed bar, ignoring trend and pullback.
    struct ScriptedSignals(Vec<usize>);

    impl SignalGenerator for ScriptedSignals {
        fn evaluate(
            &self,
            candles: &[Candle],
            index: usize,
            _trend: &TrendState,
            _pullback: Option<&PullbackState>,
        ) -> Option<TradeSignal> {
            if !self.0.contains(&index) {
                return None;
            }
            let c = &candles[index];
            Some(TradeSignal {
                id: SignalId::compute(c.timestamp, "EURUSD", Direction::Long, c.close, "test"),
                timestamp: c.timestamp,
                pair: "EURUSD".into(),
                direction: Direction::Long,
                entry_price: c.close,
                initial_stop_price: c.close - 0.0010,
                risk_per_trade_pct: 0.25,
                calc_position_size: None,
                take_profit_price: None,
                atr: 0.0010,
                tags: Vec::new(),
                version: "test".into(),
            })
        }
    }

    fn params() -> StrategyParams {
        let mut p = StrategyParams::default();
        p.execution.slippage = SlippageParams::None;
        p.execution.spread_pips = 0.0;
        p.execution.commission_per_lot = 0.0;
        p.execution.trailing = None;
        p
    }

    fn scripted(params: StrategyParams, bars: Vec<usize>) -> StrategyPipeline {
        StrategyPipeline::new(params.clone(), RunContext::new("EURUSD")).with_components(
            Box::new(EmaTrendClassifier::new(params.trend.clone())),
            Box::new(ZonePullbackDetector::new(params.pullback.clone())),
            Box::new(ScriptedSignals(bars)),
        )
    }

    /// Flat bars at 1.1000 with a sharp drop on `drop_at` that stops out any long.
    fn series(len: usize, drop_at: &[usize]) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                if drop_at.contains(&i) {
                    candle(i, 1.1000, 1.1001, 1.0980, 1.0985)
                } else {
                    candle(i, 1.1000, 1.1005, 1.0995, 1.1000)
                }
            })
            .collect()
    }

    #[test]
    fn out_of_order_candles_abort() {
        let mut candles = series(5, &[]);
        candles[3].timestamp = ts(1);
        let err = scripted(params(), vec![]).run(&candles).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DataIntegrity(DataIntegrityError::OutOfOrder { index: 3, .. })
        ));
    }

    #[test]
    fn gap_beyond_tolerance_aborts() {
        let mut p = params();
        p.data.max_gap_seconds = Some(3600);
        let mut candles = series(5, &[]);
        for (i, c) in candles.iter_mut().enumerate().skip(3) {
            c.timestamp = ts(i + 2);
        }
        let err = scripted(p, vec![]).run(&candles).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DataIntegrity(DataIntegrityError::Gap {
                index: 3,
                gap_seconds: 10800,
                ..
            })
        ));
    }

    #[test]
    fn non_finite_price_aborts() {
        let mut candles = series(5, &[]);
        candles[2].high = f64::NAN;
        let err = scripted(params(), vec![]).run(&candles).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DataIntegrity(DataIntegrityError::NonFinite { index: 2, field: "high", .. })
        ));
    }

    #[test]
    fn supplier_error_propagates() {
        let source = vec![
            Ok(candle(0, 1.1, 1.1, 1.1, 1.1)),
            Err(DataIntegrityError::Source {
                row: 2,
                reason: "checksum mismatch".into(),
            }),
        ];
        let err = scripted(params(), vec![]).run_source(source).unwrap_err();
        assert!(matches!(err, PipelineError::DataIntegrity(DataIntegrityError::Source { row: 2, .. })));
    }

    #[test]
    fn one_position_at_a_time() {
        // signal on 2 enters on 3 and stops out on 5; the signal on 4 is ignored
        let candles = series(10, &[5]);
        let out = scripted(params(), vec![2, 4, 7]).run(&candles).unwrap();
        assert_eq!(out.executions.len(), 2);
        assert_eq!(out.executions[0].exit_index, 5);
        assert_eq!(out.executions[1].entry_index, 8);
        assert_eq!(out.signal_count, 2);
    }

    #[test]
    fn signal_on_last_bar_is_skipped() {
        let candles = series(4, &[]);
        let out = scripted(params(), vec![3]).run(&candles).unwrap();
        assert!(out.executions.is_empty());
        assert_eq!(out.signal_count, 1);
        assert_eq!(out.skipped_signals, 1);
    }

    #[test]
    fn drawdown_breach_aborts_before_next_sizing() {
        let mut p = params();
        p.risk.max_drawdown_r = 2.0;
        // each drop bar stops the open long out at -1R
        let candles = series(12, &[2, 5, 8]);
        let err = scripted(p, vec![0, 3, 6, 9]).run(&candles).unwrap_err();
        match err {
            PipelineError::RiskLimit(e) => {
                assert_eq!(e.limit_type, RiskLimitKind::Drawdown);
                assert!(e.current >= 2.0);
            }
            other => panic!("expected drawdown breach, got {other:?}"),
        }
    }

    #[test]
    fn identical_runs_share_hash() {
        let candles = series(10, &[5]);
        let first = scripted(params(), vec![2, 7]).run(&candles).unwrap();
        for _ in 0..3 {
            let again = scripted(params(), vec![2, 7]).run(&candles).unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn manifest_feeds_the_hash() {
        let candles = series(6, &[]);
        let plain = scripted(params(), vec![]).run(&candles).unwrap();
        let mut manifest = Manifest::new();
        manifest.insert("rows".into(), serde_json::json!(6));
        let p = params();
        let tagged = StrategyPipeline::new(p, RunContext::new("EURUSD").with_manifest(manifest))
            .run(&candles)
            .unwrap();
        assert_ne!(plain.reproducibility_hash, tagged.reproducibility_hash);
    }
}
