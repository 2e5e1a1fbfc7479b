//! Slippage models: adverse fill adjustment, in pips.
//!
//! - Entries and stop-driven exits always pay slippage.
//! - Take-profit exits fill passively at the target and pay none.

use crate::domain::{Candle, TradeSignal};
use crate::params::SlippageParams;

pub trait SlippageModel: Send + Sync {
    /// Adverse slippage applied to the entry fill.
    fn entry_pips(&self, candle: &Candle, signal: &TradeSignal) -> f64;

    /// Adverse slippage applied to stop, trailing, and expiry exits.
    fn exit_pips(&self, candle: &Candle, signal: &TradeSignal) -> f64;

    fn name(&self) -> &str;
}

/// Constant slippage in pips.
#[derive(Debug, Clone, Copy)]
pub struct FixedPipSlippage {
    pub entry_pips: f64,
    pub exit_pips: f64,
}

impl SlippageModel for FixedPipSlippage {
    fn entry_pips(&self, _candle: &Candle, _signal: &TradeSignal) -> f64 {
        self.entry_pips
    }

    fn exit_pips(&self, _candle: &Candle, _signal: &TradeSignal) -> f64 {
        self.exit_pips
    }

    fn name(&self) -> &str {
        "fixed_pips"
    }
}

/// Slippage scaling with volatility: a fraction of the bar's ATR.
///
/// Falls back to the ATR recorded on the signal when the bar's ATR is unusable.
#[derive(Debug, Clone, Copy)]
pub struct AtrSlippage {
    pub fraction: f64,
    pub pip_size: f64,
}

impl AtrSlippage {
    fn pips(&self, candle: &Candle, signal: &TradeSignal) -> f64 {
        let atr = if candle.atr.is_finite() && candle.atr > 0.0 {
            candle.atr
        } else {
            signal.atr
        };
        atr * self.fraction / self.pip_size
    }
}

impl SlippageModel for AtrSlippage {
    fn entry_pips(&self, candle: &Candle, signal: &TradeSignal) -> f64 {
        self.pips(candle, signal)
    }

    fn exit_pips(&self, candle: &Candle, signal: &TradeSignal) -> f64 {
        self.pips(candle, signal)
    }

    fn name(&self) -> &str {
        "atr_fraction"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSlippage;

impl SlippageModel for NoSlippage {
    fn entry_pips(&self, _candle: &Candle, _signal: &TradeSignal) -> f64 {
        0.0
    }

    fn exit_pips(&self, _candle: &Candle, _signal: &TradeSignal) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "none"
    }
}

pub fn slippage_from_params(params: &SlippageParams, pip_size: f64) -> Box<dyn SlippageModel> {
    match *params {
        SlippageParams::Fixed {
            entry_pips,
            exit_pips,
        } => Box::new(FixedPipSlippage {
            entry_pips,
            exit_pips,
        }),
        SlippageParams::AtrFraction { fraction } => Box::new(AtrSlippage { fraction, pip_size }),
        SlippageParams::None => Box::new(NoSlippage),
    }
}
