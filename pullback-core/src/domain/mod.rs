//! Domain types for the pullback strategy core

pub mod candle;
pub mod execution;
pub mod ids;
pub mod signal;
pub mod state;

pub use candle::{Candle, RawBar};
pub use execution::{ExitReason, TradeExecution};
pub use ids::SignalId;
pub use signal::{Direction, TradeSignal};
pub use state::{PullbackState, Trend, TrendState};
