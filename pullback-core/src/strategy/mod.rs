//! Stateful strategy stages: trend → pullback → signal.
//!
//! Each stage is a narrow trait with one concrete implementation, so tests can swap in
//! doubles. State is owned by the run that created the stage; nothing is shared.

pub mod pullback;
pub mod signal;
pub mod trend;

pub use pullback::{PullbackDetector, ZonePullbackDetector};
pub use signal::{PullbackSignalGenerator, SignalGenerator};
pub use trend::{EmaTrendClassifier, TrendClassifier};
