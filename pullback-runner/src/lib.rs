//! Pullback Runner: backtest orchestration around `pullback-core`.
//!
//! This crate provides:
//! - TOML configuration resolved into core parameters
//! - CSV ingestion with a BLAKE3-checksummed provenance manifest
//! - Seeded synthetic data
//! - Single runs producing verifiable JSON artifacts
//! - Parameter sweeps, parallel or sequential, with a fidelity cross-check
//! - Opt-in phase profiling

pub mod config;
pub mod data_loader;
pub mod profiling;
pub mod result;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{load_candles, LoadError, LoadedData};
pub use result::{ArtifactError, RunArtifact, SCHEMA_VERSION};
pub use runner::{run_backtest, run_loaded, DataSource, RunError};
pub use sweep::{check_parallel_fidelity, run_sweep, ParallelFidelity, ParamGrid, SweepError, SweepRun};
