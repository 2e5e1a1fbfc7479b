//! Property tests for runner invariants.
//!
//! Properties tested:
//! 1. Grid expansion: `generate` yields exactly `size()` parameter sets
//! 2. Synthetic data: bars are well-formed for any seed
//! 3. Timestamp parsing: both accepted layouts name the same instant

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use pullback_core::params::StrategyParams;
use pullback_runner::data_loader::parse_timestamp;
use pullback_runner::synthetic::generate_trending_bars;
use pullback_runner::ParamGrid;

proptest! {
    #[test]
    fn grid_generates_size_sets(
        stops in prop::collection::vec(0.5f64..3.0, 0..4),
        risks in prop::collection::vec(0.1f64..2.0, 0..4),
        tps in prop::collection::vec(1.0f64..4.0, 0..3),
    ) {
        let grid = ParamGrid {
            stop_loss_atr_multipliers: stops,
            risk_per_trade_pcts: risks,
            take_profit_rs: tps,
        };
        let sets = grid.generate(&StrategyParams::default());
        prop_assert_eq!(sets.len(), grid.size());
    }

    #[test]
    fn synthetic_bars_well_formed(seed in any::<u64>(), n in 1usize..300) {
        let bars = generate_trending_bars(n, seed);
        prop_assert_eq!(bars.len(), n);
        for bar in &bars {
            prop_assert!(bar.low <= bar.open.min(bar.close));
            prop_assert!(bar.high >= bar.open.max(bar.close));
            prop_assert!(bar.low > 0.0);
        }
    }

    #[test]
    fn timestamp_layouts_agree(secs in 0i64..4_000_000_000) {
        let ts = Utc.timestamp_opt(secs, 0).unwrap();
        let rfc = ts.to_rfc3339();
        let naive = ts.format("%Y-%m-%d %H:%M:%S").to_string();
        prop_assert_eq!(parse_timestamp(&rfc), Some(ts));
        prop_assert_eq!(parse_timestamp(&naive), Some(ts));
    }
}
