//! TradeSignal: an immutable entry decision emitted by the signal generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SignalId;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }

    /// +1.0 for long, -1.0 for short. Multiplies price moves into signed profit.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// Immutable trade signal.
///
/// Created by the signal generator with `calc_position_size` and `take_profit_price`
/// unset; the risk manager returns an enriched copy rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub id: SignalId,
    pub timestamp: DateTime<Utc>,
    pub pair: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub initial_stop_price: f64,
    pub risk_per_trade_pct: f64,
    pub calc_position_size: Option<f64>,
    pub take_profit_price: Option<f64>,
    /// ATR at the signal bar; used for trailing and slippage models.
    pub atr: f64,
    pub tags: Vec<String>,
    pub version: String,
}

impl TradeSignal {
    /// Absolute price distance between entry and initial stop.
    pub fn risk_distance(&self) -> f64 {
        (self.entry_price - self.initial_stop_price).abs()
    }

    /// Copy of this signal with sizing and target filled in.
    pub fn sized(&self, position_size: f64, take_profit_price: f64) -> Self {
        Self {
            calc_position_size: Some(position_size),
            take_profit_price: Some(take_profit_price),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> TradeSignal {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        TradeSignal {
            id: SignalId::compute(timestamp, "EURUSD", Direction::Long, 1.1, "1.0.0"),
            timestamp,
            pair: "EURUSD".into(),
            direction: Direction::Long,
            entry_price: 1.1,
            initial_stop_price: 1.099,
            risk_per_trade_pct: 0.25,
            calc_position_size: None,
            take_profit_price: None,
            atr: 0.0005,
            tags: vec!["pullback".into()],
            version: "1.0.0".into(),
        }
    }

    #[test]
    fn sized_returns_new_signal_and_keeps_original() {
        let signal = sample();
        let sized = signal.sized(0.12, 1.102);
        assert_eq!(signal.calc_position_size, None);
        assert_eq!(sized.calc_position_size, Some(0.12));
        assert_eq!(sized.take_profit_price, Some(1.102));
        assert_eq!(sized.id, signal.id);
    }

    #[test]
    fn direction_serializes_screaming() {
        assert_eq!(serde_json::to_string(&Direction::Long).unwrap(), "\"LONG\"");
        assert_eq!(Direction::Short.sign(), -1.0);
    }
}
