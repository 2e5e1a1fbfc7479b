use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::signal::Direction;

/// Number of hex characters kept from the SHA-256 digest.
pub const SIGNAL_ID_LEN: usize = 16;

/// Deterministic signal identity.
///
/// Derived from `timestamp|pair|direction|entry_price|version`, so the same candle
/// history and parameters always yield the same id, regardless of run or thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(pub String);

impl SignalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Compute the id: first 16 lowercase hex chars of SHA-256 over the pipe-joined fields.
    ///
    /// Timestamps render as RFC 3339 with a `+00:00` offset; prices use Rust's shortest
    /// round-trip float formatting, which is stable across platforms.
    pub fn compute(
        timestamp: DateTime<Utc>,
        pair: &str,
        direction: Direction,
        entry_price: f64,
        version: &str,
    ) -> Self {
        let payload = format!(
            "{}|{}|{}|{}|{}",
            timestamp.to_rfc3339(),
            pair,
            direction.as_str(),
            entry_price,
            version
        );
        let digest = Sha256::digest(payload.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(SIGNAL_ID_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
