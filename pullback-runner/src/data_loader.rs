//! CSV candle loading and dataset manifests.
//!
//! Input is one row per bar: `timestamp,open,high,low,close,volume`, timestamps in
//! RFC 3339 or `%Y-%m-%d %H:%M:%S` (read as UTC). The file is read once: its BLAKE3
//! checksum goes into the manifest and its rows are enriched with indicators.
//!
//! Row order is preserved as-is. Ordering and gap checks belong to the pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use pullback_core::domain::{Candle, RawBar};
use pullback_core::error::ValidationError;
use pullback_core::fingerprint::Manifest;
use pullback_core::indicators::enrich;
use pullback_core::params::IndicatorParams;

const NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV at data row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error("unparseable timestamp {value:?} at data row {row}")]
    Timestamp { row: usize, value: String },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} contains no bars", path.display())]
    Empty { path: PathBuf },
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("indicator error: {0}")]
    Indicators(#[from] ValidationError),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Enriched candles plus the provenance manifest that goes into the run hash.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub candles: Vec<Candle>,
    pub manifest: Manifest,
    /// BLAKE3 hex digest of the source bytes.
    pub checksum: String,
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, NAIVE_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Parse CSV bytes into raw bars. Row numbers in errors are 1-based data rows.
pub fn parse_bars(bytes: &[u8]) -> Result<Vec<RawBar>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let mut bars = Vec::new();
    for (i, record) in reader.deserialize::<CsvRow>().enumerate() {
        let row = i + 1;
        let record = record.map_err(|source| LoadError::Csv { row, source })?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
            row,
            value: record.timestamp.clone(),
        })?;
        bars.push(RawBar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    Ok(bars)
}

pub fn file_checksum(path: &Path) -> Result<String, LoadError> {
    let bytes = read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn read(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write bars in the layout `parse_bars` reads.
pub fn write_csv(path: &Path, bars: &[RawBar]) -> Result<(), LoadError> {
    let write_err = |source| LoadError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    for bar in bars {
        writer.serialize(bar).map_err(write_err)?;
    }
    writer.flush().map_err(|e| write_err(e.into()))?;
    Ok(())
}

/// Provenance for a bar series: where it came from and what it contained.
pub fn build_manifest(source: &str, pair: &str, checksum: &str, bars: &[RawBar]) -> Manifest {
    let mut manifest = Manifest::new();
    manifest.insert("source".into(), json!(source));
    manifest.insert("pair".into(), json!(pair));
    manifest.insert("checksum_blake3".into(), json!(checksum));
    manifest.insert("row_count".into(), json!(bars.len()));
    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        manifest.insert("first_timestamp".into(), json!(first.timestamp.to_rfc3339()));
        manifest.insert("last_timestamp".into(), json!(last.timestamp.to_rfc3339()));
    }
    manifest
}

pub fn load_candles(path: &Path, pair: &str, indicators: &IndicatorParams) -> Result<LoadedData, LoadError> {
    load_candles_checked(path, pair, indicators, None)
}

/// Like `load_candles`, but refuses the file before parsing if its checksum differs.
pub fn load_candles_checked(
    path: &Path,
    pair: &str,
    indicators: &IndicatorParams,
    expected_checksum: Option<&str>,
) -> Result<LoadedData, LoadError> {
    let bytes = read(path)?;
    let checksum = blake3::hash(&bytes).to_hex().to_string();
    if let Some(expected) = expected_checksum {
        if !expected.eq_ignore_ascii_case(&checksum) {
            return Err(LoadError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.to_string(),
                actual: checksum,
            });
        }
    }

    let bars = parse_bars(&bytes)?;
    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    let manifest = build_manifest(&path.display().to_string(), pair, &checksum, &bars);
    let candles = enrich(&bars, indicators)?;
    tracing::info!(
        path = %path.display(),
        rows = bars.len(),
        checksum = %checksum,
        "loaded candles"
    );
    Ok(LoadedData {
        candles,
        manifest,
        checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CSV: &str = "\
timestamp,open,high,low,close,volume
2024-03-15T14:00:00Z,1.0920,1.0930,1.0915,1.0925,1200
2024-03-15 15:00:00,1.0925,1.0940,1.0920,1.0938,900
";

    #[test]
    fn parses_both_timestamp_formats() {
        let bars = parse_bars(CSV.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap());
        assert_eq!(bars[1].timestamp, Utc.with_ymd_and_hms(2024, 3, 15, 15, 0, 0).unwrap());
        assert_eq!(bars[1].close, 1.0938);
    }

    #[test]
    fn offset_timestamps_normalize_to_utc() {
        let ts = parse_timestamp("2024-03-15T16:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap());
    }

    #[test]
    fn bad_timestamp_reports_row() {
        let csv = "timestamp,open,high,low,close,volume\n2024-03-15T14:00:00Z,1,1,1,1,1\nyesterday,1,1,1,1,1\n";
        let err = parse_bars(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Timestamp { row: 2, .. }));
    }

    #[test]
    fn bad_number_reports_row() {
        let csv = "timestamp,open,high,low,close,volume\n2024-03-15T14:00:00Z,abc,1,1,1,1\n";
        let err = parse_bars(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Csv { row: 1, .. }));
    }

    #[test]
    fn manifest_records_provenance() {
        let bars = parse_bars(CSV.as_bytes()).unwrap();
        let manifest = build_manifest("mem", "EURUSD", "abc", &bars);
        assert_eq!(manifest["row_count"], json!(2));
        assert_eq!(manifest["pair"], json!("EURUSD"));
        assert_eq!(manifest["first_timestamp"], json!("2024-03-15T14:00:00+00:00"));
    }
}
