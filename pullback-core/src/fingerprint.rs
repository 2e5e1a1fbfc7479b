//! Run fingerprinting: a reproducibility hash over parameters, manifest and metrics.
//!
//! The three inputs are lowered to `serde_json::Value`, written as canonical JSON
//! (object keys sorted at every depth, no whitespace) under the top-level keys
//! `manifest`, `metrics`, `parameters`, and hashed with SHA-256. Key order in the
//! inputs never affects the hash; any change in content does.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::metrics::MetricsSummary;

/// Dataset provenance supplied by the caller and hashed verbatim.
pub type Manifest = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot canonicalize {section}: {reason}")]
pub struct CanonicalizationError {
    pub section: &'static str,
    pub reason: String,
}

fn to_value(section: &'static str, input: &impl Serialize) -> Result<Value, CanonicalizationError> {
    serde_json::to_value(input).map_err(|e| CanonicalizationError {
        section,
        reason: e.to_string(),
    })
}

/// Compact JSON with recursively sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 (lowercase hex) of the canonical `{manifest, metrics, parameters}` document.
pub fn hash_run(
    parameters: &impl Serialize,
    manifest: &Manifest,
    metrics: &MetricsSummary,
) -> Result<String, CanonicalizationError> {
    let mut document = serde_json::Map::new();
    document.insert("manifest".into(), to_value("manifest", manifest)?);
    document.insert("metrics".into(), to_value("metrics", metrics)?);
    document.insert("parameters".into(), to_value("parameters", parameters)?);

    let canonical = canonical_json(&Value::Object(document));
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Recompute the hash and compare with `run_hash`.
pub fn verify(
    run_hash: &str,
    parameters: &impl Serialize,
    manifest: &Manifest,
    metrics: &MetricsSummary,
) -> Result<bool, CanonicalizationError> {
    Ok(hash_run(parameters, manifest, metrics)? == run_hash)
}
