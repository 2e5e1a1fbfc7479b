//! Persisted run artifacts.
//!
//! An artifact carries everything needed to re-verify its reproducibility hash:
//! the resolved parameters, the data manifest and the run output.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pullback_core::fingerprint::{CanonicalizationError, Manifest};
use pullback_core::params::StrategyParams;
use pullback_core::RunOutput;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub params: StrategyParams,
    pub manifest: Manifest,
    pub output: RunOutput,
}

impl RunArtifact {
    pub fn new(params: StrategyParams, manifest: Manifest, output: RunOutput) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            params,
            manifest,
            output,
        }
    }

    pub fn pair(&self) -> &str {
        &self.output.pair
    }

    /// Does the stored hash still match the stored inputs?
    pub fn verify(&self) -> Result<bool, ArtifactError> {
        Ok(self.output.verify(&self.params, &self.manifest)?)
    }

    pub fn to_json(&self) -> Result<String, ArtifactError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let text = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}
