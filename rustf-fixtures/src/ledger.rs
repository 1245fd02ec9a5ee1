//! Persisted fixture and schema versions

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Versions the live fixtures were generated at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionState {
    /// Last applied fixture migration, 0 when none ran yet
    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub schema_version: i64,
}

impl VersionState {
    pub fn new(version: i64, schema_version: i64) -> Self {
        Self {
            version,
            schema_version,
        }
    }
}

/// Reads and writes the version ledger document
#[derive(Debug, Clone)]
pub struct VersionLedger {
    path: PathBuf,
}

impl VersionLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded versions; a missing ledger reads as `{0, 0}`
    pub fn load(&self) -> Result<VersionState> {
        if !self.path.exists() {
            return Ok(VersionState::default());
        }

        let contents = fs::read_to_string(&self.path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        if value.is_null() {
            return Ok(VersionState::default());
        }

        let state: VersionState = serde_yaml::from_value(value)
            .map_err(|e| Error::from(e).with_context(format!(
                "Invalid version ledger '{}'",
                self.path.display()
            )))?;
        if state.version < 0 {
            return Err(Error::invalid_config(format!(
                "Negative fixture version {} in '{}'",
                state.version,
                self.path.display()
            )));
        }
        Ok(state)
    }

    pub fn save(&self, state: VersionState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_yaml::to_string(&state)?)?;
        log::debug!(
            "Saved fixture version {} (schema {}) to {}",
            state.version,
            state.schema_version,
            self.path.display()
        );
        Ok(())
    }
}
