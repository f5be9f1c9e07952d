//! Persisted evolution state DTOs.
//!
//! The state file is a JSON object keyed by evolution directory:
//!
//! ```json
//! {
//!   "evolutions": {
//!     "currentVersion": "1.2.0",
//!     "activeEvolutions": [
//!       { "file": "1.0.0.toml", "timestamp": 1700000000000 },
//!       {
//!         "file": "1.2.0.toml",
//!         "timestamp": 1700000005000,
//!         "method": "evolve",
//!         "error": { "message": "exit status 1" }
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! Keys are relative to the state file's directory and record files are
//! relative to their evolution directory. Conversion to the absolute-path
//! domain model happens in [`state_file_into_domain`].

use crate::paths;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use strata_core::state::{EvolutionRecord, EvolutionState, RecordedError, ScriptMethod, StateMap};

/// Whole state file: directory key to state.
pub type StateFileDto = BTreeMap<String, EvolutionStateDto>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionStateDto {
    pub current_version: String,
    #[serde(default)]
    pub active_evolutions: Vec<EvolutionRecordDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionRecordDto {
    /// Path relative to the evolution directory.
    pub file: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ScriptMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_timestamp: Option<i64>,
}

/// Stored failure. Written as a structured record; plain strings and other
/// JSON values from hand-edited files are accepted on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDto {
    Record(RecordedError),
    Text(String),
    Opaque(serde_json::Value),
}

impl From<ErrorDto> for RecordedError {
    fn from(dto: ErrorDto) -> Self {
        match dto {
            ErrorDto::Record(record) => record,
            ErrorDto::Text(message) => RecordedError::new(message),
            ErrorDto::Opaque(value) => RecordedError::new(value.to_string()),
        }
    }
}

impl EvolutionRecordDto {
    fn from_domain(evolution_dir: &Path, record: &EvolutionRecord) -> Self {
        Self {
            file: paths::to_portable(&paths::relative_path(evolution_dir, &record.file)),
            timestamp: record.timestamp,
            method: record.method,
            error: record.error.clone().map(ErrorDto::Record),
            previous_timestamp: record.previous_timestamp,
        }
    }

    fn into_domain(self, evolution_dir: &Path) -> EvolutionRecord {
        EvolutionRecord {
            file: paths::from_portable(evolution_dir, &self.file),
            timestamp: self.timestamp,
            method: self.method,
            error: self.error.map(RecordedError::from),
            previous_timestamp: self.previous_timestamp,
        }
    }
}

impl EvolutionStateDto {
    pub fn from_domain(evolution_dir: &Path, state: &EvolutionState) -> Self {
        Self {
            current_version: state.current_version.to_string(),
            active_evolutions: state
                .active_evolutions
                .iter()
                .map(|r| EvolutionRecordDto::from_domain(evolution_dir, r))
                .collect(),
        }
    }

    /// Converts to the domain model, resolving record files against
    /// `evolution_dir`.
    ///
    /// # Errors
    ///
    /// Returns a message if `currentVersion` is not a valid semantic version.
    pub fn into_domain(self, evolution_dir: &Path) -> Result<EvolutionState, String> {
        let current_version = Version::parse(&self.current_version).map_err(|e| {
            format!(
                "invalid currentVersion `{}` for {}: {}",
                self.current_version,
                evolution_dir.display(),
                e
            )
        })?;

        Ok(EvolutionState {
            current_version,
            active_evolutions: self
                .active_evolutions
                .into_iter()
                .map(|r| r.into_domain(evolution_dir))
                .collect(),
        })
    }
}

/// Converts an in-memory state map to the on-disk form.
pub fn state_file_from_domain(base_dir: &Path, states: &StateMap) -> StateFileDto {
    states
        .iter()
        .map(|(dir, state)| {
            let key = paths::to_portable(&paths::relative_path(base_dir, dir));
            (key, EvolutionStateDto::from_domain(dir, state))
        })
        .collect()
}

/// Converts the on-disk form to an in-memory state map.
pub fn state_file_into_domain(base_dir: &Path, dto: StateFileDto) -> Result<StateMap, String> {
    dto.into_iter()
        .map(|(key, state)| {
            let dir = paths::from_portable(base_dir, &key);
            let state = state.into_domain(&dir)?;
            Ok((dir, state))
        })
        .collect()
}
