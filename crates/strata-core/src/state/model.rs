//! Evolution state domain models.
//!
//! Contains the applied-state of one evolution directory as the orchestrator
//! sees it during a run. All paths here are absolute; converting them to the
//! portable on-disk form is the repository's job.

use crate::version::INITIAL_VERSION;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Evolution states keyed by absolute evolution directory.
pub type StateMap = BTreeMap<PathBuf, EvolutionState>;

/// The change-script operation that last failed on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptMethod {
    Evolve,
    Rollback,
}

impl ScriptMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ScriptMethod::Evolve => "evolve",
            ScriptMethod::Rollback => "rollback",
        }
    }
}

impl std::fmt::Display for ScriptMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured change-script failure, stored as an opaque record.
///
/// Only `message` is meaningful to the engine: a record counts as a warning
/// when it carries a non-empty message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedError {
    pub message: String,
    /// Underlying causes, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl RecordedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Captures an `anyhow` error together with its cause chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            causes: err.chain().skip(1).map(|cause| cause.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.message.trim().is_empty()
    }
}

impl std::fmt::Display for RecordedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.causes {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

/// One change-script currently considered applied to the subject.
///
/// `method` and `error` are only set when the last operation on this record
/// failed. A failed record stays active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionRecord {
    /// Absolute path of the change-script file.
    pub file: PathBuf,
    /// When the last operation on this record ran (Unix epoch milliseconds).
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ScriptMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordedError>,
    /// Timestamp of the record before a failed rollback replaced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_timestamp: Option<i64>,
}

impl EvolutionRecord {
    /// A cleanly applied change-script.
    pub fn applied(file: PathBuf, timestamp: i64) -> Self {
        Self {
            file,
            timestamp,
            method: None,
            error: None,
            previous_timestamp: None,
        }
    }

    /// A change-script whose evolve failed. It is still recorded as active.
    pub fn failed_evolve(file: PathBuf, error: RecordedError, timestamp: i64) -> Self {
        Self {
            file,
            timestamp,
            method: Some(ScriptMethod::Evolve),
            error: Some(error),
            previous_timestamp: None,
        }
    }

    /// Replacement for `self` after its rollback failed.
    pub fn failed_rollback(&self, error: RecordedError, timestamp: i64) -> Self {
        Self {
            file: self.file.clone(),
            timestamp,
            method: Some(ScriptMethod::Rollback),
            error: Some(error),
            previous_timestamp: Some(self.timestamp),
        }
    }

    /// Returns true if the last operation on this record failed.
    pub fn has_error(&self) -> bool {
        self.error.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Applied-state of one evolution directory.
///
/// `active_evolutions` is kept in application order (ascending version), so
/// iterating it backwards gives the rollback order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionState {
    pub current_version: Version,
    pub active_evolutions: Vec<EvolutionRecord>,
}

impl Default for EvolutionState {
    fn default() -> Self {
        Self {
            current_version: INITIAL_VERSION,
            active_evolutions: Vec::new(),
        }
    }
}

impl EvolutionState {
    /// Returns true if `file` is currently recorded as applied.
    pub fn is_active(&self, file: &Path) -> bool {
        self.active_evolutions.iter().any(|r| r.file == file)
    }

    /// Number of active records left in an error state.
    pub fn warning_count(&self) -> usize {
        self.active_evolutions.iter().filter(|r| r.has_error()).count()
    }

    /// Active records whose last operation failed.
    pub fn failed_records(&self) -> impl Iterator<Item = &EvolutionRecord> {
        self.active_evolutions.iter().filter(|r| r.has_error())
    }
}
