//! Error types for the Strata evolution engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// A shared error type for the entire Strata workspace.
///
/// Every variant is fatal to the run that produced it. Failures raised by an
/// individual change-script are not represented here: they are captured into
/// the state as [`RecordedError`](crate::state::RecordedError) and only their
/// count reaches the caller.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum StrataError {
    /// Invalid or missing run options, or a non-existent evolution path.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The evolution directory could not be listed.
    #[error("Cannot read evolution directory '{path}': {message}")]
    CatalogIo { path: String, message: String },

    /// The persisted state file exists but could not be parsed.
    #[error("Corrupt evolution state '{path}': {message}")]
    StateCorrupt { path: String, message: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// A change-script could not be resolved from its file.
    #[error("Cannot load change-script '{file}': {message}")]
    ScriptLoad { file: String, message: String },

    /// Connection or adapter registry error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StrataError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a CatalogIo error for the given directory
    pub fn catalog_io(path: &Path, message: impl Into<String>) -> Self {
        Self::CatalogIo {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Creates a StateCorrupt error for the given state file
    pub fn state_corrupt(path: &Path, message: impl Into<String>) -> Self {
        Self::StateCorrupt {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a ScriptLoad error for the given change-script file
    pub fn script_load(file: &Path, message: impl Into<String>) -> Self {
        Self::ScriptLoad {
            file: file.display().to_string(),
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a catalog error
    pub fn is_catalog_io(&self) -> bool {
        matches!(self, Self::CatalogIo { .. })
    }

    /// Check if this is a corrupt state error
    pub fn is_state_corrupt(&self) -> bool {
        matches!(self, Self::StateCorrupt { .. })
    }

    /// Check if this is an IO error
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Check if this is a connection error
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for StrataError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for StrataError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

/// A type alias for `Result<T, StrataError>`.
pub type Result<T> = std::result::Result<T, StrataError>;
