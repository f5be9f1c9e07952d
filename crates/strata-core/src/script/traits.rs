//! Core traits for change-scripts and their loaders.

use crate::error::Result;
use crate::subject::Subject;
use async_trait::async_trait;
use semver::VersionReq;
use std::path::Path;
use std::sync::Arc;

/// A versioned unit of change applied to a subject.
///
/// The version of a script is taken from its catalog file name, never from
/// the script itself.
#[async_trait]
pub trait ChangeScript<S: Subject>: Send + Sync {
    /// Range of target versions this script may be evolved or kept for.
    ///
    /// A target outside the range skips the script during evolve and forces
    /// a rollback if the script is active.
    fn satisfies(&self) -> Option<&VersionReq> {
        None
    }

    /// Returns a human-readable description of this script.
    ///
    /// Used for logging and debugging purposes.
    fn description(&self) -> &str {
        ""
    }

    /// Applies the change to the subject.
    ///
    /// # Errors
    ///
    /// A failure does not abort the run. It is recorded on the script's
    /// evolution record and counted as a warning.
    async fn evolve(&self, subject: &S) -> anyhow::Result<()>;

    /// Reverts the change from the subject.
    ///
    /// # Errors
    ///
    /// Same as [`evolve`](Self::evolve): recorded, not propagated.
    async fn rollback(&self, subject: &S) -> anyhow::Result<()>;
}

/// Resolves a catalog file to the change-script it stands for.
#[async_trait]
pub trait ScriptLoader<S: Subject>: Send + Sync {
    /// Loads the change-script backing `file`.
    ///
    /// `extension` is the catalog's script extension; the rest of the file
    /// name is the script's version.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::ScriptLoad` if the file cannot be turned into a
    /// script.
    async fn load(&self, file: &Path, extension: &str) -> Result<Arc<dyn ChangeScript<S>>>;
}
