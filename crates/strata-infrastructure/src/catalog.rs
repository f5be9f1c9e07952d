//! Change-script catalog: discovers versioned script files in a directory.

use semver::Version;
use std::path::{Path, PathBuf};
use strata_core::error::{Result, StrataError};
use strata_core::version;

use crate::paths::DEFAULT_SCRIPT_EXTENSION;

/// Lists the change-script files in `dir`.
///
/// An entry is kept if its name does not start with `.`, ends with
/// `.{extension}`, and the rest of the name is a valid semantic version.
/// A leading `.` on `extension` is ignored. Returns full paths in directory
/// order; callers sort.
///
/// # Errors
///
/// Returns `StrataError::CatalogIo` if the directory cannot be read.
pub async fn list_change_scripts(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let io_err = |e: std::io::Error| StrataError::catalog_io(dir, e.to_string());

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let extension = version::normalize_extension(extension);
    let suffix = format!(".{}", extension);
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if name.starts_with('.') || !name.ends_with(&suffix) {
            continue;
        }
        if entry.file_type().await.map_err(io_err)?.is_dir() {
            continue;
        }

        let path = entry.path();
        if version::file_version(&path, extension).is_none() {
            tracing::debug!(file = %path.display(), "Ignoring file without a semantic version name");
            continue;
        }
        files.push(path);
    }

    Ok(files)
}

/// A directory of change-scripts with a fixed file extension.
#[derive(Debug, Clone)]
pub struct ScriptCatalog {
    dir: PathBuf,
    extension: String,
}

impl ScriptCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Lists script files, unsorted. Can be called any number of times.
    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        list_change_scripts(&self.dir, &self.extension).await
    }

    /// Lists script files with their versions, ascending.
    pub async fn versions(&self) -> Result<Vec<(Version, PathBuf)>> {
        let mut entries: Vec<(Version, PathBuf)> = self
            .list()
            .await?
            .into_iter()
            .filter_map(|path| version::file_version(&path, &self.extension).map(|v| (v, path)))
            .collect();
        entries.sort_by(|a, b| version::compare(&a.0, &b.0));
        Ok(entries)
    }
}
