//! Compiled change-script registry.
//!
//! Scripts are linked into the binary and registered by version. Catalog files
//! only mark which versions exist in an evolution directory; the file name
//! without its extension is the lookup key.

use super::traits::{ChangeScript, ScriptLoader};
use crate::error::{Result, StrataError};
use crate::subject::Subject;
use crate::version;
use async_trait::async_trait;
use semver::Version;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Registry mapping versions to compiled change-scripts.
///
/// # Example
///
/// ```ignore
/// let mut registry: ScriptRegistry<Database> = ScriptRegistry::new();
/// registry.register(Version::new(1, 0, 0), Arc::new(CreateUsersTable));
/// registry.register(Version::new(1, 1, 0), Arc::new(AddEmailColumn));
///
/// // `evolutions/1.1.0.toml` now resolves to `AddEmailColumn`
/// let script = registry.load(Path::new("evolutions/1.1.0.toml"), "toml").await?;
/// ```
pub struct ScriptRegistry<S: Subject> {
    scripts: BTreeMap<Version, Arc<dyn ChangeScript<S>>>,
}

impl<S: Subject> ScriptRegistry<S> {
    pub fn new() -> Self {
        Self {
            scripts: BTreeMap::new(),
        }
    }

    /// Registers a script under `version`.
    ///
    /// # Panics
    ///
    /// Panics if a script is already registered for `version`.
    pub fn register(&mut self, version: Version, script: Arc<dyn ChangeScript<S>>) {
        assert!(
            !self.scripts.contains_key(&version),
            "Change-script already registered for version {}",
            version
        );
        self.scripts.insert(version, script);
    }

    /// Registers multiple scripts at once.
    ///
    /// # Panics
    ///
    /// Panics if any version is registered twice.
    pub fn register_all(&mut self, scripts: Vec<(Version, Arc<dyn ChangeScript<S>>)>) {
        for (version, script) in scripts {
            self.register(version, script);
        }
    }

    pub fn get(&self, version: &Version) -> Option<Arc<dyn ChangeScript<S>>> {
        self.scripts.get(version).cloned()
    }

    /// Registered versions in ascending order.
    pub fn versions(&self) -> Vec<Version> {
        self.scripts.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }
}

impl<S: Subject> Default for ScriptRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: Subject> ScriptLoader<S> for ScriptRegistry<S> {
    async fn load(&self, file: &Path, extension: &str) -> Result<Arc<dyn ChangeScript<S>>> {
        let version = version::file_version(file, extension)
            .ok_or_else(|| StrataError::script_load(file, "file name is not a semantic version"))?;

        self.get(&version).ok_or_else(|| {
            StrataError::script_load(
                file,
                format!("no change-script registered for version {}", version),
            )
        })
    }
}
