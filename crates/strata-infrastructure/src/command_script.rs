//! Change-scripts described by TOML manifests that run shell commands.
//!
//! A catalog file such as `evolutions/1.2.0.toml` looks like:
//!
//! ```toml
//! description = "add audit table"
//! satisfies = ">=1.0.0"
//! evolve = "sqlite3 app.db < sql/1.2.0-up.sql"
//! rollback = "sqlite3 app.db < sql/1.2.0-down.sql"
//! ```
//!
//! Commands run through `sh -c` in the subject's working directory. The
//! variables `STRATA_VERSION`, `STRATA_METHOD` and `STRATA_SCRIPT` are set for
//! every command.

use anyhow::{Context, bail};
use async_trait::async_trait;
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::error::{Result, StrataError};
use strata_core::script::{ChangeScript, ScriptLoader};
use strata_core::state::ScriptMethod;
use strata_core::subject::Subject;
use strata_core::version;
use tokio::process::Command;

/// Subject for command scripts: a working directory and extra environment.
#[derive(Debug, Clone)]
pub struct ShellSubject {
    working_dir: PathBuf,
    env: BTreeMap<String, String>,
}

impl ShellSubject {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
        }
    }

    /// Adds an environment variable passed to every command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Runs `command` with `sh -c`. A non-zero exit status is an error
    /// carrying the command's stderr.
    pub async fn run(&self, command: &str, vars: &[(&str, String)]) -> anyhow::Result<()> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .envs(&self.env)
            .envs(vars.iter().map(|(k, v)| (*k, v.as_str())))
            .output()
            .await
            .with_context(|| format!("failed to spawn `{}`", command))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(command, stdout = %stdout.trim_end(), "Command output");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` exited with {}: {}",
                command,
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Subject for ShellSubject {
    async fn evolution_complete(&self, warning_count: usize) {
        if warning_count > 0 {
            tracing::warn!(
                dir = %self.working_dir.display(),
                warning_count,
                "Evolution finished with failed change-scripts"
            );
        } else {
            tracing::info!(dir = %self.working_dir.display(), "Evolution finished");
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptManifest {
    #[serde(default)]
    description: String,
    satisfies: Option<String>,
    evolve: String,
    rollback: String,
}

/// A change-script read from a TOML manifest.
#[derive(Debug, Clone)]
pub struct CommandScript {
    file: PathBuf,
    version: Version,
    description: String,
    satisfies: Option<VersionReq>,
    evolve: String,
    rollback: String,
}

impl CommandScript {
    /// Parses a manifest. `file` supplies the version through its name with
    /// `.{extension}` removed.
    pub fn parse(file: &Path, extension: &str, content: &str) -> Result<Self> {
        let version = version::file_version(file, extension)
            .ok_or_else(|| StrataError::script_load(file, "file name is not a semantic version"))?;

        let manifest: ScriptManifest =
            toml::from_str(content).map_err(|e| StrataError::script_load(file, e.to_string()))?;

        let satisfies = manifest
            .satisfies
            .as_deref()
            .map(version::parse_range)
            .transpose()
            .map_err(|e| StrataError::script_load(file, e.to_string()))?;

        Ok(Self {
            file: file.to_path_buf(),
            version,
            description: manifest.description,
            satisfies,
            evolve: manifest.evolve,
            rollback: manifest.rollback,
        })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    async fn invoke(&self, subject: &ShellSubject, method: ScriptMethod) -> anyhow::Result<()> {
        let command = match method {
            ScriptMethod::Evolve => &self.evolve,
            ScriptMethod::Rollback => &self.rollback,
        };
        let vars = [
            ("STRATA_VERSION", self.version.to_string()),
            ("STRATA_METHOD", method.to_string()),
            ("STRATA_SCRIPT", self.file.display().to_string()),
        ];
        subject
            .run(command, &vars)
            .await
            .with_context(|| format!("{} {} failed", method, self.version))
    }
}

#[async_trait]
impl ChangeScript<ShellSubject> for CommandScript {
    fn satisfies(&self) -> Option<&VersionReq> {
        self.satisfies.as_ref()
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evolve(&self, subject: &ShellSubject) -> anyhow::Result<()> {
        self.invoke(subject, ScriptMethod::Evolve).await
    }

    async fn rollback(&self, subject: &ShellSubject) -> anyhow::Result<()> {
        self.invoke(subject, ScriptMethod::Rollback).await
    }
}

/// Loads [`CommandScript`]s from their manifest files.
///
/// Manifests are read again on every load, so edits are picked up by the
/// next run.
#[derive(Debug, Clone, Default)]
pub struct CommandScriptLoader;

impl CommandScriptLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptLoader<ShellSubject> for CommandScriptLoader {
    async fn load(
        &self,
        file: &Path,
        extension: &str,
    ) -> Result<Arc<dyn ChangeScript<ShellSubject>>> {
        let content = tokio::fs::read_to_string(file)
            .await
            .map_err(|e| StrataError::script_load(file, e.to_string()))?;
        let script = CommandScript::parse(file, extension, &content)?;
        Ok(Arc::new(script))
    }
}
