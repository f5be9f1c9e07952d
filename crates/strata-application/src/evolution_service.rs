//! Run driver for evolution directories.
//!
//! `EvolutionService` validates run options, serializes runs per directory,
//! loads state, lists the catalog, runs the orchestrator, persists the result
//! and notifies the subject.

use crate::orchestrator::{self, RunOutcome};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use strata_core::error::{Result, StrataError};
use strata_core::script::ScriptLoader;
use strata_core::state::{EvolutionRecord, StateRepository};
use strata_core::subject::Subject;
use strata_core::version::{self, TargetVersion};
use strata_infrastructure::catalog::{ScriptCatalog, list_change_scripts};
use strata_infrastructure::json_state_repository::JsonStateRepository;
use strata_infrastructure::paths::DEFAULT_SCRIPT_EXTENSION;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Evolution directory. Required.
    pub path: Option<PathBuf>,
    /// Target version or `latest`. Defaults to `latest`.
    pub version: Option<String>,
    /// Shared state file. Defaults to `<path>/.evolution.json`.
    pub state_file: Option<PathBuf>,
    /// Change-script extension. Defaults to `toml`.
    pub extension: Option<String>,
}

impl ApplyOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_state_file(mut self, state_file: impl Into<PathBuf>) -> Self {
        self.state_file = Some(state_file.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    /// Canonical evolution directory.
    pub path: PathBuf,
    pub target: String,
    pub previous_version: Version,
    pub current_version: Version,
    pub evolved: Vec<PathBuf>,
    pub rolled_back: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    /// Active records left in an error state, including older ones.
    pub warning_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Stored state of a directory next to what its catalog offers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub path: PathBuf,
    pub state_file: PathBuf,
    pub current_version: Version,
    pub active: Vec<EvolutionRecord>,
    /// Catalog files not currently active, ascending by version.
    pub pending: Vec<PathBuf>,
    pub warning_count: usize,
}

/// Options that passed validation.
#[derive(Debug, Clone)]
struct RunPlan {
    run_id: String,
    dir: PathBuf,
    target: TargetVersion,
    state_file: Option<PathBuf>,
    extension: String,
}

impl RunPlan {
    fn repository(&self) -> Result<JsonStateRepository> {
        match &self.state_file {
            Some(file) => JsonStateRepository::new(file),
            None => JsonStateRepository::for_directory(&self.dir),
        }
    }
}

/// Validates `options` in order: path given, version valid, path exists.
fn validate(options: &ApplyOptions) -> Result<RunPlan> {
    let path = options
        .path
        .as_ref()
        .ok_or_else(|| StrataError::config("path undefined"))?;

    let target = match options.version.as_deref() {
        None => TargetVersion::Latest,
        Some(v) => v.parse::<TargetVersion>()?,
    };

    if !path.exists() {
        return Err(StrataError::config("path does not exist"));
    }
    let dir = path.canonicalize()?;

    let extension = version::normalize_extension(
        options
            .extension
            .as_deref()
            .unwrap_or(DEFAULT_SCRIPT_EXTENSION),
    );
    if extension.is_empty() {
        return Err(StrataError::config("extension undefined"));
    }

    Ok(RunPlan {
        run_id: Uuid::new_v4().to_string(),
        dir,
        target,
        state_file: options.state_file.clone(),
        extension: extension.to_string(),
    })
}

/// Drives evolution runs for subjects of type `S`.
///
/// Runs on the same directory are serialized; runs on different directories
/// may proceed concurrently. Cloning shares the loader and the lock table.
///
/// # Example
///
/// ```ignore
/// let service = EvolutionService::new(Arc::new(CommandScriptLoader::new()));
/// let subject = ShellSubject::new("./db");
///
/// let report = service
///     .apply(&subject, ApplyOptions::new("./db/evolutions").with_version("1.2.0"))
///     .await?;
/// if report.warning_count > 0 {
///     // inspect the state file for recorded errors
/// }
/// ```
pub struct EvolutionService<S: Subject> {
    loader: Arc<dyn ScriptLoader<S>>,
    locks: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl<S: Subject> Clone for EvolutionService<S> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<S: Subject> EvolutionService<S> {
    pub fn new(loader: Arc<dyn ScriptLoader<S>>) -> Self {
        Self {
            loader,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Brings the directory in `options` to the requested version.
    ///
    /// # Errors
    ///
    /// Fails before touching any state if the options are invalid, and with
    /// a catalog or state error if the directory or state file cannot be
    /// read. Change-script failures are not errors: they are counted in
    /// [`RunReport::warning_count`].
    pub async fn apply(&self, subject: &S, options: ApplyOptions) -> Result<RunReport> {
        let plan = validate(&options)?;
        self.execute(subject, plan).await
    }

    /// Validates `options` and runs the evolution on a background task.
    ///
    /// Validation errors are returned immediately. The run itself cannot be
    /// cancelled once started.
    pub fn spawn_apply(&self, subject: Arc<S>, options: ApplyOptions) -> Result<RunHandle>
    where
        S: 'static,
    {
        let plan = validate(&options)?;
        let run_id = plan.run_id.clone();
        let service = self.clone();

        let handle = tokio::spawn(async move { service.execute(subject.as_ref(), plan).await });

        Ok(RunHandle { run_id, handle })
    }

    /// Returns the stored state and pending scripts of a directory without
    /// running anything.
    pub async fn status(&self, options: ApplyOptions) -> Result<StatusReport> {
        let plan = validate(&options)?;
        let repository = plan.repository()?;

        let state = repository.get_state(&plan.dir).await?;
        let pending = ScriptCatalog::new(&plan.dir)
            .with_extension(&plan.extension)
            .versions()
            .await?
            .into_iter()
            .map(|(_, file)| file)
            .filter(|file| !state.is_active(file))
            .collect();

        Ok(StatusReport {
            path: plan.dir,
            state_file: repository.state_file().to_path_buf(),
            current_version: state.current_version.clone(),
            warning_count: state.warning_count(),
            active: state.active_evolutions,
            pending,
        })
    }

    async fn lock_directory(&self, dir: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(dir.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    async fn execute(&self, subject: &S, plan: RunPlan) -> Result<RunReport> {
        let _guard = self.lock_directory(&plan.dir).await;
        let started_at = Utc::now();

        tracing::info!(
            run_id = %plan.run_id,
            dir = %plan.dir.display(),
            target = %plan.target,
            "Starting evolution run"
        );

        let repository = plan.repository()?;
        let mut state = repository.get_state(&plan.dir).await?;
        let previous_version = state.current_version.clone();

        let files = list_change_scripts(&plan.dir, &plan.extension).await?;
        tracing::debug!(run_id = %plan.run_id, count = files.len(), "Listed change-scripts");

        let RunOutcome {
            evolved,
            rolled_back,
            failed,
            skipped,
        } = orchestrator::run(
            subject,
            self.loader.as_ref(),
            &plan.extension,
            &plan.target,
            &mut state,
            files,
        )
        .await;

        repository.set_state(&plan.dir, &state).await?;

        let warning_count = state.warning_count();
        tracing::info!(
            run_id = %plan.run_id,
            from = %previous_version,
            to = %state.current_version,
            evolved = evolved.len(),
            rolled_back = rolled_back.len(),
            warning_count,
            "Evolution run complete"
        );

        subject.evolution_complete(warning_count).await;

        Ok(RunReport {
            run_id: plan.run_id,
            path: plan.dir,
            target: plan.target.to_string(),
            previous_version,
            current_version: state.current_version,
            evolved,
            rolled_back,
            failed,
            skipped,
            warning_count,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Handle to a run started with [`EvolutionService::spawn_apply`].
pub struct RunHandle {
    run_id: String,
    handle: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the run to finish.
    pub async fn wait(self) -> Result<RunReport> {
        self.handle
            .await
            .map_err(|e| StrataError::internal(format!("Evolution task failed: {}", e)))?
    }

    /// Waits at most `timeout` for the run.
    ///
    /// Returns `Ok(None)` if the run did not finish in time. The run keeps
    /// going in the background and can be waited on again.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<RunReport>> {
        match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(joined) => joined
                .map_err(|e| StrataError::internal(format!("Evolution task failed: {}", e)))?
                .map(Some),
            Err(_) => {
                tracing::debug!(run_id = %self.run_id, ?timeout, "Run not finished within timeout");
                Ok(None)
            }
        }
    }
}
