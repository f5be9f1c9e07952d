//! Evolution orchestrator.
//!
//! Brings one evolution state to a target version in two passes over the
//! same mutable state:
//!
//! 1. **Rollback** (exact targets only): active records, newest first. A
//!    record is rolled back when the target is older than its script, or the
//!    script's `satisfies` range excludes the target.
//! 2. **Evolve**: catalog files that are not active, oldest first. A file is
//!    evolved when the target is `latest`, or when the target is at least the
//!    script's version and inside its `satisfies` range.
//!
//! Scripts run strictly one after another. A failing script never aborts the
//! run: its record stays active with the error attached.

use semver::Version;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::error::Result;
use strata_core::script::{ChangeScript, ScriptLoader};
use strata_core::state::{EvolutionRecord, EvolutionState, RecordedError};
use strata_core::subject::Subject;
use strata_core::version::{self, TargetVersion};

/// What a single orchestrator run did, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Scripts evolved successfully.
    pub evolved: Vec<PathBuf>,
    /// Scripts rolled back successfully and removed from the active list.
    pub rolled_back: Vec<PathBuf>,
    /// Scripts whose evolve or rollback failed during this run.
    pub failed: Vec<PathBuf>,
    /// Catalog files that could not be loaded and were not evolved.
    pub skipped: Vec<PathBuf>,
}

impl RunOutcome {
    /// Returns true if the run touched nothing.
    pub fn is_noop(&self) -> bool {
        self.evolved.is_empty()
            && self.rolled_back.is_empty()
            && self.failed.is_empty()
            && self.skipped.is_empty()
    }
}

/// Loads each script at most once per run.
struct ScriptCache<'a, S: Subject> {
    loader: &'a dyn ScriptLoader<S>,
    extension: &'a str,
    scripts: HashMap<PathBuf, Arc<dyn ChangeScript<S>>>,
}

impl<'a, S: Subject> ScriptCache<'a, S> {
    fn new(loader: &'a dyn ScriptLoader<S>, extension: &'a str) -> Self {
        Self {
            loader,
            extension,
            scripts: HashMap::new(),
        }
    }

    fn version_of(&self, file: &Path) -> Option<Version> {
        version::file_version(file, self.extension)
    }

    async fn load(&mut self, file: &Path) -> Result<Arc<dyn ChangeScript<S>>> {
        if let Some(script) = self.scripts.get(file) {
            return Ok(script.clone());
        }
        let script = self.loader.load(file, self.extension).await?;
        self.scripts.insert(file.to_path_buf(), script.clone());
        Ok(script)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Runs both passes against `state`, invoking scripts on `subject`.
///
/// `catalog_files` is the unsorted output of the catalog listed with
/// `extension`. `state` is updated in place; persisting it is the caller's
/// job.
pub async fn run<S: Subject>(
    subject: &S,
    loader: &dyn ScriptLoader<S>,
    extension: &str,
    target: &TargetVersion,
    state: &mut EvolutionState,
    catalog_files: Vec<PathBuf>,
) -> RunOutcome {
    let mut cache = ScriptCache::new(loader, extension);
    let mut outcome = RunOutcome::default();

    if let TargetVersion::Exact(target) = target {
        if !state.active_evolutions.is_empty() {
            rollback_pass(subject, &mut cache, target, state, &mut outcome).await;
        }
        state.current_version = target.clone();
    }

    evolve_pass(subject, &mut cache, target, state, catalog_files, &mut outcome).await;

    outcome
}

async fn rollback_pass<S: Subject>(
    subject: &S,
    cache: &mut ScriptCache<'_, S>,
    target: &Version,
    state: &mut EvolutionState,
    outcome: &mut RunOutcome,
) {
    let mut index = state.active_evolutions.len();
    while index > 0 {
        index -= 1;
        let file = state.active_evolutions[index].file.clone();

        let Some(script_version) = cache.version_of(&file) else {
            tracing::warn!(file = %file.display(), "Active record has no semantic version, leaving it");
            continue;
        };
        let older_target = version::less_than(target, &script_version);

        let script = match cache.load(&file).await {
            Ok(script) => script,
            Err(e) => {
                if older_target {
                    tracing::warn!(file = %file.display(), error = %e, "Cannot load change-script to roll back");
                    let failed = state.active_evolutions[index]
                        .failed_rollback(RecordedError::new(e.to_string()), now_millis());
                    state.active_evolutions[index] = failed;
                    outcome.failed.push(file);
                } else {
                    tracing::debug!(file = %file.display(), error = %e, "Cannot load active change-script, keeping it");
                }
                continue;
            }
        };

        let out_of_range = script
            .satisfies()
            .is_some_and(|range| !version::satisfies_range(target, range));
        if !older_target && !out_of_range {
            continue;
        }

        tracing::info!(version = %script_version, file = %file.display(), "Rolling back");
        match script.rollback(subject).await {
            Ok(()) => {
                state.active_evolutions.remove(index);
                outcome.rolled_back.push(file);
            }
            Err(e) => {
                tracing::warn!(version = %script_version, error = %format!("{:#}", e), "Rollback failed");
                let failed = state.active_evolutions[index]
                    .failed_rollback(RecordedError::from_anyhow(&e), now_millis());
                state.active_evolutions[index] = failed;
                outcome.failed.push(file);
            }
        }
    }
}

async fn evolve_pass<S: Subject>(
    subject: &S,
    cache: &mut ScriptCache<'_, S>,
    target: &TargetVersion,
    state: &mut EvolutionState,
    catalog_files: Vec<PathBuf>,
    outcome: &mut RunOutcome,
) {
    let mut candidates: Vec<(Version, PathBuf)> = catalog_files
        .into_iter()
        .filter(|file| !state.is_active(file))
        .filter_map(|file| cache.version_of(&file).map(|v| (v, file)))
        .collect();
    // Stable: equal precedence keeps catalog order.
    candidates.sort_by(|a, b| version::compare(&a.0, &b.0));

    let mut latest_seen = target.clone();

    for (script_version, file) in candidates {
        let script = match cache.load(&file).await {
            Ok(script) => script,
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "Skipping change-script that cannot be loaded");
                outcome.skipped.push(file);
                continue;
            }
        };

        let qualifies = match target {
            TargetVersion::Latest => true,
            TargetVersion::Exact(target) => {
                version::greater_or_equal(target, &script_version)
                    && script
                        .satisfies()
                        .is_none_or(|range| version::satisfies_range(target, range))
            }
        };
        if !qualifies {
            tracing::debug!(version = %script_version, "Change-script does not apply to target");
            continue;
        }

        let newer = match &latest_seen {
            TargetVersion::Latest => true,
            TargetVersion::Exact(seen) => version::greater_than(&script_version, seen),
        };
        if newer {
            latest_seen = TargetVersion::Exact(script_version.clone());
        }

        tracing::info!(version = %script_version, file = %file.display(), "Evolving");
        match script.evolve(subject).await {
            Ok(()) => {
                state
                    .active_evolutions
                    .push(EvolutionRecord::applied(file.clone(), now_millis()));
                outcome.evolved.push(file);
            }
            Err(e) => {
                tracing::warn!(version = %script_version, error = %format!("{:#}", e), "Evolve failed");
                state.active_evolutions.push(EvolutionRecord::failed_evolve(
                    file.clone(),
                    RecordedError::from_anyhow(&e),
                    now_millis(),
                ));
                outcome.failed.push(file);
            }
        }
    }

    if let TargetVersion::Exact(reached) = latest_seen {
        state.current_version = reached;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use semver::VersionReq;
    use std::sync::Mutex;
    use strata_core::script::ScriptRegistry;
    use strata_core::state::ScriptMethod;

    #[derive(Default)]
    struct Tape {
        marks: Mutex<Vec<i32>>,
    }

    impl Tape {
        fn take(&self) -> Vec<i32> {
            std::mem::take(&mut *self.marks.lock().unwrap())
        }
    }

    impl Subject for Tape {}

    #[derive(Default)]
    struct Mark {
        value: i32,
        range: Option<VersionReq>,
        fail_evolve: bool,
        fail_rollback: bool,
    }

    #[async_trait]
    impl ChangeScript<Tape> for Mark {
        fn satisfies(&self) -> Option<&VersionReq> {
            self.range.as_ref()
        }

        async fn evolve(&self, subject: &Tape) -> anyhow::Result<()> {
            if self.fail_evolve {
                anyhow::bail!("mark {} refused", self.value);
            }
            subject.marks.lock().unwrap().push(self.value);
            Ok(())
        }

        async fn rollback(&self, subject: &Tape) -> anyhow::Result<()> {
            if self.fail_rollback {
                anyhow::bail!("mark {} stuck", self.value);
            }
            subject.marks.lock().unwrap().push(-self.value);
            Ok(())
        }
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn mark(value: i32) -> Arc<dyn ChangeScript<Tape>> {
        Arc::new(Mark {
            value,
            ..Default::default()
        })
    }

    fn files(versions: &[&str]) -> Vec<PathBuf> {
        versions
            .iter()
            .map(|v| PathBuf::from(format!("/evo/{}.toml", v)))
            .collect()
    }

    #[tokio::test]
    async fn test_latest_evolves_everything_in_order() {
        let mut registry: ScriptRegistry<Tape> = ScriptRegistry::new();
        registry.register(v("1.0.0"), mark(1));
        registry.register(v("2.0.0"), mark(2));
        registry.register(v("10.0.0"), mark(10));

        let tape = Tape::default();
        let mut state = EvolutionState::default();
        let outcome = run(
            &tape,
            &registry,
            "toml",
            &TargetVersion::Latest,
            &mut state,
            files(&["10.0.0", "1.0.0", "2.0.0"]),
        )
        .await;

        assert_eq!(tape.take(), vec![1, 2, 10]);
        assert_eq!(outcome.evolved.len(), 3);
        assert_eq!(state.current_version, v("10.0.0"));
        assert_eq!(state.active_evolutions.len(), 3);
    }

    #[tokio::test]
    async fn test_exact_target_stops_at_target() {
        let mut registry: ScriptRegistry<Tape> = ScriptRegistry::new();
        registry.register(v("1.0.0"), mark(1));
        registry.register(v("2.0.0"), mark(2));

        let tape = Tape::default();
        let mut state = EvolutionState::default();
        run(
            &tape,
            &registry,
            "toml",
            &"1.0.0".parse().unwrap(),
            &mut state,
            files(&["1.0.0", "2.0.0"]),
        )
        .await;

        assert_eq!(tape.take(), vec![1]);
        assert_eq!(state.current_version, v("1.0.0"));
    }

    #[tokio::test]
    async fn test_range_forces_rollback() {
        let mut registry: ScriptRegistry<Tape> = ScriptRegistry::new();
        registry.register(v("1.0.0"), mark(1));
        registry.register(
            v("1.5.0"),
            Arc::new(Mark {
                value: 15,
                range: Some(VersionReq::parse("<2.0.0").unwrap()),
                ..Default::default()
            }),
        );
        registry.register(v("2.0.0"), mark(2));

        let tape = Tape::default();
        let mut state = EvolutionState::default();
        let catalog = files(&["1.0.0", "1.5.0", "2.0.0"]);

        run(&tape, &registry, "toml", &"1.5.0".parse().unwrap(), &mut state, catalog.clone()).await;
        assert_eq!(tape.take(), vec![1, 15]);

        // 1.5.0 is older than the target but its range excludes it
        run(&tape, &registry, "toml", &"2.0.0".parse().unwrap(), &mut state, catalog).await;
        assert_eq!(tape.take(), vec![-15, 2]);
        assert_eq!(state.current_version, v("2.0.0"));
    }

    #[tokio::test]
    async fn test_failed_evolve_stays_active() {
        let mut registry: ScriptRegistry<Tape> = ScriptRegistry::new();
        registry.register(v("1.0.0"), mark(1));
        registry.register(
            v("2.0.0"),
            Arc::new(Mark {
                value: 2,
                fail_evolve: true,
                ..Default::default()
            }),
        );
        registry.register(v("3.0.0"), mark(3));

        let tape = Tape::default();
        let mut state = EvolutionState::default();
        let catalog = files(&["1.0.0", "2.0.0", "3.0.0"]);
        let outcome = run(&tape, &registry, "toml", &TargetVersion::Latest, &mut state, catalog.clone()).await;

        assert_eq!(tape.take(), vec![1, 3]);
        assert_eq!(outcome.failed, vec![PathBuf::from("/evo/2.0.0.toml")]);
        assert_eq!(state.warning_count(), 1);
        assert_eq!(state.current_version, v("3.0.0"));

        let failed: Vec<&EvolutionRecord> = state.failed_records().collect();
        assert_eq!(failed[0].file, PathBuf::from("/evo/2.0.0.toml"));
        assert!(failed[0].error.as_ref().unwrap().message.contains("refused"));

        // Not attempted again while active
        let outcome = run(&tape, &registry, "toml", &TargetVersion::Latest, &mut state, catalog).await;
        assert!(outcome.is_noop());
        assert!(tape.take().is_empty());
    }

    #[tokio::test]
    async fn test_unloadable_candidate_is_skipped() {
        let mut registry: ScriptRegistry<Tape> = ScriptRegistry::new();
        registry.register(v("1.0.0"), mark(1));
        registry.register(v("3.0.0"), mark(3));

        let tape = Tape::default();
        let mut state = EvolutionState::default();
        let outcome = run(
            &tape,
            &registry,
            "toml",
            &TargetVersion::Latest,
            &mut state,
            files(&["1.0.0", "2.0.0", "3.0.0"]),
        )
        .await;

        assert_eq!(tape.take(), vec![1, 3]);
        assert_eq!(outcome.skipped, vec![PathBuf::from("/evo/2.0.0.toml")]);
        assert!(!state.is_active(Path::new("/evo/2.0.0.toml")));
    }

    #[tokio::test]
    async fn test_unloadable_active_record_is_flagged_on_rollback() {
        let registry: ScriptRegistry<Tape> = ScriptRegistry::new();

        let tape = Tape::default();
        let mut state = EvolutionState {
            current_version: v("1.0.0"),
            active_evolutions: vec![EvolutionRecord::applied(PathBuf::from("/evo/1.0.0.toml"), 7)],
        };
        let outcome = run(&tape, &registry, "toml", &"0.0.0".parse().unwrap(), &mut state, vec![]).await;

        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(state.active_evolutions[0].previous_timestamp, Some(7));
        assert_eq!(state.warning_count(), 1);
        assert_eq!(state.current_version, v("0.0.0"));
    }

    #[tokio::test]
    async fn test_failed_rollback_is_kept_in_place_and_retried() {
        let mut registry: ScriptRegistry<Tape> = ScriptRegistry::new();
        registry.register(v("1.0.0"), mark(1));
        registry.register(
            v("2.0.0"),
            Arc::new(Mark {
                value: 2,
                fail_rollback: true,
                ..Default::default()
            }),
        );
        registry.register(v("3.0.0"), mark(3));

        let tape = Tape::default();
        let mut state = EvolutionState {
            current_version: v("3.0.0"),
            active_evolutions: vec![
                EvolutionRecord::applied(PathBuf::from("/evo/1.0.0.toml"), 10),
                EvolutionRecord::applied(PathBuf::from("/evo/2.0.0.toml"), 20),
                EvolutionRecord::applied(PathBuf::from("/evo/3.0.0.toml"), 30),
            ],
        };
        let catalog = files(&["1.0.0", "2.0.0", "3.0.0"]);

        let outcome = run(&tape, &registry, "toml", &"1.0.0".parse().unwrap(), &mut state, catalog.clone()).await;

        assert_eq!(tape.take(), vec![-3]);
        assert_eq!(outcome.rolled_back, vec![PathBuf::from("/evo/3.0.0.toml")]);
        assert_eq!(outcome.failed, vec![PathBuf::from("/evo/2.0.0.toml")]);
        assert_eq!(state.current_version, v("1.0.0"));
        assert_eq!(state.warning_count(), 1);

        let order: Vec<&Path> = state.active_evolutions.iter().map(|r| r.file.as_path()).collect();
        assert_eq!(order, vec![Path::new("/evo/1.0.0.toml"), Path::new("/evo/2.0.0.toml")]);

        let stuck = &state.active_evolutions[1];
        assert_eq!(stuck.method, Some(ScriptMethod::Rollback));
        assert_eq!(stuck.previous_timestamp, Some(20));
        assert!(stuck.timestamp >= 20);
        assert!(stuck.error.as_ref().unwrap().message.contains("mark 2 stuck"));

        // Still active, so the next run tries the rollback again
        let outcome = run(&tape, &registry, "toml", &"1.0.0".parse().unwrap(), &mut state, catalog).await;
        assert_eq!(outcome.failed, vec![PathBuf::from("/evo/2.0.0.toml")]);
        assert!(outcome.rolled_back.is_empty());
        assert_eq!(state.active_evolutions.len(), 2);
        assert_eq!(state.warning_count(), 1);
    }

    #[tokio::test]
    async fn test_build_metadata_shares_precedence_with_target() {
        let mut registry: ScriptRegistry<Tape> = ScriptRegistry::new();
        registry.register(v("0.9.0"), mark(9));
        registry.register(v("1.0.0+build.5"), mark(10));

        let tape = Tape::default();
        let mut state = EvolutionState::default();
        let catalog = files(&["1.0.0+build.5", "0.9.0"]);

        let outcome = run(&tape, &registry, "toml", &"1.0.0".parse().unwrap(), &mut state, catalog.clone()).await;
        assert_eq!(tape.take(), vec![9, 10]);
        assert_eq!(outcome.evolved.len(), 2);

        // Equal precedence to the target: nothing to roll back
        let outcome = run(&tape, &registry, "toml", &"1.0.0".parse().unwrap(), &mut state, catalog).await;
        assert!(outcome.is_noop());
        assert!(tape.take().is_empty());
    }

    #[tokio::test]
    async fn test_dotted_extension_is_stripped_from_versions() {
        let mut registry: ScriptRegistry<Tape> = ScriptRegistry::new();
        registry.register(v("1.0.0"), mark(1));
        registry.register(v("2.0.0"), mark(2));

        let tape = Tape::default();
        let mut state = EvolutionState::default();
        let catalog = vec![
            PathBuf::from("/evo/2.0.0.up.sql"),
            PathBuf::from("/evo/1.0.0.up.sql"),
        ];

        run(&tape, &registry, "up.sql", &TargetVersion::Latest, &mut state, catalog).await;
        assert_eq!(tape.take(), vec![1, 2]);
        assert_eq!(state.current_version, v("2.0.0"));

        run(&tape, &registry, "up.sql", &"1.0.0".parse().unwrap(), &mut state, vec![]).await;
        assert_eq!(tape.take(), vec![-2]);
    }

    #[tokio::test]
    async fn test_equal_target_without_scripts_is_noop() {
        let registry: ScriptRegistry<Tape> = ScriptRegistry::new();
        let tape = Tape::default();
        let mut state = EvolutionState::default();

        let outcome = run(&tape, &registry, "toml", &"0.0.0".parse().unwrap(), &mut state, vec![]).await;
        assert!(outcome.is_noop());
        assert_eq!(state, EvolutionState::default());
    }
}
