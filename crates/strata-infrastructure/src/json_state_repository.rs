//! JSON file implementation of `StateRepository`.
//!
//! One state file can hold the state of many evolution directories. Keys
//! and record paths are stored relative (see [`crate::dto`]), so the file
//! can be moved together with the directories it describes.

use crate::dto::{self, EvolutionStateDto, StateFileDto};
use crate::paths;
use crate::storage::{AtomicJsonError, AtomicJsonFile};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use strata_core::error::{Result, StrataError};
use strata_core::state::{EvolutionState, StateMap, StateRepository};

/// State repository backed by a single JSON file.
///
/// Writes go through [`AtomicJsonFile::update`], so concurrent `set_state`
/// calls for different directories on the same file never drop each other's
/// keys.
///
/// # Example
///
/// ```ignore
/// let repo = JsonStateRepository::for_directory(Path::new("./evolutions"))?;
/// let state = repo.get_state(Path::new("./evolutions")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct JsonStateRepository {
    file: AtomicJsonFile<StateFileDto>,
    base_dir: PathBuf,
}

impl JsonStateRepository {
    /// Creates a repository for the state file at `state_file`.
    ///
    /// The path is made absolute against the current directory and
    /// symlinks in its existing part are resolved, so keys are computed
    /// between real directories. The file itself does not need to exist.
    pub fn new(state_file: impl AsRef<Path>) -> Result<Self> {
        let state_file = paths::resolve(state_file.as_ref())?;
        let base_dir = state_file
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StrataError::config("state file has no parent directory"))?;

        Ok(Self {
            file: AtomicJsonFile::new(state_file),
            base_dir,
        })
    }

    /// Creates a repository using the default state file inside `evolution_dir`.
    pub fn for_directory(evolution_dir: &Path) -> Result<Self> {
        Self::new(evolution_dir.join(paths::DEFAULT_STATE_FILE))
    }

    pub fn state_file(&self) -> &Path {
        self.file.path()
    }

    /// Directory that state keys are relative to.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn key_for(&self, evolution_dir: &Path) -> Result<(PathBuf, String)> {
        let dir = paths::resolve(evolution_dir)?;
        let key = paths::to_portable(&paths::relative_path(&self.base_dir, &dir));
        Ok((dir, key))
    }

    fn map_storage_error(&self, err: AtomicJsonError) -> StrataError {
        match err {
            AtomicJsonError::ParseError(e) => StrataError::state_corrupt(self.file.path(), e.to_string()),
            AtomicJsonError::SerializeError(e) => e.into(),
            AtomicJsonError::IoError(e) => e.into(),
            AtomicJsonError::LockError(message) => StrataError::io(message),
        }
    }

    fn load_dto_blocking(&self) -> Result<StateFileDto> {
        self.file
            .load()
            .map(Option::unwrap_or_default)
            .map_err(|e| self.map_storage_error(e))
    }
}

fn join_error(e: tokio::task::JoinError) -> StrataError {
    StrataError::internal(format!("Failed to join task: {}", e))
}

#[async_trait]
impl StateRepository for JsonStateRepository {
    async fn load_all(&self) -> Result<StateMap> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || {
            let dto = repo.load_dto_blocking()?;
            dto::state_file_into_domain(&repo.base_dir, dto)
                .map_err(|message| StrataError::state_corrupt(repo.file.path(), message))
        })
        .await
        .map_err(join_error)?
    }

    async fn save_all(&self, states: &StateMap) -> Result<()> {
        let repo = self.clone();
        let dto = dto::state_file_from_domain(&self.base_dir, states);
        tokio::task::spawn_blocking(move || {
            repo.file
                .update(StateFileDto::new(), |current| {
                    *current = dto;
                    Ok(())
                })
                .map_err(|e| repo.map_storage_error(e))
        })
        .await
        .map_err(join_error)?
    }

    async fn get_state(&self, evolution_dir: &Path) -> Result<EvolutionState> {
        let (dir, key) = self.key_for(evolution_dir)?;
        let repo = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut dto = repo.load_dto_blocking()?;
            match dto.remove(&key) {
                Some(state) => state
                    .into_domain(&dir)
                    .map_err(|message| StrataError::state_corrupt(repo.file.path(), message)),
                None => Ok(EvolutionState::default()),
            }
        })
        .await
        .map_err(join_error)?
    }

    async fn set_state(&self, evolution_dir: &Path, state: &EvolutionState) -> Result<()> {
        let (dir, key) = self.key_for(evolution_dir)?;
        let entry = EvolutionStateDto::from_domain(&dir, state);
        let repo = self.clone();
        tokio::task::spawn_blocking(move || {
            repo.file
                .update(StateFileDto::new(), |current| {
                    current.insert(key, entry);
                    Ok(())
                })
                .map_err(|e| repo.map_storage_error(e))
        })
        .await
        .map_err(join_error)?
    }
}
