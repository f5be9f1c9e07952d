//! Evolution state repository trait.
//!
//! Defines the interface for persisting applied-state across process restarts.

use super::model::{EvolutionState, StateMap};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// An abstract repository for evolution state.
///
/// One repository backs a single shared store. Every evolution directory that
/// uses the store has its own entry in it, so independent targets can share
/// one persisted file.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Hand out absolute paths for directories and record files in memory
/// - Persist record files relative to their own evolution directory
/// - Fail with `StrataError::StateCorrupt` when the store cannot be parsed
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Loads every evolution state in the store.
    ///
    /// Returns an empty map if the store does not exist yet.
    async fn load_all(&self) -> Result<StateMap>;

    /// Overwrites the store with the given states.
    async fn save_all(&self, states: &StateMap) -> Result<()>;

    /// Returns the state of one evolution directory.
    ///
    /// A directory that has never been evolved gets the default state
    /// (`0.0.0`, no active evolutions).
    async fn get_state(&self, evolution_dir: &Path) -> Result<EvolutionState>;

    /// Inserts or replaces the state of one evolution directory, leaving the
    /// other entries in the store untouched.
    async fn set_state(&self, evolution_dir: &Path, state: &EvolutionState) -> Result<()>;
}
