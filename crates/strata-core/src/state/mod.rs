//! Evolution state domain module.
//!
//! # Module Structure
//!
//! - `model`: applied-state records (`EvolutionState`, `EvolutionRecord`)
//! - `repository`: repository trait for durable state persistence

mod model;
mod repository;

pub use model::{EvolutionRecord, EvolutionState, RecordedError, ScriptMethod, StateMap};
pub use repository::StateRepository;
