//! Application layer for Strata.
//!
//! Coordinates the domain and infrastructure layers: the orchestrator decides
//! which change-scripts to evolve or roll back, and `EvolutionService` drives
//! one run from validated options to persisted state.

pub mod evolution_service;
pub mod orchestrator;

pub use evolution_service::{ApplyOptions, EvolutionService, RunHandle, RunReport, StatusReport};
pub use orchestrator::RunOutcome;
