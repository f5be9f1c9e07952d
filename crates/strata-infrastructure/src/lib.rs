//! Filesystem-backed implementations for the Strata evolution engine.

pub mod catalog;
pub mod command_script;
pub mod config;
pub mod dto;
pub mod json_state_repository;
pub mod paths;
pub mod storage;

pub use crate::catalog::{ScriptCatalog, list_change_scripts};
pub use crate::command_script::{CommandScript, CommandScriptLoader, ShellSubject};
pub use crate::config::StrataConfig;
pub use crate::json_state_repository::JsonStateRepository;
