//! Domain layer of the Strata evolution engine.
//!
//! - `version`: semantic version ordering and the `latest` target
//! - `state`: applied-state records and the repository trait that persists them
//! - `script`: change-script and loader traits, plus the compiled registry
//! - `subject`: the object change-scripts act on
//! - `connection`: named connection strings and adapter factories

pub mod connection;
pub mod error;
pub mod script;
pub mod state;
pub mod subject;
pub mod version;

// Re-export common error type
pub use error::StrataError;
