//! Change-script abstractions.
//!
//! A change-script is a versioned unit with two operations, `evolve` and
//! `rollback`, run against a [`Subject`](crate::subject::Subject). Scripts are
//! resolved from catalog files at run time through a [`ScriptLoader`].
//!
//! # Architecture
//!
//! ```text
//!   catalog file (1.2.0.toml)
//!          │
//!          V
//!     ScriptLoader ──────────┬─────────────────────────┐
//!          │                 │                         │
//!          V                 V                         V
//!   Arc<dyn ChangeScript>  ScriptRegistry       CommandScriptLoader
//!                          (compiled, by         (TOML manifest with
//!                           version key)          shell commands)
//! ```

mod registry;
mod traits;

pub use registry::ScriptRegistry;
pub use traits::{ChangeScript, ScriptLoader};
