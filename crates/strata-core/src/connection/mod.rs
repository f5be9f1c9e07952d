//! Named connections resolved through adapter factories.
//!
//! A subject usually talks to some backend (a database, a key-value store).
//! The connection registry keeps named connection strings and the adapter
//! factories able to open them, scoped to an explicitly constructed object
//! instead of process-wide globals.

mod info;
mod registry;

pub use info::ConnectionInfo;
pub use registry::{AdapterFactory, ConnectionRegistry};
