//! Connection string parsing.

use crate::error::{Result, StrataError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const DEFAULT_USER: &str = "root";
const DEFAULT_PASS: &str = "";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_DBNAME: &str = "default";

// adapter://[user[:pass]@]host[/dbname]
static CONNECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)://(?:(.*?)(?::(.*?))?@)?(.*?)(?:/(.*)?)?$")
        .expect("connection pattern is a valid regex")
});

/// A parsed connection string.
///
/// Missing parts fall back to `root`, an empty password, `localhost` and the
/// `default` database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// The connection string this info was parsed from.
    pub source: String,
    /// Name of the adapter able to open this connection.
    pub adapter: String,
    pub user: String,
    pub pass: String,
    pub host: String,
    pub dbname: String,
}

impl ConnectionInfo {
    /// Parses `adapter://[user[:pass]@]host[/dbname]`.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Connection` if the string is empty, has no
    /// `://` separator, or names no adapter.
    pub fn parse(connection_string: &str) -> Result<Self> {
        if connection_string.is_empty() {
            return Err(StrataError::connection("Connection string must not be empty"));
        }

        let caps = CONNECTION_PATTERN.captures(connection_string).ok_or_else(|| {
            StrataError::connection(format!("Invalid connection string : {}", connection_string))
        })?;

        let part = |i: usize, default: &str| -> String {
            caps.get(i)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        let adapter = part(1, "");
        if adapter.is_empty() {
            return Err(StrataError::connection(format!(
                "Missing adapter in connection string : {}",
                connection_string
            )));
        }

        Ok(Self {
            source: connection_string.to_string(),
            adapter,
            user: part(2, DEFAULT_USER),
            pass: part(3, DEFAULT_PASS),
            host: part(4, DEFAULT_HOST),
            dbname: part(5, DEFAULT_DBNAME),
        })
    }
}
