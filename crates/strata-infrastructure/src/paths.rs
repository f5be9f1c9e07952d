//! Path handling for evolution directories and the shared state file.
//!
//! The state file is meant to be portable. Directory keys are stored
//! relative to the state file's directory, record files relative to their
//! evolution directory. Both are resolved back to absolute paths on load.

use std::path::{Component, Path, PathBuf};

/// Default state file name, created inside the evolution directory.
pub const DEFAULT_STATE_FILE: &str = ".evolution.json";

/// Default extension of change-script files.
pub const DEFAULT_SCRIPT_EXTENSION: &str = "toml";

/// Key used for an evolution directory that is the state file's own directory.
const SELF_KEY: &str = ".";

/// Lexically normalizes a path: drops `.` components and folds `..` into
/// the preceding component where possible. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Makes `path` absolute against the current directory, then normalizes it.
pub fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    Ok(normalize(&std::path::absolute(path)?))
}

/// Makes `path` absolute and resolves symlinks in the longest prefix of it
/// that exists. Missing trailing components are appended unchanged.
///
/// Falls back to the lexical [`absolute`] path if the filesystem refuses to
/// resolve the prefix.
pub fn resolve(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = absolute(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut real) => {
                for part in missing.iter().rev() {
                    real.push(part);
                }
                return Ok(real);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Ok(absolute.clone());
                };
                missing.push(name.to_os_string());
                existing = parent;
            }
            Err(_) => return Ok(absolute.clone()),
        }
    }
}

/// Computes `target` relative to `base`. Both should be absolute and
/// normalized. Returns an empty path if they are equal.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for component in &target[common..] {
        out.push(component.as_os_str());
    }
    out
}

/// Renders a relative path as a portable, `/`-separated key.
pub fn to_portable(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if parts.is_empty() {
        SELF_KEY.to_string()
    } else {
        parts.join("/")
    }
}

/// Resolves a portable key written by [`to_portable`] against `base`.
pub fn from_portable(base: &Path, key: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in key.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    normalize(&path)
}
