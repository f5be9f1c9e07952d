//! Version ordering over semantic version strings.
//!
//! Validation happens once, at the boundary, by parsing into
//! [`semver::Version`]. The comparison helpers below only accept parsed
//! versions, so calling them on invalid input is ruled out by the types.

use crate::error::{Result, StrataError};
use semver::{Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Target sentinel meaning "apply every eligible change-script".
pub const LATEST: &str = "latest";

/// Version recorded for a subject that was never evolved.
pub const INITIAL_VERSION: Version = Version::new(0, 0, 0);

/// Returns true if `v` is a syntactically valid semantic version.
///
/// Never fails. `"latest"` is not a valid version here.
pub fn is_valid(v: &str) -> bool {
    Version::parse(v).is_ok()
}

/// Orders two versions by semver precedence. Build metadata is ignored, so
/// `1.0.0` and `1.0.0+build.5` compare equal.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp_precedence(b)
}

pub fn less_than(a: &Version, b: &Version) -> bool {
    compare(a, b) == Ordering::Less
}

pub fn greater_than(a: &Version, b: &Version) -> bool {
    compare(a, b) == Ordering::Greater
}

pub fn greater_or_equal(a: &Version, b: &Version) -> bool {
    compare(a, b) != Ordering::Less
}

/// Returns true if `v` satisfies the version range `range`.
pub fn satisfies_range(v: &Version, range: &VersionReq) -> bool {
    range.matches(v)
}

/// Parses a version range such as `>=0.1.0` or `>=1.0.0, <2.0.0`.
pub fn parse_range(range: &str) -> Result<VersionReq> {
    VersionReq::parse(range)
        .map_err(|e| StrataError::config(format!("invalid version range `{}`: {}", range, e)))
}

/// Drops a leading `.` from a configured script extension.
pub fn normalize_extension(extension: &str) -> &str {
    extension.strip_prefix('.').unwrap_or(extension)
}

/// Derives a change-script's version from its file name.
///
/// The whole `.{extension}` suffix is stripped, so dotted extensions such as
/// `up.sql` work. Returns `None` if the name does not end with the extension
/// or the rest is not a valid semantic version.
pub fn file_version(file: &Path, extension: &str) -> Option<Version> {
    let name = file.file_name()?.to_str()?;
    let stem = name
        .strip_suffix(normalize_extension(extension))?
        .strip_suffix('.')?;
    Version::parse(stem).ok()
}

/// The version a run should bring the subject to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum TargetVersion {
    /// Apply every eligible change-script regardless of numeric ordering.
    #[default]
    Latest,
    /// Bring the subject to exactly this version.
    Exact(Version),
}

impl TargetVersion {
    pub fn is_latest(&self) -> bool {
        matches!(self, TargetVersion::Latest)
    }

    /// Returns the concrete version, or `None` for `latest`.
    pub fn as_version(&self) -> Option<&Version> {
        match self {
            TargetVersion::Latest => None,
            TargetVersion::Exact(v) => Some(v),
        }
    }
}

impl FromStr for TargetVersion {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        if s == LATEST {
            return Ok(TargetVersion::Latest);
        }
        Version::parse(s)
            .map(TargetVersion::Exact)
            .map_err(|_| StrataError::config("invalid version"))
    }
}

impl From<Version> for TargetVersion {
    fn from(v: Version) -> Self {
        TargetVersion::Exact(v)
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetVersion::Latest => f.write_str(LATEST),
            TargetVersion::Exact(v) => write!(f, "{}", v),
        }
    }
}
