//! Package naming conventions.
//!
//! Packages live on disk as `<creator>.<package>.<version>.var`. The base
//! name (`creator.package`) identifies a package across versions and is the
//! key every other component groups by.

use crate::config::PathsConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

/// Full package file names: `Creator.Package[.More].Version.var`.
static VAR_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?P<base>[^.]+\.[^/\\]+)\.(?P<version>\d+)\.var$").unwrap());

/// A package version: a positive integer, or `latest` in references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PackageVersion {
    Number(u32),
    Latest,
}

impl PackageVersion {
    pub fn number(&self) -> Option<u32> {
        match self {
            PackageVersion::Number(n) => Some(*n),
            PackageVersion::Latest => None,
        }
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    /// `Latest` sorts above every concrete version.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (PackageVersion::Number(a), PackageVersion::Number(b)) => a.cmp(b),
            (PackageVersion::Latest, PackageVersion::Latest) => Ordering::Equal,
            (PackageVersion::Latest, _) => Ordering::Greater,
            (_, PackageVersion::Latest) => Ordering::Less,
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageVersion::Number(n) => write!(f, "{}", n),
            PackageVersion::Latest => write!(f, "latest"),
        }
    }
}

impl FromStr for PackageVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(PackageVersion::Latest);
        }
        match s.parse::<u32>() {
            Ok(0) => Err(format!("version must be positive: {}", s)),
            Ok(n) => Ok(PackageVersion::Number(n)),
            Err(_) => Err(format!("invalid package version: {}", s)),
        }
    }
}

impl From<PackageVersion> for String {
    fn from(v: PackageVersion) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Identity of one package version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub creator: String,
    pub package: String,
    pub version: PackageVersion,
}

impl PackageIdentity {
    pub fn new(
        creator: impl Into<String>,
        package: impl Into<String>,
        version: PackageVersion,
    ) -> Self {
        Self {
            creator: creator.into(),
            package: package.into(),
            version,
        }
    }

    /// Parse `Creator.Package.Version`, with or without a `.var` suffix.
    ///
    /// Package names may themselves contain dots; only the final segment
    /// is read as the version.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let stem = strip_var_suffix(name).unwrap_or(name);
        let base = strip_last_segment(stem)?;
        let version: PackageVersion = stem[base.len() + 1..].parse().ok()?;
        let (creator, package) = base.split_once('.')?;
        if creator.is_empty() || package.is_empty() {
            return None;
        }
        Some(Self::new(creator, package, version))
    }

    /// Identity of an on-disk package file.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if !VAR_FILE_NAME.is_match(file_name) {
            return None;
        }
        Self::parse(file_name)
    }

    /// `creator.package`
    pub fn base_name(&self) -> String {
        format!("{}.{}", self.creator, self.package)
    }

    /// `creator.package.version`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.base_name(), self.version)
    }

    /// `creator.package.version.var`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.full_name(), PathsConfig::VAR_EXTENSION)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Strip the last dot-separated segment of a dotted identifier.
///
/// Returns `None` unless a non-empty segment follows the last dot and the
/// dot is not the first character.
pub fn strip_last_segment(identifier: &str) -> Option<&str> {
    let dot = identifier.rfind('.')?;
    if dot == 0 || dot + 1 >= identifier.len() {
        return None;
    }
    Some(&identifier[..dot])
}

/// Base name for either a full name or a base name.
///
/// `A.Foo.3` gives `A.Foo`; `A.Foo` is returned unchanged.
pub fn base_name_of(name: &str) -> String {
    match PackageIdentity::parse(name) {
        Some(identity) => identity.base_name(),
        None => strip_var_suffix(name.trim()).unwrap_or(name.trim()).to_string(),
    }
}

/// Normalize a declared dependency reference to the base name it points at.
///
/// A `.var` suffix is dropped first, then a trailing numeric or `latest`
/// segment. Anything else is left alone.
///
/// # Examples
///
/// ```
/// use varlib_core::naming::normalize_dependency;
///
/// assert_eq!(normalize_dependency("Creator.Pack.var"), "Creator.Pack");
/// assert_eq!(normalize_dependency("Creator.Pack.7"), "Creator.Pack");
/// assert_eq!(normalize_dependency("Creator.Pack.latest"), "Creator.Pack");
/// assert_eq!(normalize_dependency("Creator.Pack.Name.3"), "Creator.Pack.Name");
/// ```
pub fn normalize_dependency(reference: &str) -> String {
    let reference = reference.trim();
    let stem = strip_var_suffix(reference).unwrap_or(reference);

    if let Some(base) = strip_last_segment(stem) {
        let last = &stem[base.len() + 1..];
        if last.parse::<i64>().is_ok() || last.eq_ignore_ascii_case("latest") {
            return base.to_string();
        }
    }
    stem.to_string()
}

/// Case-insensitive key for base-name and path comparisons.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// True when the path's extension is exactly `.var`, in any case.
pub fn is_var_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(PathsConfig::VAR_EXTENSION))
        .unwrap_or(false)
}

/// True when any path segment is the archive directory, in any case.
pub fn is_archived_path(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s.eq_ignore_ascii_case(PathsConfig::ARCHIVE_DIR_NAME))
            .unwrap_or(false)
    })
}

fn strip_var_suffix(name: &str) -> Option<&str> {
    let suffix_len = PathsConfig::VAR_EXTENSION.len() + 1;
    if name.len() <= suffix_len {
        return None;
    }
    // Byte offsets may land inside a multi-byte character.
    let split = name.len() - suffix_len;
    let stem = name.get(..split)?;
    let suffix = name.get(split..)?;
    if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(PathsConfig::VAR_EXTENSION) {
        Some(stem)
    } else {
        None
    }
}
