//! Centralized configuration for the varlib engine.
//!
//! Constants live as associated consts on unit structs. Storage roots are
//! supplied by the host's settings layer and are read-only to the engine.

use crate::error::{Result, VarError};
use crate::metadata::read_json;
use crate::models::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Safe file operation policy.
pub struct FileOpsConfig;

impl FileOpsConfig {
    pub const MAX_ATTEMPTS: u32 = 5;
    /// Linear backoff: attempt `n` waits `BACKOFF_STEP * n`.
    pub const BACKOFF_STEP: Duration = Duration::from_millis(50);
    pub const CONFLICT_SUFFIX: &'static str = "_conflict";
    pub const MAX_CONFLICT_INDEX: u32 = 10_000;
}

/// Batch orchestration tuning.
pub struct BatchConfig;

impl BatchConfig {
    pub const THROTTLE_WINDOW: Duration = Duration::from_secs(2);
    pub const THROTTLE_CAPACITY: u64 = 4_096;
    pub const YIELD_EVERY: usize = 10;
    pub const MAX_SUMMARY_MESSAGES: usize = 10;
}

/// On-disk naming conventions.
pub struct PathsConfig;

impl PathsConfig {
    pub const ARCHIVE_DIR_NAME: &'static str = "ArchivedPackages";
    pub const VAR_EXTENSION: &'static str = "var";
    pub const META_FILE_NAME: &'static str = "meta.json";
    pub const CONFIG_DIR_NAME: &'static str = "varlib";
    pub const ROOTS_FILE_NAME: &'static str = "roots.json";
}

/// An additional storage root configured by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDestination {
    /// Destination name, also used as the external role id.
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Validity as judged by the settings layer.
    #[serde(default = "default_true")]
    pub valid: bool,
    /// Display color (`#RRGGBB`) for packages living here.
    #[serde(default)]
    pub color: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ExternalDestination {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            enabled: true,
            valid: true,
            color: None,
        }
    }

    /// Only enabled, valid destinations whose directory exists are scanned.
    pub fn is_active(&self) -> bool {
        self.enabled && self.valid && self.path.exists()
    }
}

/// The set of roots the engine scans and mutates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRoots {
    pub loaded_root: PathBuf,
    pub available_root: PathBuf,
    #[serde(default)]
    pub external: Vec<ExternalDestination>,
}

impl StorageRoots {
    pub fn new(loaded_root: impl Into<PathBuf>, available_root: impl Into<PathBuf>) -> Self {
        Self {
            loaded_root: loaded_root.into(),
            available_root: available_root.into(),
            external: Vec::new(),
        }
    }

    pub fn with_external(mut self, destination: ExternalDestination) -> Self {
        self.external.push(destination);
        self
    }

    /// Load roots from a JSON settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let roots: Option<StorageRoots> = read_json(path)?;
        let roots = roots.ok_or_else(|| VarError::Config {
            message: format!("Roots file does not exist: {}", path.display()),
        })?;
        roots.validate()?;
        Ok(roots)
    }

    /// True when at least one primary root has been set.
    pub fn is_configured(&self) -> bool {
        !self.loaded_root.as_os_str().is_empty() || !self.available_root.as_os_str().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.loaded_root.as_os_str().is_empty() {
            return Err(VarError::Validation {
                field: "loaded_root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.available_root.as_os_str().is_empty() {
            return Err(VarError::Validation {
                field: "available_root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.loaded_root == self.available_root {
            return Err(VarError::Validation {
                field: "available_root".into(),
                message: "must differ from loaded_root".into(),
            });
        }
        Ok(())
    }

    pub fn active_external(&self) -> impl Iterator<Item = &ExternalDestination> {
        self.external.iter().filter(|d| d.is_active())
    }

    pub fn destination(&self, name: &str) -> Option<&ExternalDestination> {
        self.external
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Every root to scan, paired with the role its files play.
    pub fn scan_roots(&self) -> Vec<(PathBuf, Role)> {
        let mut roots = vec![
            (self.loaded_root.clone(), Role::Loaded),
            (self.available_root.clone(), Role::Available),
        ];
        roots.extend(
            self.active_external()
                .map(|d| (d.path.clone(), Role::External(d.name.clone()))),
        );
        roots
    }

    /// Root directory for a role, if that role is configured.
    pub fn root_for(&self, role: &Role) -> Option<&Path> {
        match role {
            Role::Loaded => Some(self.loaded_root.as_path()),
            Role::Available => Some(self.available_root.as_path()),
            Role::External(name) => self.destination(name).map(|d| d.path.as_path()),
        }
    }

    /// Which configured root a path lives under, if any.
    pub fn role_of(&self, path: &Path) -> Option<Role> {
        self.scan_roots()
            .into_iter()
            .find(|(root, _)| path.starts_with(root))
            .map(|(_, role)| role)
    }
}
