//! Reader for the `meta.json` manifest embedded in `.var` archives.

use crate::config::PathsConfig;
use crate::error::{Result, VarError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// The subset of a package manifest the engine cares about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarMeta {
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub package_name: Option<String>,
    /// First-level dependencies; nested entries describe the dependency's
    /// own dependencies and are not followed.
    #[serde(default)]
    pub dependencies: BTreeMap<String, serde_json::Value>,
}

impl VarMeta {
    pub fn dependency_references(&self) -> Vec<String> {
        self.dependencies.keys().cloned().collect()
    }
}

/// Read `meta.json` from a package archive.
pub fn read_var_meta(path: &Path) -> Result<VarMeta> {
    let file = File::open(path).map_err(|e| VarError::io_with_path(e, path))?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut entry = archive
        .by_name(PathsConfig::META_FILE_NAME)
        .map_err(|e| VarError::Archive {
            message: format!("{}: {}", path.display(), e),
        })?;

    let mut contents = String::new();
    entry
        .read_to_string(&mut contents)
        .map_err(|e| VarError::io_with_path(e, path))?;

    let contents = contents.trim_start_matches('\u{feff}');
    let meta: VarMeta = serde_json::from_str(contents).map_err(|e| VarError::Json {
        message: format!("Failed to parse meta.json in {}: {}", path.display(), e),
        source: Some(e),
    })?;
    Ok(meta)
}

/// Declared dependency references of a package archive.
///
/// A missing or unreadable manifest yields no dependencies.
pub fn read_dependencies(path: &Path) -> Vec<String> {
    match read_var_meta(path) {
        Ok(meta) => meta.dependency_references(),
        Err(e) => {
            debug!("No readable manifest in {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
