use super::backend::FileSystem;
use crate::config::FileOpsConfig;
use crate::error::{Result, VarError};
use std::path::{Path, PathBuf};

/// `dir/name.ext` -> `dir/name_conflict{index}.ext`
pub fn conflict_name(path: &Path, index: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!(
            "{}{}{}.{}",
            stem,
            FileOpsConfig::CONFLICT_SUFFIX,
            index,
            ext.to_string_lossy()
        ),
        None => format!("{}{}{}", stem, FileOpsConfig::CONFLICT_SUFFIX, index),
    };
    path.with_file_name(file_name)
}

/// First free destination: `dst` itself, else the lowest free conflict name.
pub fn resolve_conflict(fs: &dyn FileSystem, dst: &Path) -> Result<PathBuf> {
    if !fs.exists(dst) {
        return Ok(dst.to_path_buf());
    }
    (1..=FileOpsConfig::MAX_CONFLICT_INDEX)
        .map(|i| conflict_name(dst, i))
        .find(|candidate| !fs.exists(candidate))
        .ok_or_else(|| VarError::ConflictNamesExhausted(dst.to_path_buf()))
}
