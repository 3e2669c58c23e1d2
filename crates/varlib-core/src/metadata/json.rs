//! Reads the JSON files a host hands the engine: the roots file and
//! exported metadata catalogs.

use crate::error::{Result, VarError};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::Path;

/// Parse a roots file or catalog snapshot.
///
/// A file that is not there yet gives `Ok(None)` so callers can fall back
/// to defaults. A UTF-8 byte order mark, as written by some Windows
/// editors, is ignored.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(VarError::io_with_path(e, path)),
    };

    serde_json::from_str(contents.trim_start_matches('\u{feff}'))
        .map(Some)
        .map_err(|e| VarError::Json {
            message: format!("Failed to parse {}: {}", path.display(), e),
            source: Some(e),
        })
}
