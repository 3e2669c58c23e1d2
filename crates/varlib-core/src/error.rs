//! Error types for the varlib engine.
//!
//! Errors fall into four families, mirroring how callers are expected to
//! react to them:
//! - precondition errors abort a batch before any file is touched
//! - per-item mutation errors are collected while the batch continues
//! - throttle errors mark a repeat operation that arrived too soon
//! - discovery errors never surface here; missing roots scan as empty

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the varlib engine.
#[derive(Debug, Error)]
pub enum VarError {
    // Precondition errors
    #[error("Operation aborted: {reason}")]
    Aborted { reason: String },

    #[error("No storage roots are configured")]
    NoRootsConfigured,

    #[error("No packages were selected")]
    EmptySelection,

    #[error("No duplicate group has a keep decision")]
    NothingSelected,

    // Per-item mutation errors
    #[error("{0}: not a .var file, skipped for safety")]
    NotVarFile(PathBuf),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("File is locked or busy after {attempts} attempts: {path}: {message}")]
    FileLocked {
        path: PathBuf,
        attempts: u32,
        message: String,
    },

    #[error("Failed to create destination directory {path}: {message}")]
    DirectoryCreation { path: PathBuf, message: String },

    #[error("No free conflict name for {0}")]
    ConflictNamesExhausted(PathBuf),

    #[error("Package {name} was not found in the {root} root")]
    NotInRoot { name: String, root: String },

    #[error("Package {0} is not flagged as an old version")]
    NotOldVersion(String),

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Throttle errors
    #[error("{name}: {operation} was recently performed, try again in {window:?}")]
    Throttled {
        name: String,
        operation: String,
        window: Duration,
    },

    // Metadata errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Package archive error: {message}")]
    Archive { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },
}

/// Result type alias for varlib operations.
pub type Result<T> = std::result::Result<T, VarError>;

impl From<std::io::Error> for VarError {
    fn from(err: std::io::Error) -> Self {
        VarError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for VarError {
    fn from(err: serde_json::Error) -> Self {
        VarError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<zip::result::ZipError> for VarError {
    fn from(err: zip::result::ZipError) -> Self {
        VarError::Archive {
            message: err.to_string(),
        }
    }
}

impl VarError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        VarError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if this error is transient and the operation may be retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            VarError::FileLocked { .. } | VarError::Throttled { .. } => true,
            VarError::Io {
                source: Some(source),
                ..
            } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::InvalidInput
            ),
            _ => false,
        }
    }

    /// True for the "recently performed" class, which callers report
    /// separately from genuine failures.
    pub fn is_throttle(&self) -> bool {
        matches!(self, VarError::Throttled { .. })
    }

    /// True for errors that abort a whole batch before any mutation.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            VarError::Aborted { .. }
                | VarError::NoRootsConfigured
                | VarError::EmptySelection
                | VarError::NothingSelected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VarError::NotVarFile(PathBuf::from("/lib/readme.txt"));
        assert_eq!(
            err.to_string(),
            "/lib/readme.txt: not a .var file, skipped for safety"
        );
    }

    #[test]
    fn test_throttle_classification() {
        let err = VarError::Throttled {
            name: "A.Foo".into(),
            operation: "load".into(),
            window: Duration::from_secs(2),
        };
        assert!(err.is_throttle());
        assert!(err.to_string().contains("recently performed"));
        assert!(!VarError::EmptySelection.is_throttle());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(VarError::FileLocked {
            path: PathBuf::from("a.var"),
            attempts: 5,
            message: "busy".into(),
        }
        .is_retryable());

        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!VarError::from(not_found).is_retryable());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        assert!(VarError::from(denied).is_retryable());
    }

    #[test]
    fn test_precondition_errors() {
        assert!(VarError::EmptySelection.is_precondition());
        assert!(VarError::Aborted {
            reason: "cancelled".into()
        }
        .is_precondition());
        assert!(!VarError::FileNotFound(PathBuf::from("x.var")).is_precondition());
    }
}
