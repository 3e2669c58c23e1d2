//! Guarded move and delete of package files.
//!
//! A move runs as a small state machine:
//!
//! ```text
//! Renaming --ok--> Done
//!    |  \--transient, attempts left--> Retrying --backoff--> Renaming
//!    \--attempts exhausted or permanent--> CopyFallback --> Done | Failed
//! ```
//!
//! The copy fallback covers cross-volume moves and files that stay locked
//! for renaming. Timestamps are carried over to the copy.

use super::backend::{FileSystem, StdFileSystem};
use super::conflict::resolve_conflict;
use super::retry::{is_transient, retry_io, RetryPolicy, Sleeper, TokioSleeper};
use crate::error::{Result, VarError};
use crate::naming::is_var_file;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mutating file operations used by resolution and relocation batches.
#[async_trait]
pub trait FileOperations: Send + Sync {
    /// Move `src` to `dst`, or to a conflict-renamed sibling of `dst` if
    /// that name is taken. Returns the final destination.
    async fn move_file(&self, src: &Path, dst: &Path) -> Result<PathBuf>;

    async fn delete_file(&self, path: &Path) -> Result<()>;
}

/// States of a single move.
#[derive(Debug)]
pub enum MoveState {
    Renaming { attempt: u32 },
    Retrying { attempt: u32, error: String },
    CopyFallback { rename_attempts: u32, rename_error: String },
    Done,
    Failed(VarError),
}

impl MoveState {
    /// Next state after rename attempt `attempt` (1-indexed) returned `result`.
    pub fn after_rename(
        attempt: u32,
        result: io::Result<()>,
        policy: &RetryPolicy,
        src: &Path,
    ) -> MoveState {
        match result {
            Ok(()) => MoveState::Done,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                MoveState::Failed(VarError::FileNotFound(src.to_path_buf()))
            }
            Err(e) if is_transient(&e) && attempt < policy.max_attempts => MoveState::Retrying {
                attempt,
                error: e.to_string(),
            },
            Err(e) => MoveState::CopyFallback {
                rename_attempts: attempt,
                rename_error: e.to_string(),
            },
        }
    }
}

/// [`FileOperations`] with the extension guard, retry/backoff, copy
/// fallback and conflict renaming.
#[derive(Clone)]
pub struct SafeFileOperator {
    fs: Arc<dyn FileSystem>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    create_dirs: bool,
}

impl std::fmt::Debug for SafeFileOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeFileOperator")
            .field("policy", &self.policy)
            .field("create_dirs", &self.create_dirs)
            .finish()
    }
}

impl Default for SafeFileOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeFileOperator {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(StdFileSystem),
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::default(),
            create_dirs: true,
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create missing destination directories (default: true).
    pub fn with_create_dirs(mut self, create: bool) -> Self {
        self.create_dirs = create;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn ensure_parent(&self, dst: &Path) -> Result<()> {
        let Some(parent) = dst.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() || self.fs.exists(parent) {
            return Ok(());
        }
        if !self.create_dirs {
            return Err(VarError::DirectoryCreation {
                path: parent.to_path_buf(),
                message: "directory does not exist".into(),
            });
        }
        self.fs
            .create_dir_all(parent)
            .map_err(|e| VarError::DirectoryCreation {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })
    }

    async fn drive_move(&self, src: &Path, dst: &Path) -> Result<PathBuf> {
        let mut state = MoveState::Renaming { attempt: 1 };
        loop {
            state = match state {
                MoveState::Renaming { attempt } => {
                    let result = self.fs.rename(src, dst);
                    MoveState::after_rename(attempt, result, &self.policy, src)
                }
                MoveState::Retrying { attempt, error } => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Rename {} attempt {}/{} failed: {}. Retrying in {:?}",
                        src.display(),
                        attempt,
                        self.policy.max_attempts,
                        error,
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                    MoveState::Renaming {
                        attempt: attempt + 1,
                    }
                }
                MoveState::CopyFallback {
                    rename_attempts,
                    rename_error,
                } => {
                    debug!(
                        "Rename of {} failed ({}), falling back to copy and delete",
                        src.display(),
                        rename_error
                    );
                    self.copy_then_delete(src, dst, rename_attempts).await
                }
                MoveState::Done => {
                    debug!("Moved {} -> {}", src.display(), dst.display());
                    return Ok(dst.to_path_buf());
                }
                MoveState::Failed(err) => return Err(err),
            };
        }
    }

    async fn copy_then_delete(&self, src: &Path, dst: &Path, rename_attempts: u32) -> MoveState {
        let (copied, stats) = retry_io(&self.policy, self.sleeper.as_ref(), "copy", || {
            self.fs.copy_preserving_times(src, dst)
        })
        .await;
        if let Err(e) = copied {
            self.discard_partial(dst);
            return MoveState::Failed(VarError::FileLocked {
                path: src.to_path_buf(),
                attempts: rename_attempts + stats.attempts,
                message: format!("copy fallback failed: {}", e),
            });
        }

        let (removed, stats) = retry_io(&self.policy, self.sleeper.as_ref(), "delete source", || {
            self.fs.remove_file(src)
        })
        .await;
        match removed {
            Ok(()) => MoveState::Done,
            Err(e) => {
                // Leave exactly one copy behind: the untouched source.
                self.discard_partial(dst);
                MoveState::Failed(VarError::FileLocked {
                    path: src.to_path_buf(),
                    attempts: rename_attempts + stats.attempts,
                    message: format!("source could not be removed after copy: {}", e),
                })
            }
        }
    }

    fn discard_partial(&self, dst: &Path) {
        if self.fs.exists(dst) {
            if let Err(e) = self.fs.remove_file(dst) {
                warn!("Failed to remove partial copy {}: {}", dst.display(), e);
            }
        }
    }
}

fn guard(path: &Path) -> Result<()> {
    if is_var_file(path) {
        Ok(())
    } else {
        Err(VarError::NotVarFile(path.to_path_buf()))
    }
}

#[async_trait]
impl FileOperations for SafeFileOperator {
    async fn move_file(&self, src: &Path, dst: &Path) -> Result<PathBuf> {
        guard(src)?;
        guard(dst)?;
        if !self.fs.exists(src) {
            return Err(VarError::FileNotFound(src.to_path_buf()));
        }
        if src == dst {
            return Ok(dst.to_path_buf());
        }

        self.ensure_parent(dst)?;
        let target = resolve_conflict(self.fs.as_ref(), dst)?;
        if target != dst {
            info!(
                "{} already exists, moving to {}",
                dst.display(),
                target.display()
            );
        }
        self.drive_move(src, &target).await
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        guard(path)?;
        if !self.fs.exists(path) {
            return Err(VarError::FileNotFound(path.to_path_buf()));
        }

        let (result, stats) = retry_io(&self.policy, self.sleeper.as_ref(), "delete", || {
            self.fs.remove_file(path)
        })
        .await;
        match result {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VarError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => Err(VarError::FileLocked {
                path: path.to_path_buf(),
                attempts: stats.attempts,
                message: e.to_string(),
            }),
        }
    }
}
