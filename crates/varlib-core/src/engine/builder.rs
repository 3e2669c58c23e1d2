//! Builder for configuring PackageEngine initialization.

use std::sync::Arc;
use std::time::Duration;

use super::PackageEngine;
use crate::config::{BatchConfig, StorageRoots};
use crate::duplicates::DuplicateResolver;
use crate::error::{Result, VarError};
use crate::fileops::{FileOperations, SafeFileOperator};
use crate::locator::InstanceLocator;
use crate::metadata::{MetadataCatalog, MetadataLookup};
use crate::orchestrator::{HandleReleaser, LoadUnloadOrchestrator, NoopReleaser};
use crate::status::StatusIndex;
use tracing::info;

/// Builder for configuring PackageEngine initialization.
///
/// # Example
///
/// ```rust,ignore
/// use varlib_core::{PackageEngine, StorageRoots};
///
/// let roots = StorageRoots::new("/vam/AddonPackages", "/vam/AllPackages");
/// let engine = PackageEngine::builder(roots)
///     .auto_create_dirs(true)
///     .build()
///     .await?;
/// ```
pub struct PackageEngineBuilder {
    roots: StorageRoots,
    metadata: Option<Arc<dyn MetadataLookup>>,
    releaser: Option<Arc<dyn HandleReleaser>>,
    file_ops: Option<Arc<dyn FileOperations>>,
    throttle_window: Duration,
    auto_create_dirs: bool,
}

impl PackageEngineBuilder {
    /// Create a new builder for the given storage roots.
    pub fn new(roots: StorageRoots) -> Self {
        Self {
            roots,
            metadata: None,
            releaser: None,
            file_ops: None,
            throttle_window: BatchConfig::THROTTLE_WINDOW,
            auto_create_dirs: false,
        }
    }

    /// Metadata source for dependencies, external paths and version flags.
    ///
    /// Default: a catalog built by scanning the roots at build time.
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataLookup>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Collaborator asked to release file handles before each batch.
    ///
    /// Default: no-op.
    pub fn with_handle_releaser(mut self, releaser: Arc<dyn HandleReleaser>) -> Self {
        self.releaser = Some(releaser);
        self
    }

    /// Replace the file operator, e.g. with a spy in tests.
    ///
    /// Default: [`SafeFileOperator`] on the real filesystem.
    pub fn with_file_operations(mut self, ops: Arc<dyn FileOperations>) -> Self {
        self.file_ops = Some(ops);
        self
    }

    /// Window within which a repeat of the same operation is rejected.
    ///
    /// Default: [`BatchConfig::THROTTLE_WINDOW`]
    pub fn throttle_window(mut self, window: Duration) -> Self {
        self.throttle_window = window;
        self
    }

    /// Create the loaded and available roots if they don't exist.
    ///
    /// Default: `false` (missing roots scan as empty)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    fn create_roots(roots: &StorageRoots) -> Result<()> {
        for dir in [&roots.loaded_root, &roots.available_root] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| VarError::Io {
                    message: format!("Failed to create root: {}", dir.display()),
                    path: Some(dir.clone()),
                    source: Some(e),
                })?;
            }
        }
        Ok(())
    }

    /// Build the PackageEngine instance.
    pub async fn build(self) -> Result<PackageEngine> {
        if !self.roots.is_configured() {
            return Err(VarError::NoRootsConfigured);
        }
        self.roots.validate()?;
        if self.auto_create_dirs {
            Self::create_roots(&self.roots)?;
        }

        let locator = InstanceLocator::new(self.roots.clone());
        let metadata: Arc<dyn MetadataLookup> = match self.metadata {
            Some(metadata) => metadata,
            None => {
                let catalog =
                    MetadataCatalog::from_scan(&locator.scan_all(), &locator.scan_archived());
                info!("Scanned {} packages for metadata", catalog.len());
                Arc::new(catalog)
            }
        };
        let ops: Arc<dyn FileOperations> = match self.file_ops {
            Some(ops) => ops,
            None => Arc::new(SafeFileOperator::new().with_create_dirs(true)),
        };
        let releaser: Arc<dyn HandleReleaser> = match self.releaser {
            Some(releaser) => releaser,
            None => Arc::new(NoopReleaser),
        };

        let status = Arc::new(StatusIndex::new(locator.clone(), metadata.clone()));
        let orchestrator = LoadUnloadOrchestrator::new(
            self.roots.clone(),
            metadata.clone(),
            ops.clone(),
            status.clone(),
        )
        .with_releaser(releaser)
        .with_throttle_window(self.throttle_window);
        let resolver = DuplicateResolver::new(ops);

        Ok(PackageEngine {
            roots: self.roots,
            locator,
            metadata,
            status,
            orchestrator,
            resolver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_requires_roots() {
        let err = PackageEngineBuilder::new(StorageRoots::default())
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, VarError::NoRootsConfigured));
    }

    #[tokio::test]
    async fn test_auto_create_dirs() {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::new(temp.path().join("loaded"), temp.path().join("avail"));

        PackageEngineBuilder::new(roots.clone())
            .auto_create_dirs(true)
            .build()
            .await
            .unwrap();
        assert!(roots.loaded_root.is_dir());
        assert!(roots.available_root.is_dir());
    }

    #[tokio::test]
    async fn test_missing_roots_are_allowed_without_auto_create() {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::new(temp.path().join("loaded"), temp.path().join("avail"));

        let engine = PackageEngineBuilder::new(roots.clone()).build().await.unwrap();
        assert!(!roots.loaded_root.exists());
        assert!(engine.locate("A.Foo").is_empty());
    }
}
