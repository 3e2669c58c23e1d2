//! The engine facade hosts consume.
//!
//! The struct lives here; each submodule adds an `impl PackageEngine`
//! block for one area of the public API.

mod batch;
mod builder;
mod duplicates;

pub use builder::PackageEngineBuilder;

use crate::config::StorageRoots;
use crate::duplicates::DuplicateResolver;
use crate::locator::InstanceLocator;
use crate::metadata::MetadataLookup;
use crate::models::{FileInstance, PackageStatus, StatusDisplay};
use crate::orchestrator::LoadUnloadOrchestrator;
use crate::status::StatusIndex;
use std::collections::HashMap;
use std::sync::Arc;

/// Package file state and resolution engine.
pub struct PackageEngine {
    pub(crate) roots: StorageRoots,
    pub(crate) locator: InstanceLocator,
    pub(crate) metadata: Arc<dyn MetadataLookup>,
    pub(crate) status: Arc<StatusIndex>,
    pub(crate) orchestrator: LoadUnloadOrchestrator,
    pub(crate) resolver: DuplicateResolver,
}

impl PackageEngine {
    pub fn builder(roots: StorageRoots) -> PackageEngineBuilder {
        PackageEngineBuilder::new(roots)
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    pub fn metadata(&self) -> &dyn MetadataLookup {
        self.metadata.as_ref()
    }

    /// Every live instance of a package across all active roots.
    pub fn locate(&self, base_name: &str) -> Vec<FileInstance> {
        self.locator.locate(base_name)
    }

    /// Distinct base names present on disk.
    pub fn base_names(&self) -> Vec<String> {
        self.locator.base_names()
    }

    pub async fn status(&self, name: &str) -> PackageStatus {
        self.status.status(name).await
    }

    pub async fn statuses(&self, names: &[String]) -> HashMap<String, PackageStatus> {
        self.status.statuses(names).await
    }

    pub async fn refresh_status(&self, force: bool) {
        self.status.refresh(force).await
    }

    pub fn status_display(&self, status: &PackageStatus) -> StatusDisplay {
        StatusDisplay::for_status(status, &self.roots)
    }
}

impl std::fmt::Debug for PackageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageEngine")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}
