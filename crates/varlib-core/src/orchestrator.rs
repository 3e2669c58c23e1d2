//! Load/unload orchestrator: batched relocation of package files.
//!
//! A batch expands dependencies when asked, lets the host release file
//! handles, then moves items one at a time. One item failing never stops
//! the batch. Every attempted item yields exactly one
//! [`OperationResult`]; items skipped by cancellation yield none.

use crate::cancel::CancellationToken;
use crate::config::{BatchConfig, PathsConfig, StorageRoots};
use crate::dependencies::{resolve_dependencies, DependencySource};
use crate::error::{Result, VarError};
use crate::fileops::FileOperations;
use crate::locator::InstanceLocator;
use crate::metadata::MetadataLookup;
use crate::models::{BatchOutcome, FileInstance, OperationKind, OperationResult, Role};
use crate::naming::{base_name_of, name_key, PackageIdentity};
use crate::status::StatusIndex;
use async_trait::async_trait;
use mini_moka::sync::Cache;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Progress callback: `(completed, total, current_name)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &str) + Send + Sync + 'static>;

/// Host collaborator that closes any handles it holds on package files.
#[async_trait]
pub trait HandleReleaser: Send + Sync {
    /// Return once the named packages are safe to move.
    async fn release_handles(&self, names: &[String]);
}

/// For hosts that never hold package files open.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReleaser;

#[async_trait]
impl HandleReleaser for NoopReleaser {
    async fn release_handles(&self, _names: &[String]) {}
}

/// Where an item's file lives or goes outside the primary roots.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    /// Resolved by name against the loaded and available roots.
    RootRelative,
    /// Load: the package file recorded by the metadata layer.
    ExternalSource(PathBuf),
    /// Unload: the external destination root the package returns to.
    ExternalTarget(PathBuf),
}

impl Placement {
    fn is_external(&self) -> bool {
        !matches!(self, Placement::RootRelative)
    }
}

#[derive(Debug, Clone)]
struct WorkItem {
    name: String,
    placement: Placement,
}

/// Drives load, unload and archive batches.
pub struct LoadUnloadOrchestrator {
    roots: StorageRoots,
    locator: InstanceLocator,
    lookup: Arc<dyn MetadataLookup>,
    ops: Arc<dyn FileOperations>,
    status: Arc<StatusIndex>,
    releaser: Arc<dyn HandleReleaser>,
    throttle: Cache<String, ()>,
    throttle_window: Duration,
}

impl LoadUnloadOrchestrator {
    pub fn new(
        roots: StorageRoots,
        lookup: Arc<dyn MetadataLookup>,
        ops: Arc<dyn FileOperations>,
        status: Arc<StatusIndex>,
    ) -> Self {
        Self {
            locator: InstanceLocator::new(roots.clone()),
            roots,
            lookup,
            ops,
            status,
            releaser: Arc::new(NoopReleaser),
            throttle: Self::throttle_cache(BatchConfig::THROTTLE_WINDOW),
            throttle_window: BatchConfig::THROTTLE_WINDOW,
        }
    }

    pub fn with_releaser(mut self, releaser: Arc<dyn HandleReleaser>) -> Self {
        self.releaser = releaser;
        self
    }

    pub fn with_throttle_window(mut self, window: Duration) -> Self {
        self.throttle = Self::throttle_cache(window);
        self.throttle_window = window;
        self
    }

    fn throttle_cache(window: Duration) -> Cache<String, ()> {
        Cache::builder()
            .max_capacity(BatchConfig::THROTTLE_CAPACITY)
            .time_to_live(window)
            .build()
    }

    /// Run a load or unload batch.
    ///
    /// Fails up front only on precondition errors: an empty selection or
    /// unconfigured roots. Archive requests are routed to [`Self::archive`].
    pub async fn run(
        &self,
        names: &[String],
        kind: OperationKind,
        with_deps: bool,
        progress: Option<ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchOutcome> {
        if kind == OperationKind::Archive {
            return self.archive(names, progress, cancel).await;
        }
        let requested = self.check_preconditions(names)?;

        let mut items: Vec<WorkItem> = requested
            .iter()
            .map(|name| WorkItem {
                placement: self.placement(name, kind),
                name: name.clone(),
            })
            .collect();
        let requested_count = items.len();

        if with_deps {
            items.extend(self.dependency_items(&requested, kind).await);
        }
        let dependency_count = items.len() - requested_count;

        let names: Vec<String> = items.iter().map(|i| i.name.clone()).collect();
        self.releaser.release_handles(&names).await;

        // External items first; order is otherwise kept.
        let (mut ordered, root_relative): (Vec<WorkItem>, Vec<WorkItem>) =
            items.into_iter().partition(|i| i.placement.is_external());
        ordered.extend(root_relative);

        let mut outcome = BatchOutcome {
            requested_count,
            dependency_count,
            ..Default::default()
        };
        let total = ordered.len();
        let mut successes = 0;

        for item in &ordered {
            if CancellationToken::requested(cancel) {
                info!("{} batch cancelled after {} items", kind, outcome.results.len());
                outcome.cancelled = true;
                break;
            }

            let result = match self.throttled(&item.name, kind) {
                Some(err) => OperationResult::from_error(&item.name, &err),
                None => match self.relocate(item, kind).await {
                    Ok(dst) => {
                        debug!("{} {} -> {}", kind.past_tense(), item.name, dst.display());
                        self.record_success(&item.name, kind);
                        OperationResult::succeeded(&item.name)
                    }
                    Err(e) => {
                        warn!("Failed to {} {}: {}", kind, item.name, e);
                        OperationResult::from_error(&item.name, &e)
                    }
                },
            };
            if result.success {
                successes += 1;
                if successes % BatchConfig::YIELD_EVERY == 0 {
                    tokio::task::yield_now().await;
                }
            }
            outcome.results.push(result);

            if let Some(progress) = &progress {
                progress(outcome.results.len(), total, &item.name);
            }
        }

        self.finish(&outcome, kind).await;
        Ok(outcome)
    }

    /// Move packages flagged as old versions into the archive subtree of
    /// the root they live in, keeping their relative path.
    pub async fn archive(
        &self,
        names: &[String],
        progress: Option<ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchOutcome> {
        let kind = OperationKind::Archive;
        let requested = self.check_preconditions(names)?;
        self.releaser.release_handles(&requested).await;

        let mut outcome = BatchOutcome {
            requested_count: requested.len(),
            ..Default::default()
        };
        let total = requested.len();

        for name in &requested {
            if CancellationToken::requested(cancel) {
                outcome.cancelled = true;
                break;
            }

            let result = match self.throttled(name, kind) {
                Some(err) => OperationResult::from_error(name, &err),
                None => match self.archive_one(name).await {
                    Ok(dst) => {
                        debug!("Archived {} -> {}", name, dst.display());
                        self.record_success(name, kind);
                        OperationResult::succeeded(name)
                    }
                    Err(e) => {
                        warn!("Failed to archive {}: {}", name, e);
                        OperationResult::from_error(name, &e)
                    }
                },
            };
            outcome.results.push(result);

            if let Some(progress) = &progress {
                progress(outcome.results.len(), total, name);
            }
        }

        self.finish(&outcome, kind).await;
        Ok(outcome)
    }

    /// Trimmed, case-insensitively deduplicated selection.
    fn check_preconditions(&self, names: &[String]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let requested: Vec<String> = names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty() && seen.insert(name_key(n)))
            .map(str::to_string)
            .collect();
        if requested.is_empty() {
            return Err(VarError::EmptySelection);
        }
        if !self.roots.is_configured() {
            return Err(VarError::NoRootsConfigured);
        }
        Ok(requested)
    }

    async fn dependency_items(&self, requested: &[String], kind: OperationKind) -> Vec<WorkItem> {
        let candidates = crate::dependencies::expand(requested, self.lookup.as_ref());
        let statuses = self.status.statuses(&candidates).await;

        resolve_dependencies(requested, self.lookup.as_ref(), kind, |base| {
            statuses
                .get(base)
                .cloned()
                .unwrap_or(crate::models::PackageStatus::Missing)
        })
        .into_iter()
        .map(|dep| {
            // External sources are addressed by the exact file on record.
            let name = match dep.source {
                DependencySource::External { .. } => dep.metadata.full_name.clone(),
                DependencySource::Local | DependencySource::Archived => dep.base_name.clone(),
            };
            WorkItem {
                placement: self.placement(&name, kind),
                name,
            }
        })
        .collect()
    }

    fn placement(&self, name: &str, kind: OperationKind) -> Placement {
        let Some(record) = self.lookup.resolve(name) else {
            return Placement::RootRelative;
        };
        match kind {
            OperationKind::Load => match record.file_path {
                Some(path) if !self.in_primary_root(&path) && path.exists() => {
                    Placement::ExternalSource(path)
                }
                _ => Placement::RootRelative,
            },
            OperationKind::Unload => record
                .external_destination
                .as_deref()
                .and_then(|d| self.roots.destination(d))
                .filter(|d| d.is_active())
                .map(|d| Placement::ExternalTarget(d.path.clone()))
                .unwrap_or(Placement::RootRelative),
            OperationKind::Archive => Placement::RootRelative,
        }
    }

    fn in_primary_root(&self, path: &Path) -> bool {
        path.starts_with(&self.roots.loaded_root) || path.starts_with(&self.roots.available_root)
    }

    fn throttle_key(name: &str, kind: OperationKind) -> String {
        format!("{}:{}", kind.as_str(), name_key(name))
    }

    fn throttled(&self, name: &str, kind: OperationKind) -> Option<VarError> {
        self.throttle
            .contains_key(&Self::throttle_key(name, kind))
            .then(|| VarError::Throttled {
                name: name.to_string(),
                operation: kind.as_str().to_string(),
                window: self.throttle_window,
            })
    }

    fn record_success(&self, name: &str, kind: OperationKind) {
        self.throttle.insert(Self::throttle_key(name, kind), ());
    }

    async fn relocate(&self, item: &WorkItem, kind: OperationKind) -> Result<PathBuf> {
        let (src, dst) = match (kind, &item.placement) {
            (OperationKind::Load, Placement::ExternalSource(path)) => {
                let rel = self.relative_to_role_root(path);
                (path.clone(), self.roots.loaded_root.join(rel))
            }
            (OperationKind::Load, _) => {
                let src = match self.find_source(&item.name, &Role::Available) {
                    Ok(src) => src,
                    Err(VarError::NotInRoot { .. }) if self.has_archived(&item.name) => {
                        return self.restore_archived(&item.name).await;
                    }
                    Err(e) => return Err(e),
                };
                let rel = relative_to(&src.path, &self.roots.available_root);
                (src.path, self.roots.loaded_root.join(rel))
            }
            (OperationKind::Unload, placement) => {
                let src = self.find_source(&item.name, &Role::Loaded)?;
                let rel = relative_to(&src.path, &self.roots.loaded_root);
                let target_root = match placement {
                    Placement::ExternalTarget(root) => root.as_path(),
                    _ => self.roots.available_root.as_path(),
                };
                (src.path, target_root.join(rel))
            }
            (OperationKind::Archive, _) => return self.archive_one(&item.name).await,
        };
        self.ops.move_file(&src, &dst).await
    }

    async fn archive_one(&self, name: &str) -> Result<PathBuf> {
        let record = self
            .lookup
            .resolve(name)
            .ok_or_else(|| VarError::NotOldVersion(name.to_string()))?;
        if !record.is_old_version {
            return Err(VarError::NotOldVersion(record.full_name));
        }

        let wanted = name_key(&format!("{}.{}", record.full_name, PathsConfig::VAR_EXTENSION));
        let base = record.base_name();
        let instance = [Role::Loaded, Role::Available]
            .iter()
            .flat_map(|role| self.locator.locate_in(&base, role))
            .find(|i| name_key(&i.file_name) == wanted)
            .ok_or_else(|| VarError::NotInRoot {
                name: record.full_name.clone(),
                root: "loaded or available".into(),
            })?;

        let root = self
            .roots
            .root_for(&instance.role)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let dst = root
            .join(PathsConfig::ARCHIVE_DIR_NAME)
            .join(relative_to(&instance.path, &root));
        self.ops.move_file(&instance.path, &dst).await
    }

    /// The instance a name refers to within one role's root.
    fn find_source(&self, name: &str, role: &Role) -> Result<FileInstance> {
        let instances = self.locator.locate_in(&base_name_of(name), role);
        pick_instance(name, instances).ok_or_else(|| VarError::NotInRoot {
            name: name.to_string(),
            root: role.label().to_string(),
        })
    }

    fn has_archived(&self, name: &str) -> bool {
        pick_instance(name, self.locator.locate_archived(&base_name_of(name))).is_some()
    }

    /// Load straight out of an archive subtree, dropping the archive
    /// segment from the relative path.
    async fn restore_archived(&self, name: &str) -> Result<PathBuf> {
        let src = pick_instance(name, self.locator.locate_archived(&base_name_of(name)))
            .ok_or_else(|| VarError::NotInRoot {
                name: name.to_string(),
                root: PathsConfig::ARCHIVE_DIR_NAME.to_string(),
            })?;
        let archive_root = self
            .roots
            .root_for(&src.role)
            .map(|root| root.join(PathsConfig::ARCHIVE_DIR_NAME))
            .unwrap_or_default();
        let dst = self
            .roots
            .loaded_root
            .join(relative_to(&src.path, &archive_root));
        debug!("Restoring archived {} from {}", name, src.path.display());
        self.ops.move_file(&src.path, &dst).await
    }

    fn relative_to_role_root(&self, path: &Path) -> PathBuf {
        match self.roots.role_of(path).and_then(|r| self.roots.root_for(&r).map(Path::to_path_buf)) {
            Some(root) => relative_to(path, &root),
            None => file_name_of(path),
        }
    }

    async fn finish(&self, outcome: &BatchOutcome, kind: OperationKind) {
        let succeeded: Vec<String> = outcome.succeeded_names().map(str::to_string).collect();
        if !succeeded.is_empty() {
            self.status.refresh_names(&succeeded).await;
        }
        info!("{}", outcome.summary(kind));
    }
}

impl std::fmt::Debug for LoadUnloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadUnloadOrchestrator")
            .field("roots", &self.roots)
            .field("throttle_window", &self.throttle_window)
            .finish_non_exhaustive()
    }
}

/// A full name picks that exact version; a base name picks the highest
/// version present.
fn pick_instance(name: &str, instances: Vec<FileInstance>) -> Option<FileInstance> {
    if let Some(identity) = PackageIdentity::parse(name) {
        let wanted = name_key(&identity.file_name());
        return instances
            .into_iter()
            .find(|i| name_key(&i.file_name) == wanted);
    }

    instances
        .into_iter()
        .filter_map(|i| Some((PackageIdentity::from_path(&i.path)?.version, i)))
        .max_by(|(va, a), (vb, b)| va.cmp(vb).then_with(|| b.path_key().cmp(&a.path_key())))
        .map(|(_, i)| i)
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| file_name_of(path))
}

fn file_name_of(path: &Path) -> PathBuf {
    path.file_name().map(PathBuf::from).unwrap_or_default()
}
