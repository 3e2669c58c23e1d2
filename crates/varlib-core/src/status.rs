//! Status index: derived package status, cached until refreshed.
//!
//! Status is never stored authoritatively. It is derived from where the
//! package's files are right now, plus the old-version flags supplied by
//! the metadata layer. The cache is the only shared mutable state in the
//! engine; writers go through [`StatusIndex::refresh`],
//! [`StatusIndex::refresh_names`] or [`StatusIndex::invalidate`].

use crate::locator::{base_names_of, InstanceLocator};
use crate::metadata::MetadataLookup;
use crate::models::{pick_by_role_priority, FileInstance, PackageStatus, Role};
use crate::naming::{base_name_of, is_archived_path, name_key, PackageIdentity, PackageVersion};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// A non-forced refresh within this interval of the last one is skipped.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct StatusCache {
    entries: HashMap<String, PackageStatus>,
    refreshed_at: Option<Instant>,
}

/// Cached status per base name.
pub struct StatusIndex {
    locator: InstanceLocator,
    lookup: Arc<dyn MetadataLookup>,
    cache: RwLock<StatusCache>,
}

impl StatusIndex {
    pub fn new(locator: InstanceLocator, lookup: Arc<dyn MetadataLookup>) -> Self {
        Self {
            locator,
            lookup,
            cache: RwLock::new(StatusCache::default()),
        }
    }

    /// Status of a base name (or full name; the version is ignored).
    pub async fn status(&self, name: &str) -> PackageStatus {
        let base = base_name_of(name);
        let key = name_key(&base);
        if let Some(status) = self.cache.read().await.entries.get(&key) {
            return status.clone();
        }

        let status = self.compute(&base);
        self.cache.write().await.entries.insert(key, status.clone());
        status
    }

    /// Statuses for several names, keyed by the names as given.
    ///
    /// Names missing from the cache are computed together from one scan.
    pub async fn statuses(&self, names: &[String]) -> HashMap<String, PackageStatus> {
        let uncached: Vec<String> = {
            let cache = self.cache.read().await;
            names
                .iter()
                .filter(|name| !cache.entries.contains_key(&name_key(&base_name_of(name))))
                .cloned()
                .collect()
        };
        if uncached.len() > 1 {
            self.refresh_names(&uncached).await;
        }

        let mut out = HashMap::with_capacity(names.len());
        for name in names {
            out.insert(name.clone(), self.status(name).await);
        }
        out
    }

    /// Cached status, without computing it.
    pub async fn cached(&self, name: &str) -> Option<PackageStatus> {
        let key = name_key(&base_name_of(name));
        self.cache.read().await.entries.get(&key).cloned()
    }

    /// Recompute every status from one library scan.
    ///
    /// Without `force`, a refresh right after another one is skipped.
    pub async fn refresh(&self, force: bool) {
        if !force {
            let cache = self.cache.read().await;
            if cache
                .refreshed_at
                .is_some_and(|at| at.elapsed() < MIN_REFRESH_INTERVAL)
            {
                debug!("Status index refreshed recently, skipping");
                return;
            }
        }

        let scan = LibraryScan::take(&self.locator);
        let mut names = base_names_of(&scan.active);
        names.extend(self.lookup.base_names());
        let entries = scan.derive_all(names, self.lookup.as_ref());

        let mut cache = self.cache.write().await;
        debug!("Status index refreshed: {} packages", entries.len());
        cache.entries = entries;
        cache.refreshed_at = Some(Instant::now());
    }

    /// Recompute the given names now.
    ///
    /// A single name is located directly; several share one library scan.
    pub async fn refresh_names(&self, names: &[String]) {
        let computed: HashMap<String, PackageStatus> = match names {
            [] => return,
            [name] => {
                let base = base_name_of(name);
                HashMap::from([(name_key(&base), self.compute(&base))])
            }
            _ => LibraryScan::take(&self.locator).derive_all(
                names.iter().map(|name| base_name_of(name)),
                self.lookup.as_ref(),
            ),
        };

        let mut cache = self.cache.write().await;
        cache.entries.extend(computed);
    }

    /// Drop cached entries; they are recomputed on next access.
    pub async fn invalidate(&self, names: &[String]) {
        let mut cache = self.cache.write().await;
        for name in names {
            cache.entries.remove(&name_key(&base_name_of(name)));
        }
    }

    fn compute(&self, base: &str) -> PackageStatus {
        let instances = self.locator.locate(base);
        let archived = self.locator.locate_archived(base);
        derive_status(base, &instances, &archived, self.lookup.as_ref())
    }
}

/// Live and archived instances from one walk of the library, by base name.
struct LibraryScan {
    active: Vec<FileInstance>,
    by_base: HashMap<String, Vec<FileInstance>>,
    archived_by_base: HashMap<String, Vec<FileInstance>>,
}

impl LibraryScan {
    fn take(locator: &InstanceLocator) -> Self {
        let active = locator.scan_all();
        let by_base = group_by_base(active.iter().cloned());
        let archived_by_base = group_by_base(locator.scan_archived());
        Self {
            active,
            by_base,
            archived_by_base,
        }
    }

    fn derive_all(
        &self,
        names: impl IntoIterator<Item = String>,
        lookup: &dyn MetadataLookup,
    ) -> HashMap<String, PackageStatus> {
        let mut entries = HashMap::new();
        for base in names {
            let key = name_key(&base);
            if entries.contains_key(&key) {
                continue;
            }
            let instances = self.by_base.get(&key).map(Vec::as_slice).unwrap_or(&[]);
            let archived = self
                .archived_by_base
                .get(&key)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let status = derive_status(&base, instances, archived, lookup);
            entries.insert(key, status);
        }
        entries
    }
}

fn group_by_base(
    instances: impl IntoIterator<Item = FileInstance>,
) -> HashMap<String, Vec<FileInstance>> {
    let mut grouped: HashMap<String, Vec<FileInstance>> = HashMap::new();
    for instance in instances {
        grouped
            .entry(name_key(&base_name_of(&instance.file_name)))
            .or_default()
            .push(instance);
    }
    grouped
}

impl std::fmt::Debug for StatusIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusIndex")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

/// Derive the status of `base_name` from its live and archived instances.
///
/// The instance holding the highest version decides, with `Loaded`
/// preferred when that version sits in several roots. An available copy
/// is `Outdated` when the metadata layer flags it old or reports a higher
/// latest version. Those flags are trusted as supplied.
pub fn derive_status(
    base_name: &str,
    instances: &[FileInstance],
    archived: &[FileInstance],
    lookup: &dyn MetadataLookup,
) -> PackageStatus {
    let Some((creator, package)) = base_name.split_once('.') else {
        return PackageStatus::Unknown;
    };
    if creator.is_empty() || package.is_empty() {
        return PackageStatus::Unknown;
    }

    let versioned: Vec<(PackageVersion, &FileInstance)> = instances
        .iter()
        .filter(|i| !is_archived_path(&i.path))
        .filter_map(|i| Some((PackageIdentity::from_path(&i.path)?.version, i)))
        .collect();

    let Some(highest) = versioned.iter().map(|(v, _)| *v).max() else {
        return if !archived.is_empty() || metadata_points_to_archive(base_name, lookup) {
            PackageStatus::Archived
        } else {
            PackageStatus::Missing
        };
    };

    let top = versioned
        .iter()
        .filter(|(v, _)| *v == highest)
        .map(|(_, i)| *i);
    let Some(deciding) = pick_by_role_priority(top, |i| Some(&i.role)) else {
        return PackageStatus::Missing;
    };

    match &deciding.role {
        Role::Loaded => PackageStatus::Loaded,
        Role::External(destination) => PackageStatus::External {
            destination: destination.clone(),
        },
        Role::Available => {
            if is_outdated(base_name, highest, lookup) {
                PackageStatus::Outdated
            } else {
                PackageStatus::Available
            }
        }
    }
}

fn is_outdated(base_name: &str, version: PackageVersion, lookup: &dyn MetadataLookup) -> bool {
    let full_name = format!("{}.{}", base_name, version);
    if lookup
        .by_full_name(&full_name)
        .is_some_and(|r| r.is_old_version)
    {
        return true;
    }
    let latest = lookup
        .by_base_name(base_name)
        .iter()
        .filter_map(|r| r.latest_version_number)
        .max();
    match (latest, version.number()) {
        (Some(latest), Some(current)) => latest > current,
        _ => false,
    }
}

fn metadata_points_to_archive(base_name: &str, lookup: &dyn MetadataLookup) -> bool {
    lookup.by_base_name(base_name).iter().any(|r| {
        r.file_path
            .as_deref()
            .is_some_and(is_archived_path)
    })
}
