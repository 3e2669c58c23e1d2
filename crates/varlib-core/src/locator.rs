//! Instance locator: finds the physical files of a package across roots.
//!
//! Discovery is resilient by contract. A root that is missing or
//! unreadable, or an entry that disappears mid-walk, contributes zero
//! instances and is logged at debug level. Nothing under an
//! `ArchivedPackages` segment is ever returned by the regular scans.

use crate::config::{PathsConfig, StorageRoots};
use crate::models::{FileInstance, Role};
use crate::naming::{is_archived_path, is_var_file, name_key, PackageIdentity};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// File-name pattern `baseName + ".*.var"`, matched case-insensitively.
///
/// The wildcard covers exactly one dot-free segment, so the pattern for
/// `A.Foo` never picks up files of a different package such as
/// `A.Foo.Bar.1.var`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    prefix: String,
    suffix: String,
}

impl PathPattern {
    pub fn for_base_name(base_name: &str) -> Self {
        Self {
            prefix: format!("{}.", base_name.trim().to_lowercase()),
            suffix: format!(".{}", PathsConfig::VAR_EXTENSION),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        lower
            .strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_suffix(&self.suffix))
            .map(|middle| !middle.is_empty() && !middle.contains('.'))
            .unwrap_or(false)
    }
}

/// Locates package files under the configured storage roots.
#[derive(Debug, Clone)]
pub struct InstanceLocator {
    roots: StorageRoots,
}

impl InstanceLocator {
    pub fn new(roots: StorageRoots) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    /// Every instance of `base_name` across all active roots.
    pub fn locate(&self, base_name: &str) -> Vec<FileInstance> {
        let pattern = PathPattern::for_base_name(base_name);
        self.roots
            .scan_roots()
            .into_iter()
            .flat_map(|(root, role)| scan_root(&root, &role, |name| pattern.matches(name)))
            .collect()
    }

    /// Instances of `base_name` under a single role's root.
    pub fn locate_in(&self, base_name: &str, role: &Role) -> Vec<FileInstance> {
        let Some(root) = self.roots.root_for(role) else {
            return Vec::new();
        };
        let pattern = PathPattern::for_base_name(base_name);
        scan_root(root, role, |name| pattern.matches(name))
    }

    /// Every `.var` instance across all active roots.
    pub fn scan_all(&self) -> Vec<FileInstance> {
        self.roots
            .scan_roots()
            .into_iter()
            .flat_map(|(root, role)| scan_root(&root, &role, |_| true))
            .collect()
    }

    /// Distinct base names present in the library, sorted case-insensitively.
    pub fn base_names(&self) -> Vec<String> {
        base_names_of(&self.scan_all())
    }

    /// Instances living in the archive subtree of each primary root.
    ///
    /// These are never part of duplicate discovery or unload; they back the
    /// `Archived` status and restoring archived dependencies.
    pub fn scan_archived(&self) -> Vec<FileInstance> {
        self.walk_archives(|_| true)
    }

    /// Archived instances of `base_name` only.
    pub fn locate_archived(&self, base_name: &str) -> Vec<FileInstance> {
        let pattern = PathPattern::for_base_name(base_name);
        self.walk_archives(|name| pattern.matches(name))
    }

    fn walk_archives(&self, accept: impl Fn(&str) -> bool) -> Vec<FileInstance> {
        [Role::Loaded, Role::Available]
            .into_iter()
            .filter_map(|role| {
                let root = self.roots.root_for(&role)?;
                Some((root.join(PathsConfig::ARCHIVE_DIR_NAME), role))
            })
            .flat_map(|(archive_root, role)| walk_var_files(&archive_root, &role, &accept, false))
            .collect()
    }
}

/// Distinct base names of a set of instances, sorted case-insensitively.
pub fn base_names_of(instances: &[FileInstance]) -> Vec<String> {
    let mut names: BTreeMap<String, String> = BTreeMap::new();
    for instance in instances {
        if let Some(identity) = PackageIdentity::from_path(&instance.path) {
            let base = identity.base_name();
            names.entry(name_key(&base)).or_insert(base);
        }
    }
    names.into_values().collect()
}

fn scan_root(root: &Path, role: &Role, accept: impl Fn(&str) -> bool) -> Vec<FileInstance> {
    if is_archived_path(root) {
        return Vec::new();
    }
    walk_var_files(root, role, accept, true)
}

fn walk_var_files(
    root: &Path,
    role: &Role,
    accept: impl Fn(&str) -> bool,
    skip_archive: bool,
) -> Vec<FileInstance> {
    if !root.is_dir() {
        debug!("Skipping missing root {}", root.display());
        return Vec::new();
    }

    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(skip_archive && is_archive_dir(e)))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_var_file(e.path()))
        .filter(|e| accept(&e.file_name().to_string_lossy()))
        .filter_map(|e| to_instance(&e, role))
        .collect()
}

fn is_archive_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|n| n.eq_ignore_ascii_case(PathsConfig::ARCHIVE_DIR_NAME))
            .unwrap_or(false)
}

fn to_instance(entry: &DirEntry, role: &Role) -> Option<FileInstance> {
    let metadata = match entry.metadata() {
        Ok(m) => m,
        Err(e) => {
            debug!("Skipping {}: {}", entry.path().display(), e);
            return None;
        }
    };
    let modified: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);
    Some(FileInstance::new(
        entry.path().to_path_buf(),
        role.clone(),
        metadata.len(),
        modified,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExternalDestination;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"var").unwrap();
    }

    fn setup() -> (TempDir, StorageRoots) {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::new(temp.path().join("loaded"), temp.path().join("avail"));
        std::fs::create_dir_all(&roots.loaded_root).unwrap();
        std::fs::create_dir_all(&roots.available_root).unwrap();
        (temp, roots)
    }

    #[test]
    fn test_pattern_matches_single_version_segment() {
        let pattern = PathPattern::for_base_name("A.Foo");
        assert!(pattern.matches("A.Foo.1.var"));
        assert!(pattern.matches("a.foo.12.VAR"));
        assert!(!pattern.matches("A.Foo.Bar.1.var"));
        assert!(!pattern.matches("A.Foo..var"));
        assert!(!pattern.matches("A.Foo.1.var.bak"));
        assert!(!pattern.matches("A.Foobar.1.var"));
    }

    #[test]
    fn test_locate_across_roles() {
        let (_temp, roots) = setup();
        touch(&roots.loaded_root.join("A.Foo.1.var"));
        touch(&roots.available_root.join("nested/A.Foo.1.var"));
        touch(&roots.available_root.join("A.Foo.2.var"));
        touch(&roots.available_root.join("A.Other.1.var"));

        let locator = InstanceLocator::new(roots);
        let found = locator.locate("A.Foo");
        assert_eq!(found.len(), 3);
        assert_eq!(found.iter().filter(|i| i.role == Role::Loaded).count(), 1);
        assert_eq!(found.iter().filter(|i| i.role == Role::Available).count(), 2);
    }

    #[test]
    fn test_locate_excludes_archive_subtree() {
        let (_temp, roots) = setup();
        touch(&roots.available_root.join("ArchivedPackages/A.Foo.1.var"));
        touch(&roots.available_root.join("sub/archivedpackages/A.Foo.2.var"));
        touch(&roots.available_root.join("A.Foo.3.var"));

        let locator = InstanceLocator::new(roots);
        let found = locator.locate("A.Foo");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name, "A.Foo.3.var");

        let archived = locator.scan_archived();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].file_name, "A.Foo.1.var");
    }

    #[test]
    fn test_locate_archived_filters_by_base_name() {
        let (_temp, roots) = setup();
        touch(&roots.available_root.join("ArchivedPackages/A.Foo.1.var"));
        touch(&roots.available_root.join("ArchivedPackages/B.Bar.1.var"));
        touch(&roots.loaded_root.join("ArchivedPackages/deep/A.Foo.2.var"));
        touch(&roots.available_root.join("A.Foo.3.var"));

        let locator = InstanceLocator::new(roots);
        let archived = locator.locate_archived("a.foo");
        assert_eq!(archived.len(), 2);
        assert!(archived.iter().all(|i| i.file_name.starts_with("A.Foo.")));
        assert!(archived.iter().all(|i| is_archived_path(&i.path)));
    }

    #[test]
    fn test_pattern_accepts_non_ascii_names() {
        let pattern = PathPattern::for_base_name("Créateur.Café");
        assert!(pattern.matches("créateur.CAFÉ.3.var"));
        assert!(!pattern.matches("Créateur.Café.var"));
    }

    #[test]
    fn test_missing_roots_scan_as_empty() {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::new(temp.path().join("nope1"), temp.path().join("nope2"));
        let locator = InstanceLocator::new(roots);
        assert!(locator.locate("A.Foo").is_empty());
        assert!(locator.scan_all().is_empty());
    }

    #[test]
    fn test_external_destinations_scanned_when_active() {
        let (temp, roots) = setup();
        let ext = temp.path().join("ext");
        touch(&ext.join("A.Foo.1.var"));
        let mut disabled = ExternalDestination::new("off", &ext);
        disabled.enabled = false;

        let locator =
            InstanceLocator::new(roots.clone().with_external(ExternalDestination::new("nas", &ext)));
        let found = locator.locate("A.Foo");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role, Role::External("nas".into()));

        let locator = InstanceLocator::new(roots.with_external(disabled));
        assert!(locator.locate("A.Foo").is_empty());
    }

    #[test]
    fn test_scan_all_and_base_names() {
        let (_temp, roots) = setup();
        touch(&roots.loaded_root.join("A.Foo.1.var"));
        touch(&roots.available_root.join("a.foo.2.var"));
        touch(&roots.available_root.join("B.Bar.1.var"));
        touch(&roots.available_root.join("notes.txt"));

        let locator = InstanceLocator::new(roots);
        assert_eq!(locator.scan_all().len(), 3);
        assert_eq!(
            locator.base_names(),
            vec!["A.Foo".to_string(), "B.Bar".to_string()]
        );
    }

    #[test]
    fn test_locate_in_role() {
        let (_temp, roots) = setup();
        touch(&roots.loaded_root.join("A.Foo.1.var"));
        touch(&roots.available_root.join("A.Foo.2.var"));

        let locator = InstanceLocator::new(roots);
        let loaded = locator.locate_in("A.Foo", &Role::Loaded);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].file_name, "A.Foo.1.var");
        assert!(locator.locate_in("A.Foo", &Role::External("x".into())).is_empty());
    }
}
