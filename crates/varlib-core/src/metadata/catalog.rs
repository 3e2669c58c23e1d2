//! In-memory metadata catalog.

use super::json::read_json;
use super::record::{MetadataLookup, PackageMetadata};
use super::var_meta::read_dependencies;
use crate::error::{Result, VarError};
use crate::models::{pick_by_role_priority, FileInstance, PackageStatus, Role};
use crate::naming::{name_key, PackageIdentity};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Case-insensitive catalog of package metadata, indexed by base name.
#[derive(Debug, Clone, Default)]
pub struct MetadataCatalog {
    /// lowercase full name -> record
    records: HashMap<String, PackageMetadata>,
    /// lowercase base name -> lowercase full names
    by_base: HashMap<String, Vec<String>>,
}

impl MetadataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = PackageMetadata>) -> Self {
        let mut catalog = Self::new();
        for record in records {
            catalog.insert(record);
        }
        catalog
    }

    /// Load a catalog snapshot: a JSON array of records.
    pub fn load(path: &Path) -> Result<Self> {
        let records: Option<Vec<PackageMetadata>> = read_json(path)?;
        let records = records.ok_or_else(|| VarError::Config {
            message: format!("Metadata file does not exist: {}", path.display()),
        })?;
        Ok(Self::from_records(records))
    }

    /// Build a catalog from a library scan.
    ///
    /// Each full name gets one record, taken from its instance with the
    /// highest role priority. Archived instances only back a record when
    /// no live instance exists. Dependencies are read from each package's
    /// manifest, and old-version flags are computed from the versions
    /// observed per base name.
    pub fn from_scan(active: &[FileInstance], archived: &[FileInstance]) -> Self {
        let mut by_full: HashMap<String, Vec<&FileInstance>> = HashMap::new();
        let mut identities: HashMap<String, PackageIdentity> = HashMap::new();

        for instance in active {
            if let Some(identity) = PackageIdentity::from_path(&instance.path) {
                let key = name_key(&identity.full_name());
                by_full.entry(key.clone()).or_default().push(instance);
                identities.entry(key).or_insert(identity);
            }
        }

        let mut catalog = Self::new();
        for (key, instances) in &by_full {
            let Some(representative) = pick_by_role_priority(instances.iter().copied(), |i| {
                Some(&i.role)
            }) else {
                continue;
            };
            let identity = &identities[key];
            let mut record = PackageMetadata::new(identity)
                .with_file_path(&representative.path)
                .with_dependencies(read_dependencies(&representative.path))
                .with_status(status_for_role(&representative.role));
            if let Role::External(name) = &representative.role {
                record = record.external(name.clone());
            }
            catalog.insert(record);
        }

        for instance in archived {
            let Some(identity) = PackageIdentity::from_path(&instance.path) else {
                continue;
            };
            if catalog.by_full_name(&identity.full_name()).is_some() {
                continue;
            }
            let record = PackageMetadata::new(&identity)
                .with_file_path(&instance.path)
                .with_dependencies(read_dependencies(&instance.path))
                .with_status(PackageStatus::Archived);
            catalog.insert(record);
        }

        catalog.flag_old_versions();
        debug!("Built metadata catalog with {} records", catalog.len());
        catalog
    }

    pub fn insert(&mut self, record: PackageMetadata) {
        let key = name_key(&record.full_name);
        let base = name_key(&record.base_name());
        let entry = self.by_base.entry(base).or_default();
        if !entry.contains(&key) {
            entry.push(key.clone());
        }
        self.records.insert(key, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &PackageMetadata> {
        self.records.values()
    }

    /// Set `latest_version_number` per base name and flag every lower
    /// version as old.
    pub fn flag_old_versions(&mut self) {
        for full_names in self.by_base.values() {
            let latest = full_names
                .iter()
                .filter_map(|k| self.records.get(k))
                .filter_map(|r| r.version.number())
                .max();
            let Some(latest) = latest else { continue };
            for key in full_names {
                if let Some(record) = self.records.get_mut(key) {
                    record.latest_version_number = Some(latest);
                    record.is_old_version = record
                        .version
                        .number()
                        .map(|v| v < latest)
                        .unwrap_or(false);
                }
            }
        }
    }
}

fn status_for_role(role: &Role) -> PackageStatus {
    match role {
        Role::Loaded => PackageStatus::Loaded,
        Role::Available => PackageStatus::Available,
        Role::External(name) => PackageStatus::External {
            destination: name.clone(),
        },
    }
}

impl MetadataLookup for MetadataCatalog {
    fn by_full_name(&self, full_name: &str) -> Option<PackageMetadata> {
        self.records.get(&name_key(full_name.trim())).cloned()
    }

    fn by_base_name(&self, base_name: &str) -> Vec<PackageMetadata> {
        self.by_base
            .get(&name_key(base_name.trim()))
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| self.records.get(k).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn base_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_base
            .values()
            .filter_map(|keys| keys.first())
            .filter_map(|k| self.records.get(k))
            .map(|r| r.base_name())
            .collect();
        names.sort_by_key(|n| n.to_lowercase());
        names
    }
}
