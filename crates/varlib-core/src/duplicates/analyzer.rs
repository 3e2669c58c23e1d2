use crate::locator::InstanceLocator;
use crate::models::{compare_roles, pick_by_role_priority, FileInstance, Role};
use crate::naming::{base_name_of, name_key};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Case-insensitive identity of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub base_name: String,
    pub file_name: String,
}

impl GroupKey {
    pub fn new(base_name: &str, file_name: &str) -> Self {
        Self {
            base_name: name_key(base_name),
            file_name: name_key(file_name),
        }
    }
}

/// All instances sharing one exact file name (and so one version).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub base_name: String,
    pub file_name: String,
    /// Sorted by role priority, then path.
    pub instances: Vec<FileInstance>,
}

impl DuplicateGroup {
    pub fn key(&self) -> GroupKey {
        GroupKey::new(&self.base_name, &self.file_name)
    }

    /// At least two instances, spread over more than one role or stacked
    /// inside a single role.
    pub fn is_duplicate(&self) -> bool {
        is_duplicate_set(&self.instances)
    }

    /// Distinct roles holding this file, highest priority first.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = Vec::new();
        for instance in &self.instances {
            if !roles.contains(&instance.role) {
                roles.push(instance.role.clone());
            }
        }
        roles.sort_by(compare_roles);
        roles
    }

    pub fn candidates_in(&self, role: &Role) -> Vec<&FileInstance> {
        self.instances.iter().filter(|i| &i.role == role).collect()
    }

    /// Default keep role: `Loaded`, else `Available`, else the first
    /// external destination.
    pub fn default_keep(&self) -> Option<Role> {
        self.representative().map(|i| i.role.clone())
    }

    /// Instance shown for the group, picked by role priority.
    pub fn representative(&self) -> Option<&FileInstance> {
        pick_by_role_priority(&self.instances, |i| Some(&i.role))
    }

    /// Largest instance size, for display only.
    pub fn max_size(&self) -> u64 {
        self.instances.iter().map(|i| i.size).max().unwrap_or(0)
    }
}

/// The duplicate invariant over one file name's instances.
pub fn is_duplicate_set(instances: &[FileInstance]) -> bool {
    if instances.len() < 2 {
        return false;
    }
    let mut seen: HashSet<&Role> = HashSet::new();
    for instance in instances {
        if !seen.insert(&instance.role) {
            // Same role twice.
            return true;
        }
    }
    seen.len() >= 2
}

/// Group instances by exact file name and keep only the duplicate groups.
///
/// Instances are grouped case-insensitively. The result is ordered by
/// base name, then file name.
pub fn analyze(instances: &[FileInstance]) -> Vec<DuplicateGroup> {
    let mut by_file: BTreeMap<GroupKey, Vec<FileInstance>> = BTreeMap::new();
    for instance in instances {
        let key = GroupKey::new(&base_name_of(&instance.file_name), &instance.file_name);
        by_file.entry(key).or_default().push(instance.clone());
    }

    by_file
        .into_values()
        .filter(|group| is_duplicate_set(group))
        .map(|mut group| {
            group.sort_by(|a, b| {
                compare_roles(&a.role, &b.role).then_with(|| a.path_key().cmp(&b.path_key()))
            });
            let file_name = group[0].file_name.clone();
            DuplicateGroup {
                base_name: base_name_of(&file_name),
                file_name,
                instances: group,
            }
        })
        .collect()
}

/// Duplicate groups across the whole library, or only for `base_names`
/// when it is non-empty.
///
/// Grouping comes from what is on disk right now; status fields held by
/// the metadata layer are not consulted.
pub fn analyze_library(locator: &InstanceLocator, base_names: &[String]) -> Vec<DuplicateGroup> {
    let mut instances = locator.scan_all();
    if !base_names.is_empty() {
        let wanted: HashSet<String> = base_names.iter().map(|n| name_key(n.trim())).collect();
        instances.retain(|i| wanted.contains(&name_key(&base_name_of(&i.file_name))));
    }
    let groups = analyze(&instances);
    debug!(
        "Found {} duplicate groups among {} instances",
        groups.len(),
        instances.len()
    );
    groups
}
