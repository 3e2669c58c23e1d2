//! First-level dependency expansion for load and unload batches.
//!
//! Dependencies are read from the metadata layer, normalized to base
//! names and deduplicated. The expansion is a single hop: a dependency's
//! own dependencies are not followed.

use crate::metadata::{MetadataLookup, PackageMetadata};
use crate::models::{OperationKind, PackageStatus};
use crate::naming::{base_name_of, name_key, normalize_dependency};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Where a dependency will be relocated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencySource {
    /// A local root.
    Local,
    /// The archive subtree of a local root.
    Archived,
    /// An external destination.
    External { destination: String },
}

/// A dependency that made it into the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub base_name: String,
    /// Highest known version of the dependency.
    pub metadata: PackageMetadata,
    pub source: DependencySource,
}

/// Base names declared as dependencies of `selected`, excluding anything
/// already selected. Order follows first declaration.
pub fn expand(selected: &[String], lookup: &dyn MetadataLookup) -> Vec<String> {
    let selected_keys: HashSet<String> = selected
        .iter()
        .map(|name| name_key(&base_name_of(name)))
        .collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut dependencies = Vec::new();

    for name in selected {
        let Some(record) = lookup.resolve(name) else {
            debug!("No metadata for {}, no dependencies to expand", name);
            continue;
        };
        for reference in &record.dependencies {
            let base = normalize_dependency(reference);
            if base.is_empty() {
                continue;
            }
            let key = name_key(&base);
            if selected_keys.contains(&key) || !seen.insert(key) {
                continue;
            }
            dependencies.push(base);
        }
    }
    dependencies
}

/// Decide whether a dependency in `status` joins a `kind` batch.
///
/// Loads take anything locally available (including outdated copies),
/// archived copies, which are restored to the loaded root, or packages
/// living in an external destination. Unloads take
/// loaded dependencies. Everything else is left out silently.
pub fn classify(
    kind: OperationKind,
    status: &PackageStatus,
    metadata: &PackageMetadata,
) -> Option<DependencySource> {
    match kind {
        OperationKind::Load => match status {
            PackageStatus::Archived => Some(DependencySource::Archived),
            s if s.is_local_available() => Some(DependencySource::Local),
            PackageStatus::External { destination } => Some(DependencySource::External {
                destination: destination.clone(),
            }),
            PackageStatus::Loaded => None,
            _ if metadata.is_external => metadata
                .external_destination
                .clone()
                .map(|destination| DependencySource::External { destination }),
            _ => None,
        },
        OperationKind::Unload => status.is_loaded().then_some(DependencySource::Local),
        OperationKind::Archive => None,
    }
}

/// Expand `selected` and keep the dependencies a `kind` batch should move.
///
/// Each dependency resolves to its highest known version.
pub fn resolve_dependencies(
    selected: &[String],
    lookup: &dyn MetadataLookup,
    kind: OperationKind,
    status_of: impl Fn(&str) -> PackageStatus,
) -> Vec<ResolvedDependency> {
    expand(selected, lookup)
        .into_iter()
        .filter_map(|base_name| {
            let Some(metadata) = lookup.latest(&base_name) else {
                debug!("Dependency {} is not known, skipping", base_name);
                return None;
            };
            let status = status_of(&base_name);
            let Some(source) = classify(kind, &status, &metadata) else {
                debug!("Dependency {} is {}, not part of the {}", base_name, status, kind);
                return None;
            };
            Some(ResolvedDependency {
                base_name,
                metadata,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataCatalog;
    use crate::naming::{PackageIdentity, PackageVersion};

    fn record(full_name: &str, deps: &[&str]) -> PackageMetadata {
        PackageMetadata::new(&PackageIdentity::parse(full_name).unwrap())
            .with_dependencies(deps.iter().copied())
    }

    fn catalog() -> MetadataCatalog {
        MetadataCatalog::from_records([
            record(
                "A.Scene.1",
                &["B.Look.latest", "C.Hair.3.var", "a.scene.1", "D.Pose.Pack.2"],
            ),
            record("A.Other.2", &["b.look.4", "E.Tex.1"]),
            record("B.Look.2", &["Z.Deep.1"]),
            record("B.Look.5", &[]),
            record("C.Hair.3", &[]),
            record("D.Pose.Pack.2", &[]),
            record("E.Tex.1", &[]).external("nas"),
        ])
    }

    #[test]
    fn test_expand_is_first_level_and_deduplicated() {
        let deps = expand(
            &["A.Scene".to_string(), "A.Other.2".to_string()],
            &catalog(),
        );
        assert_eq!(deps, vec!["B.Look", "C.Hair", "D.Pose.Pack", "E.Tex"]);
    }

    #[test]
    fn test_expand_excludes_selected() {
        let deps = expand(
            &["A.Scene.1".to_string(), "B.Look".to_string()],
            &catalog(),
        );
        assert!(!deps.iter().any(|d| d.eq_ignore_ascii_case("B.Look")));
        assert!(!deps.iter().any(|d| d.eq_ignore_ascii_case("A.Scene")));
    }

    #[test]
    fn test_unknown_selection_has_no_dependencies() {
        assert!(expand(&["X.Y".to_string()], &catalog()).is_empty());
    }

    #[test]
    fn test_load_classification() {
        let catalog = catalog();
        let resolved = resolve_dependencies(
            &["A.Scene".to_string(), "A.Other".to_string()],
            &catalog,
            OperationKind::Load,
            |base| match base {
                "B.Look" => PackageStatus::Outdated,
                "C.Hair" => PackageStatus::Loaded,
                "D.Pose.Pack" => PackageStatus::Archived,
                _ => PackageStatus::Missing,
            },
        );

        let names: Vec<&str> = resolved.iter().map(|d| d.base_name.as_str()).collect();
        assert_eq!(names, vec!["B.Look", "D.Pose.Pack", "E.Tex"]);
        assert_eq!(resolved[0].metadata.version, PackageVersion::Number(5));
        assert_eq!(resolved[0].source, DependencySource::Local);
        assert_eq!(resolved[1].source, DependencySource::Archived);
        assert_eq!(
            resolved[2].source,
            DependencySource::External {
                destination: "nas".into()
            }
        );
    }

    #[test]
    fn test_unload_takes_loaded_dependencies() {
        let catalog = catalog();
        let resolved = resolve_dependencies(
            &["A.Scene".to_string()],
            &catalog,
            OperationKind::Unload,
            |base| {
                if base == "C.Hair" {
                    PackageStatus::Loaded
                } else {
                    PackageStatus::Available
                }
            },
        );
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].base_name, "C.Hair");
    }
}
