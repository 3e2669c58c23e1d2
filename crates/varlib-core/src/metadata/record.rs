use crate::models::PackageStatus;
use crate::naming::{base_name_of, PackageIdentity, PackageVersion};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata for one package version, as supplied by the metadata layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// `creator.package.version`
    pub full_name: String,
    pub version: PackageVersion,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    /// Raw dependency references, as declared.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub external_destination: Option<String>,
    /// Last status the metadata layer observed; may be stale.
    #[serde(default)]
    pub status: Option<PackageStatus>,
    #[serde(default)]
    pub is_old_version: bool,
    #[serde(default)]
    pub latest_version_number: Option<u32>,
}

impl PackageMetadata {
    /// Minimal record for a package version.
    pub fn new(identity: &PackageIdentity) -> Self {
        Self {
            full_name: identity.full_name(),
            version: identity.version,
            file_path: None,
            dependencies: Vec::new(),
            is_external: false,
            external_destination: None,
            status: None,
            is_old_version: false,
            latest_version_number: None,
        }
    }

    pub fn base_name(&self) -> String {
        base_name_of(&self.full_name)
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: PackageStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn external(mut self, destination: impl Into<String>) -> Self {
        self.is_external = true;
        self.external_destination = Some(destination.into());
        self
    }
}

/// Lookup contract the engine consumes; it never persists metadata.
pub trait MetadataLookup: Send + Sync {
    /// Exact, case-insensitive full-name lookup.
    fn by_full_name(&self, full_name: &str) -> Option<PackageMetadata>;

    /// Every known version of a base name, case-insensitive.
    fn by_base_name(&self, base_name: &str) -> Vec<PackageMetadata>;

    /// Distinct base names known to the lookup.
    fn base_names(&self) -> Vec<String>;

    /// Highest known version of a base name. Ties break on full name.
    fn latest(&self, base_name: &str) -> Option<PackageMetadata> {
        self.by_base_name(base_name).into_iter().max_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| b.full_name.to_lowercase().cmp(&a.full_name.to_lowercase()))
        })
    }

    /// Resolve a caller-supplied name: a full name picks that version,
    /// anything else is treated as a base name.
    fn resolve(&self, name: &str) -> Option<PackageMetadata> {
        if PackageIdentity::parse(name).is_some() {
            if let Some(found) = self.by_full_name(name) {
                return Some(found);
            }
        }
        self.latest(&base_name_of(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_helpers() {
        let id = PackageIdentity::parse("A.Foo.2").unwrap();
        let meta = PackageMetadata::new(&id)
            .with_file_path("/lib/A.Foo.2.var")
            .with_dependencies(["B.Bar.latest"])
            .external("nas");
        assert_eq!(meta.base_name(), "A.Foo");
        assert_eq!(meta.dependencies, vec!["B.Bar.latest".to_string()]);
        assert!(meta.is_external);
        assert_eq!(meta.external_destination.as_deref(), Some("nas"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let meta: PackageMetadata =
            serde_json::from_str(r#"{"full_name":"A.Foo.3","version":"3"}"#).unwrap();
        assert_eq!(meta.version, PackageVersion::Number(3));
        assert!(meta.dependencies.is_empty());
        assert!(!meta.is_old_version);
    }
}
