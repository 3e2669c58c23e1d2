use crate::config::StorageRoots;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived lifecycle status of a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackageStatus {
    Loaded,
    Available,
    Outdated,
    Archived,
    Missing,
    Unknown,
    /// Lives only in an external destination.
    External { destination: String },
}

impl PackageStatus {
    /// Packages in these states can be the source of a load.
    pub fn is_loadable(&self) -> bool {
        matches!(
            self,
            PackageStatus::Available
                | PackageStatus::Outdated
                | PackageStatus::Archived
                | PackageStatus::External { .. }
        )
    }

    /// Available locally (not in an external destination) but not loaded.
    pub fn is_local_available(&self) -> bool {
        matches!(
            self,
            PackageStatus::Available | PackageStatus::Outdated | PackageStatus::Archived
        )
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, PackageStatus::Loaded)
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageStatus::Loaded => write!(f, "Loaded"),
            PackageStatus::Available => write!(f, "Available"),
            PackageStatus::Outdated => write!(f, "Outdated"),
            PackageStatus::Archived => write!(f, "Archived"),
            PackageStatus::Missing => write!(f, "Missing"),
            PackageStatus::Unknown => write!(f, "Unknown"),
            PackageStatus::External { destination } => write!(f, "External({})", destination),
        }
    }
}

/// Display projection of a status: label and color for a host UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDisplay {
    pub label: String,
    pub color: String,
}

impl StatusDisplay {
    const DEFAULT_EXTERNAL_COLOR: &'static str = "#8a63d2";

    pub fn for_status(status: &PackageStatus, roots: &StorageRoots) -> Self {
        let (label, color) = match status {
            PackageStatus::Loaded => ("Loaded".to_string(), "#2e9e44"),
            PackageStatus::Available => ("Available".to_string(), "#3b82c4"),
            PackageStatus::Outdated => ("Outdated".to_string(), "#d08c1f"),
            PackageStatus::Archived => ("Archived".to_string(), "#7a7a7a"),
            PackageStatus::Missing => ("Missing".to_string(), "#c43b3b"),
            PackageStatus::Unknown => ("Unknown".to_string(), "#9e9e9e"),
            PackageStatus::External { destination } => {
                let color = roots
                    .destination(destination)
                    .and_then(|d| d.color.clone())
                    .unwrap_or_else(|| Self::DEFAULT_EXTERNAL_COLOR.to_string());
                return Self {
                    label: destination.clone(),
                    color,
                };
            }
        };
        Self {
            label,
            color: color.to_string(),
        }
    }
}
