use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// Storage role of a root, and so of every file found under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Primary active root; packages here are loaded by the host application.
    Loaded,
    /// Secondary staging root.
    Available,
    /// A configured additional root, identified by destination name.
    External(String),
}

impl Role {
    /// Role priority used for default keep decisions and representative
    /// selection: `Loaded` < `Available` < `External` (lower wins).
    pub fn priority(&self) -> u8 {
        match self {
            Role::Loaded => 0,
            Role::Available => 1,
            Role::External(_) => 2,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Role::Loaded => "loaded",
            Role::Available => "available",
            Role::External(name) => name,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Role::External(_))
    }
}

/// Total order over roles: priority first, then external destination name.
pub fn compare_roles(a: &Role, b: &Role) -> Ordering {
    a.priority().cmp(&b.priority()).then_with(|| match (a, b) {
        (Role::External(x), Role::External(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        _ => Ordering::Equal,
    })
}

/// Pick the preferred item by role priority: `Loaded > Available > any`.
///
/// Ties keep the first item in input order.
pub fn pick_by_role_priority<'a, T>(
    items: impl IntoIterator<Item = &'a T>,
    role_of: impl Fn(&T) -> Option<&Role>,
) -> Option<&'a T> {
    let mut best: Option<(&'a T, u8)> = None;
    for item in items {
        let rank = role_of(item).map(Role::priority).unwrap_or(u8::MAX);
        match best {
            Some((_, best_rank)) if best_rank <= rank => {}
            _ => best = Some((item, rank)),
        }
    }
    best.map(|(item, _)| item)
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Loaded => write!(f, "Loaded"),
            Role::Available => write!(f, "Available"),
            Role::External(name) => write!(f, "External({})", name),
        }
    }
}

/// One physical package file found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInstance {
    pub path: PathBuf,
    pub role: Role,
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Basename including extension; it embeds the version.
    pub file_name: String,
}

impl FileInstance {
    pub fn new(path: PathBuf, role: Role, size: u64, modified: DateTime<Utc>) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path,
            role,
            size,
            modified,
            file_name,
        }
    }

    /// Case-insensitive key of the file path.
    pub fn path_key(&self) -> String {
        self.path.to_string_lossy().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_priority_order() {
        let mut roles = vec![
            Role::External("b".into()),
            Role::Available,
            Role::External("a".into()),
            Role::Loaded,
        ];
        roles.sort_by(compare_roles);
        assert_eq!(
            roles,
            vec![
                Role::Loaded,
                Role::Available,
                Role::External("a".into()),
                Role::External("b".into()),
            ]
        );
    }

    #[test]
    fn test_pick_by_role_priority() {
        let records = vec![
            ("ext", Some(Role::External("nas".into()))),
            ("none", None),
            ("avail", Some(Role::Available)),
            ("avail-2", Some(Role::Available)),
        ];
        let best = pick_by_role_priority(&records, |r| r.1.as_ref()).unwrap();
        assert_eq!(best.0, "avail");

        let only_unknown = vec![("x", None::<Role>)];
        let best = pick_by_role_priority(&only_unknown, |r| r.1.as_ref()).unwrap();
        assert_eq!(best.0, "x");
    }

    #[test]
    fn test_file_instance_name() {
        let inst = FileInstance::new(
            PathBuf::from("/lib/sub/A.Foo.1.var"),
            Role::Loaded,
            10,
            Utc::now(),
        );
        assert_eq!(inst.file_name, "A.Foo.1.var");
    }
}
