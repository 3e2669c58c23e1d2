//! Turns keep decisions into concrete keep and delete sets.
//!
//! Planning is all-or-nothing: any group that cannot be resolved fails the
//! whole plan, and nothing has been touched at that point.

use super::analyzer::{DuplicateGroup, GroupKey};
use crate::error::{Result, VarError};
use crate::models::{FileInstance, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keep decision for one duplicate group.
///
/// At most one role is kept. A decision without a role skips the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionDecision {
    keep: Option<Role>,
    selected_path: Option<PathBuf>,
}

impl ResolutionDecision {
    pub fn keep(role: Role) -> Self {
        Self {
            keep: Some(role),
            selected_path: None,
        }
    }

    /// No decision: the group is left alone.
    pub fn skip() -> Self {
        Self::default()
    }

    /// Select the kept role, clearing any previous selection.
    pub fn select_keep(&mut self, role: Role) {
        if self.keep.as_ref() != Some(&role) {
            self.selected_path = None;
        }
        self.keep = Some(role);
    }

    pub fn clear(&mut self) {
        self.keep = None;
        self.selected_path = None;
    }

    /// Pin the exact file kept when the kept role holds several.
    pub fn with_selected_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.selected_path = Some(path.into());
        self
    }

    pub fn set_selected_path(&mut self, path: PathBuf) {
        self.selected_path = Some(path);
    }

    pub fn kept_role(&self) -> Option<&Role> {
        self.keep.as_ref()
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selected_path.as_deref()
    }
}

/// Decisions keyed by group.
pub type Decisions = HashMap<GroupKey, ResolutionDecision>;

/// Default decision for every group: keep the highest-priority role.
pub fn default_decisions(groups: &[DuplicateGroup]) -> Decisions {
    groups
        .iter()
        .filter_map(|g| Some((g.key(), ResolutionDecision::keep(g.default_keep()?))))
        .collect()
}

/// Decisions forcing one role wherever the group has it, falling back to
/// the default elsewhere.
pub fn forced_decisions(groups: &[DuplicateGroup], role: &Role) -> Decisions {
    groups
        .iter()
        .filter_map(|g| {
            let keep = if g.candidates_in(role).is_empty() {
                g.default_keep()?
            } else {
                role.clone()
            };
            Some((g.key(), ResolutionDecision::keep(keep)))
        })
        .collect()
}

/// Concrete paths a resolution keeps and removes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPlan {
    pub keep: Vec<PathBuf>,
    pub delete: Vec<PathBuf>,
}

impl ResolutionPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty()
    }
}

/// Selection collaborator consulted when the kept role holds several
/// physical files.
#[async_trait]
pub trait Disambiguator: Send + Sync {
    /// Pick one of `candidates`, or `None` to cancel the whole resolution.
    async fn select(&self, display_name: &str, candidates: &[FileInstance]) -> Option<PathBuf>;
}

/// Picks the most recently modified candidate. Ties break on path order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostRecentlyModified;

#[async_trait]
impl Disambiguator for MostRecentlyModified {
    async fn select(&self, _display_name: &str, candidates: &[FileInstance]) -> Option<PathBuf> {
        candidates
            .iter()
            .max_by(|a, b| {
                a.modified
                    .cmp(&b.modified)
                    .then_with(|| b.path_key().cmp(&a.path_key()))
            })
            .map(|i| i.path.clone())
    }
}

/// Always cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelDisambiguation;

#[async_trait]
impl Disambiguator for CancelDisambiguation {
    async fn select(&self, _display_name: &str, _candidates: &[FileInstance]) -> Option<PathBuf> {
        None
    }
}

/// Fill in `selected_path` for every decided group whose kept role holds
/// more than one file.
///
/// A cancelled selection aborts immediately; decisions already filled in
/// are not executed by anyone.
pub async fn disambiguate(
    groups: &[DuplicateGroup],
    decisions: &mut Decisions,
    disambiguator: &dyn Disambiguator,
) -> Result<()> {
    for group in groups {
        let Some(decision) = decisions.get_mut(&group.key()) else {
            continue;
        };
        let Some(role) = decision.kept_role().cloned() else {
            continue;
        };
        if decision.selected_path().is_some() {
            continue;
        }
        let candidates: Vec<FileInstance> =
            group.candidates_in(&role).into_iter().cloned().collect();
        if candidates.len() < 2 {
            continue;
        }

        let display_name = format!("{} ({})", group.file_name, role.label());
        match disambiguator.select(&display_name, &candidates).await {
            Some(path) => decision.set_selected_path(path),
            None => {
                return Err(VarError::Aborted {
                    reason: format!("no file was selected for {}", display_name),
                })
            }
        }
    }
    Ok(())
}

/// Build the keep and delete sets.
///
/// Groups without a decision are excluded from both sets. Both sets are
/// deduplicated case-insensitively and never share a path.
pub fn plan(groups: &[DuplicateGroup], decisions: &Decisions) -> Result<ResolutionPlan> {
    let mut keep: Vec<PathBuf> = Vec::new();
    let mut delete: Vec<PathBuf> = Vec::new();
    let mut decided = 0;

    for group in groups {
        let Some(decision) = decisions.get(&group.key()) else {
            continue;
        };
        let Some(role) = decision.kept_role() else {
            continue;
        };
        decided += 1;

        let candidates = group.candidates_in(role);
        let kept = match candidates.as_slice() {
            [] => {
                return Err(VarError::Validation {
                    field: "keep".into(),
                    message: format!("{} has no copy in the {} root", group.file_name, role),
                })
            }
            [only] => only.path_key(),
            _ => {
                let Some(selected) = decision.selected_path() else {
                    return Err(VarError::Aborted {
                        reason: format!(
                            "{} has {} copies in the {} root and none was selected",
                            group.file_name,
                            candidates.len(),
                            role
                        ),
                    });
                };
                let selected = selected.to_string_lossy().to_lowercase();
                if !candidates.iter().any(|c| c.path_key() == selected) {
                    return Err(VarError::Validation {
                        field: "selected_path".into(),
                        message: format!("{} is not a copy of {}", selected, group.file_name),
                    });
                }
                selected
            }
        };

        for instance in &group.instances {
            if instance.path_key() == kept {
                keep.push(instance.path.clone());
            } else {
                delete.push(instance.path.clone());
            }
        }
    }

    if decided == 0 {
        return Err(VarError::NothingSelected);
    }

    let keep = dedupe_paths(keep, &HashSet::new());
    let kept_keys: HashSet<String> = keep.iter().map(|p| path_key(p)).collect();
    let delete = dedupe_paths(delete, &kept_keys);

    debug!(
        "Planned resolution of {} groups: keep {}, delete {}",
        decided,
        keep.len(),
        delete.len()
    );
    Ok(ResolutionPlan { keep, delete })
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

fn dedupe_paths(paths: Vec<PathBuf>, exclude: &HashSet<String>) -> Vec<PathBuf> {
    let mut seen: HashSet<String> = HashSet::new();
    paths
        .into_iter()
        .filter(|p| {
            let key = path_key(p);
            !exclude.contains(&key) && seen.insert(key)
        })
        .collect()
}
