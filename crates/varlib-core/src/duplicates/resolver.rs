use super::analyzer::DuplicateGroup;
use super::planner::{disambiguate, plan, Decisions, Disambiguator, ResolutionPlan};
use crate::cancel::CancellationToken;
use crate::error::{Result, VarError};
use crate::fileops::FileOperations;
use crate::models::BatchSummary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What a resolution run did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub kept: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    /// `path: reason` for each delete that failed.
    pub errors: Vec<String>,
    /// No group had a decision; nothing was planned.
    pub no_op: bool,
    pub cancelled: bool,
}

impl ResolutionOutcome {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_counts("Deleted", self.deleted.len(), &self.errors)
    }
}

/// Executes duplicate resolution plans.
#[derive(Clone)]
pub struct DuplicateResolver {
    ops: Arc<dyn FileOperations>,
}

impl DuplicateResolver {
    pub fn new(ops: Arc<dyn FileOperations>) -> Self {
        Self { ops }
    }

    /// Disambiguate, plan, then delete.
    ///
    /// A cancelled disambiguation or an invalid decision fails before any
    /// file is touched. Groups without a decision make the run a no-op.
    pub async fn resolve(
        &self,
        groups: &[DuplicateGroup],
        mut decisions: Decisions,
        disambiguator: &dyn Disambiguator,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResolutionOutcome> {
        disambiguate(groups, &mut decisions, disambiguator).await?;
        match plan(groups, &decisions) {
            Ok(plan) => Ok(self.execute(&plan, cancel).await),
            Err(VarError::NothingSelected) => {
                info!("No duplicate group was selected, nothing to do");
                Ok(ResolutionOutcome {
                    no_op: true,
                    ..Default::default()
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Delete every path in the plan's delete set, continuing past failures.
    pub async fn execute(
        &self,
        plan: &ResolutionPlan,
        cancel: Option<&CancellationToken>,
    ) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome {
            kept: plan.keep.clone(),
            ..Default::default()
        };

        for path in &plan.delete {
            if CancellationToken::requested(cancel) {
                outcome.cancelled = true;
                break;
            }
            match self.ops.delete_file(path).await {
                Ok(()) => outcome.deleted.push(path.clone()),
                Err(e) => {
                    warn!("Failed to delete duplicate {}: {}", path.display(), e);
                    outcome.errors.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        info!("{}", outcome.summary());
        outcome
    }
}
