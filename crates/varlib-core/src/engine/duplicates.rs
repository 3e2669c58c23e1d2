//! Duplicate detection and resolution methods.

use super::PackageEngine;
use crate::cancel::CancellationToken;
use crate::duplicates::{
    analyze_library, disambiguate, plan, Decisions, Disambiguator, DuplicateGroup,
    ResolutionOutcome, ResolutionPlan,
};
use crate::error::Result;

impl PackageEngine {
    /// Duplicate groups for `base_names`, or for the whole library when
    /// the list is empty.
    pub fn find_duplicates(&self, base_names: &[String]) -> Vec<DuplicateGroup> {
        analyze_library(&self.locator, base_names)
    }

    /// The keep and delete sets `decisions` would produce, without
    /// touching any file.
    pub async fn plan_duplicates(
        &self,
        groups: &[DuplicateGroup],
        mut decisions: Decisions,
        disambiguator: &dyn Disambiguator,
    ) -> Result<ResolutionPlan> {
        disambiguate(groups, &mut decisions, disambiguator).await?;
        plan(groups, &decisions)
    }

    /// Resolve duplicates according to `decisions`.
    ///
    /// Fails without touching any file if a required selection is
    /// cancelled. Statuses of every affected package are refreshed after.
    pub async fn resolve_duplicates(
        &self,
        groups: &[DuplicateGroup],
        decisions: Decisions,
        disambiguator: &dyn Disambiguator,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResolutionOutcome> {
        let outcome = self
            .resolver
            .resolve(groups, decisions, disambiguator, cancel)
            .await?;

        if !outcome.deleted.is_empty() {
            let mut touched: Vec<String> = groups.iter().map(|g| g.base_name.clone()).collect();
            touched.sort_by_key(|n| n.to_lowercase());
            touched.dedup_by_key(|n| n.to_lowercase());
            self.status.refresh_names(&touched).await;
        }
        Ok(outcome)
    }
}
