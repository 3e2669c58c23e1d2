//! Load, unload and archive batches.

use super::PackageEngine;
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::models::{BatchOutcome, OperationKind};
use crate::orchestrator::ProgressCallback;

impl PackageEngine {
    pub async fn run(
        &self,
        names: &[String],
        kind: OperationKind,
        with_deps: bool,
        progress: Option<ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchOutcome> {
        self.orchestrator
            .run(names, kind, with_deps, progress, cancel)
            .await
    }

    /// Move packages from the available root (or their external location)
    /// into the loaded root.
    pub async fn load(
        &self,
        names: &[String],
        with_deps: bool,
        progress: Option<ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchOutcome> {
        self.run(names, OperationKind::Load, with_deps, progress, cancel)
            .await
    }

    /// Move loaded packages back to the available root, or to the external
    /// destination they came from.
    pub async fn unload(
        &self,
        names: &[String],
        with_deps: bool,
        progress: Option<ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchOutcome> {
        self.run(names, OperationKind::Unload, with_deps, progress, cancel)
            .await
    }

    pub async fn archive(
        &self,
        names: &[String],
        progress: Option<ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchOutcome> {
        self.orchestrator.archive(names, progress, cancel).await
    }
}
