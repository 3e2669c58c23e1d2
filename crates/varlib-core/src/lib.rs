//! Varlib Core - headless engine for `.var` content package files.
//!
//! This crate locates package files across the loaded, available and
//! external roots, detects and resolves duplicate copies, and moves
//! packages between roots in batches. It can be used programmatically
//! without any UI; the `varlib` binary is one such host.
//!
//! # Example
//!
//! ```rust,ignore
//! use varlib_core::{PackageEngine, StorageRoots};
//!
//! #[tokio::main]
//! async fn main() -> varlib_core::Result<()> {
//!     let roots = StorageRoots::new("/vam/AddonPackages", "/vam/AllPackages");
//!     let engine = PackageEngine::builder(roots).build().await?;
//!
//!     let groups = engine.find_duplicates(&[]);
//!     println!("Found {} duplicate groups", groups.len());
//!
//!     let outcome = engine.load(&["Creator.Scene".into()], true, None, None).await?;
//!     println!("{}", outcome.summary(varlib_core::OperationKind::Load));
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod dependencies;
pub mod duplicates;
pub mod error;
pub mod fileops;
pub mod locator;
pub mod metadata;
pub mod models;
pub mod naming;
pub mod orchestrator;
pub mod status;

mod engine;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use config::{BatchConfig, ExternalDestination, FileOpsConfig, PathsConfig, StorageRoots};
pub use duplicates::{
    CancelDisambiguation, Decisions, Disambiguator, DuplicateGroup, MostRecentlyModified,
    ResolutionDecision, ResolutionOutcome, ResolutionPlan,
};
pub use engine::{PackageEngine, PackageEngineBuilder};
pub use error::{Result, VarError};
pub use fileops::{FileOperations, SafeFileOperator};
pub use locator::{InstanceLocator, PathPattern};
pub use metadata::{MetadataCatalog, MetadataLookup, PackageMetadata};
pub use models::{
    BatchOutcome, BatchSummary, FileInstance, OperationKind, OperationResult, PackageStatus, Role,
    StatusDisplay,
};
pub use naming::{normalize_dependency, PackageIdentity, PackageVersion};
pub use orchestrator::{HandleReleaser, LoadUnloadOrchestrator, NoopReleaser, ProgressCallback};
pub use status::StatusIndex;
