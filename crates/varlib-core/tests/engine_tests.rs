//! Integration tests for the PackageEngine public interface.
//!
//! Each test builds an engine over a temporary library and drives it the
//! way a host would.

mod common;

use async_trait::async_trait;
use common::{names, Library};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use varlib_core::duplicates::default_decisions;
use varlib_core::{
    CancelDisambiguation, CancellationToken, FileOperations, MetadataCatalog, MetadataLookup,
    MostRecentlyModified, OperationKind, PackageEngine, PackageIdentity, PackageMetadata,
    PackageStatus, ProgressCallback, Result, Role, SafeFileOperator, VarError,
};

/// Records every call; fails moves whose source file name contains `fail_on`.
#[derive(Default)]
struct SpyOps {
    fail_on: Option<String>,
    moves: Mutex<Vec<(PathBuf, PathBuf)>>,
    deletes: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl FileOperations for SpyOps {
    async fn move_file(&self, src: &Path, dst: &Path) -> Result<PathBuf> {
        self.moves
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dst.to_path_buf()));
        let file_name = src.file_name().unwrap().to_string_lossy().to_string();
        match &self.fail_on {
            Some(marker) if file_name.contains(marker.as_str()) => Err(VarError::FileLocked {
                path: src.to_path_buf(),
                attempts: 5,
                message: "in use".into(),
            }),
            _ => Ok(dst.to_path_buf()),
        }
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.deletes.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

async fn engine(lib: &Library) -> PackageEngine {
    PackageEngine::builder(lib.roots.clone())
        .build()
        .await
        .expect("Failed to build engine")
}

#[tokio::test]
async fn test_duplicate_in_both_roots_keeps_loaded_copy() {
    let lib = Library::new();
    let loaded = lib.add(lib.loaded("A.Foo.1.var"), &[]);
    let available = lib.add(lib.available("A.Foo.1.var"), &[]);
    lib.add(lib.available("B.Bar.1.var"), &[]);
    let engine = engine(&lib).await;

    let groups = engine.find_duplicates(&[]);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].base_name, "A.Foo");
    assert_eq!(groups[0].roles(), vec![Role::Loaded, Role::Available]);

    let decisions = default_decisions(&groups);
    let outcome = engine
        .resolve_duplicates(&groups, decisions, &MostRecentlyModified, None)
        .await
        .unwrap();

    assert_eq!(outcome.kept, vec![loaded.clone()]);
    assert_eq!(outcome.deleted, vec![available.clone()]);
    assert!(outcome.errors.is_empty());
    assert!(loaded.exists());
    assert!(!available.exists());
    assert_eq!(engine.status("A.Foo").await, PackageStatus::Loaded);
    assert!(engine.find_duplicates(&[]).is_empty());
}

#[tokio::test]
async fn test_cancelled_selection_touches_nothing() {
    let lib = Library::new();
    lib.add(lib.loaded("a/A.Foo.1.var"), &[]);
    lib.add(lib.loaded("b/A.Foo.1.var"), &[]);
    lib.add(lib.available("A.Foo.1.var"), &[]);
    lib.add(lib.loaded("B.Bar.1.var"), &[]);
    lib.add(lib.available("B.Bar.1.var"), &[]);

    let spy = Arc::new(SpyOps::default());
    let engine = PackageEngine::builder(lib.roots.clone())
        .with_file_operations(spy.clone())
        .build()
        .await
        .unwrap();

    let groups = engine.find_duplicates(&[]);
    assert_eq!(groups.len(), 2);

    let err = engine
        .resolve_duplicates(
            &groups,
            default_decisions(&groups),
            &CancelDisambiguation,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, VarError::Aborted { .. }));
    assert!(spy.deletes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dry_run_plan_lists_redundant_copies() {
    let lib = Library::new();
    let loaded = lib.add(lib.loaded("A.Foo.1.var"), &[]);
    let external = lib.add(lib.external("A.Foo.1.var"), &[]);
    let engine = engine(&lib).await;

    let groups = engine.find_duplicates(&names(&["a.foo"]));
    let plan = engine
        .plan_duplicates(&groups, default_decisions(&groups), &MostRecentlyModified)
        .await
        .unwrap();

    assert_eq!(plan.keep, vec![loaded]);
    assert_eq!(plan.delete, vec![external.clone()]);
    assert!(external.exists());
}

#[tokio::test]
async fn test_load_with_dependencies_from_manifests() {
    let lib = Library::new();
    lib.add(lib.available("Scenes/A.Scene.1.var"), &["B.Look.latest", "C.Tex.2"]);
    lib.add(lib.available("B.Look.2.var"), &[]);
    lib.add(lib.available("B.Look.3.var"), &[]);
    lib.add(lib.external("Textures/C.Tex.2.var"), &[]);
    let engine = engine(&lib).await;

    let outcome = engine
        .load(&names(&["A.Scene"]), true, None, None)
        .await
        .unwrap();

    assert_eq!(outcome.requested_count, 1);
    assert_eq!(outcome.dependency_count, 2);
    assert!(outcome.results.iter().all(|r| r.success));
    // External sources run first.
    assert_eq!(outcome.results[0].identifier, "C.Tex.2");

    assert!(lib.loaded("Scenes/A.Scene.1.var").exists());
    assert!(lib.loaded("B.Look.3.var").exists());
    assert!(lib.available("B.Look.2.var").exists());
    assert!(lib.loaded("Textures/C.Tex.2.var").exists());
    assert!(!lib.external("Textures/C.Tex.2.var").exists());

    assert_eq!(engine.status("A.Scene").await, PackageStatus::Loaded);
    assert_eq!(engine.status("C.Tex").await, PackageStatus::Loaded);
}

#[tokio::test]
async fn test_unload_without_dependencies_leaves_them_loaded() {
    let lib = Library::new();
    lib.add(lib.loaded("A.Scene.1.var"), &["B.Look.1"]);
    lib.add(lib.loaded("B.Look.1.var"), &[]);
    let engine = engine(&lib).await;

    let outcome = engine
        .unload(&names(&["A.Scene"]), false, None, None)
        .await
        .unwrap();

    assert_eq!(outcome.dependency_count, 0);
    assert!(lib.available("A.Scene.1.var").exists());
    assert!(lib.loaded("B.Look.1.var").exists());
    assert_eq!(engine.status("A.Scene").await, PackageStatus::Available);
}

#[tokio::test]
async fn test_repeat_operation_is_throttled() {
    let lib = Library::new();
    lib.add(lib.available("A.Foo.1.var"), &[]);
    let engine = engine(&lib).await;
    let selection = names(&["A.Foo"]);

    let first = engine.load(&selection, false, None, None).await.unwrap();
    assert!(first.results[0].success);
    let back = engine.unload(&selection, false, None, None).await.unwrap();
    assert!(back.results[0].success);

    let again = engine.load(&selection, false, None, None).await.unwrap();
    assert!(!again.results[0].success);
    assert!(again.results[0].throttled);
    assert!(lib.available("A.Foo.1.var").exists());

    let summary = again.summary(OperationKind::Load);
    assert_eq!(summary.throttled, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_repeat_operation_allowed_after_window() {
    let lib = Library::new();
    lib.add(lib.available("A.Foo.1.var"), &[]);
    let engine = PackageEngine::builder(lib.roots.clone())
        .throttle_window(Duration::from_millis(250))
        .build()
        .await
        .unwrap();
    let selection = names(&["A.Foo"]);

    engine.load(&selection, false, None, None).await.unwrap();
    engine.unload(&selection, false, None, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let again = engine.load(&selection, false, None, None).await.unwrap();
    assert!(again.results[0].success);
    assert!(!again.results[0].throttled);
    assert!(lib.loaded("A.Foo.1.var").exists());
    assert_eq!(engine.status("A.Foo").await, PackageStatus::Loaded);
}

#[tokio::test]
async fn test_load_restores_archived_dependency() {
    let lib = Library::new();
    lib.add(lib.available("A.Scene.1.var"), &["B.Old.1"]);
    lib.add(lib.available("ArchivedPackages/Looks/B.Old.1.var"), &[]);
    let engine = engine(&lib).await;
    assert_eq!(engine.status("B.Old").await, PackageStatus::Archived);

    let outcome = engine
        .load(&names(&["A.Scene"]), true, None, None)
        .await
        .unwrap();

    assert_eq!(outcome.dependency_count, 1);
    let summary = outcome.summary(OperationKind::Load);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert!(lib.loaded("Looks/B.Old.1.var").exists());
    assert!(!lib.available("ArchivedPackages/Looks/B.Old.1.var").exists());
    assert_eq!(engine.status("B.Old").await, PackageStatus::Loaded);
}

#[tokio::test]
async fn test_library_with_non_ascii_names() {
    let lib = Library::new();
    lib.add(lib.available("Creator.Café.12.var"), &["作者.パッケージ.1"]);
    lib.add(lib.available("作者.パッケージ.1.var"), &[]);
    let engine = engine(&lib).await;

    assert_eq!(engine.base_names().len(), 2);
    assert_eq!(engine.status("Creator.Café").await, PackageStatus::Available);

    let outcome = engine
        .load(&names(&["Creator.Café.12"]), true, None, None)
        .await
        .unwrap();

    assert_eq!(outcome.dependency_count, 1);
    assert!(outcome.results.iter().all(|r| r.success));
    assert!(lib.loaded("Creator.Café.12.var").exists());
    assert!(lib.loaded("作者.パッケージ.1.var").exists());
}

#[tokio::test]
async fn test_batch_continues_past_failed_item() {
    let lib = Library::new();
    for name in ["A.One", "A.Two", "A.Three", "A.Four", "A.Five"] {
        lib.add(lib.available(&format!("{}.1.var", name)), &[]);
    }
    let spy = Arc::new(SpyOps {
        fail_on: Some("A.Three".into()),
        ..Default::default()
    });
    let engine = PackageEngine::builder(lib.roots.clone())
        .with_file_operations(spy.clone())
        .build()
        .await
        .unwrap();

    let selection = names(&["A.One", "A.Two", "A.Three", "A.Four", "A.Five"]);
    let outcome = engine.load(&selection, false, None, None).await.unwrap();

    assert_eq!(outcome.results.len(), 5);
    assert_eq!(spy.moves.lock().unwrap().len(), 5);
    let identifiers: Vec<&str> = outcome
        .results
        .iter()
        .map(|r| r.identifier.as_str())
        .collect();
    assert_eq!(identifiers, vec!["A.One", "A.Two", "A.Three", "A.Four", "A.Five"]);

    let summary = outcome.summary(OperationKind::Load);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert!(summary.messages[0].starts_with("A.Three: "));
}

#[tokio::test]
async fn test_cancel_from_progress_stops_batch() {
    let lib = Library::new();
    for name in ["A.One", "A.Two", "A.Three"] {
        lib.add(lib.available(&format!("{}.1.var", name)), &[]);
    }
    let engine = engine(&lib).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let progress: ProgressCallback = Arc::new(move |done: usize, _total: usize, _name: &str| {
        if done == 1 {
            trigger.cancel();
        }
    });

    let outcome = engine
        .load(
            &names(&["A.One", "A.Two", "A.Three"]),
            false,
            Some(progress),
            Some(&cancel),
        )
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.results.len(), 1);
    assert!(lib.loaded("A.One.1.var").exists());
    assert!(lib.available("A.Two.1.var").exists());
    assert!(lib.available("A.Three.1.var").exists());
}

#[tokio::test]
async fn test_conflict_names_continue_past_one_hundred() {
    let lib = Library::new();
    let src = lib.add(lib.available("A.Foo.1.var"), &[]);
    let dst = lib.add(lib.loaded("A.Foo.1.var"), &[]);
    for i in 1..=100 {
        std::fs::write(lib.loaded(&format!("A.Foo.1_conflict{}.var", i)), b"x").unwrap();
    }

    let ops = SafeFileOperator::new();
    let moved = ops.move_file(&src, &dst).await.unwrap();

    assert_eq!(moved, lib.loaded("A.Foo.1_conflict101.var"));
    assert!(moved.exists());
    assert!(!src.exists());
}

#[tokio::test]
async fn test_archive_moves_old_version_and_reports_outdated() {
    let lib = Library::new();
    lib.add(lib.available("Looks/A.Foo.1.var"), &[]);
    lib.add(lib.loaded("A.Foo.2.var"), &[]);
    let engine = engine(&lib).await;

    assert!(engine.metadata().resolve("A.Foo.1").unwrap().is_old_version);

    let outcome = engine
        .archive(&names(&["A.Foo.1", "A.Foo.2"]), None, None)
        .await
        .unwrap();

    assert!(outcome.results[0].success);
    assert!(!outcome.results[1].success);
    assert!(lib.available("ArchivedPackages/Looks/A.Foo.1.var").exists());
    assert!(!lib.available("Looks/A.Foo.1.var").exists());
    assert!(lib.loaded("A.Foo.2.var").exists());
}

#[tokio::test]
async fn test_status_from_supplied_metadata() {
    let lib = Library::new();
    lib.add(lib.available("A.Foo.1.var"), &[]);
    lib.add(lib.available("ArchivedPackages/B.Old.1.var"), &[]);

    let mut outdated = PackageMetadata::new(&PackageIdentity::parse("A.Foo.1").unwrap());
    outdated.latest_version_number = Some(2);
    let catalog = MetadataCatalog::from_records([outdated]);

    let engine = PackageEngine::builder(lib.roots.clone())
        .with_metadata(Arc::new(catalog))
        .build()
        .await
        .unwrap();

    let statuses = engine
        .statuses(&names(&["A.Foo", "B.Old", "C.Gone", "nodot"]))
        .await;
    assert_eq!(statuses["A.Foo"], PackageStatus::Outdated);
    assert_eq!(statuses["B.Old"], PackageStatus::Archived);
    assert_eq!(statuses["C.Gone"], PackageStatus::Missing);
    assert_eq!(statuses["nodot"], PackageStatus::Unknown);
}

#[tokio::test]
async fn test_empty_selection_is_rejected() {
    let lib = Library::new();
    let engine = engine(&lib).await;

    let err = engine.load(&[], false, None, None).await.unwrap_err();
    assert!(matches!(err, VarError::EmptySelection));
}
