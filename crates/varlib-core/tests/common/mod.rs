//! Shared fixtures: a temporary library with loaded, available and one
//! external root, populated with real `.var` archives.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use varlib_core::{ExternalDestination, StorageRoots};
use zip::write::SimpleFileOptions;

pub struct Library {
    _temp: TempDir,
    pub roots: StorageRoots,
}

impl Library {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let external = temp.path().join("nas");
        std::fs::create_dir_all(&external).unwrap();

        let roots = StorageRoots::new(
            temp.path().join("AddonPackages"),
            temp.path().join("AllPackages"),
        )
        .with_external(ExternalDestination::new("nas", external));
        std::fs::create_dir_all(&roots.loaded_root).unwrap();
        std::fs::create_dir_all(&roots.available_root).unwrap();

        Self { _temp: temp, roots }
    }

    pub fn loaded(&self, rel: &str) -> PathBuf {
        self.roots.loaded_root.join(rel)
    }

    pub fn available(&self, rel: &str) -> PathBuf {
        self.roots.available_root.join(rel)
    }

    pub fn external(&self, rel: &str) -> PathBuf {
        self.roots.external[0].path.join(rel)
    }

    /// Write a package archive with the given first-level dependencies.
    pub fn add(&self, path: PathBuf, dependencies: &[&str]) -> PathBuf {
        write_var(&path, dependencies);
        path
    }
}

pub fn write_var(path: &Path, dependencies: &[&str]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let deps: serde_json::Map<String, serde_json::Value> = dependencies
        .iter()
        .map(|d| (d.to_string(), serde_json::json!({})))
        .collect();
    let meta = serde_json::json!({ "licenseType": "CC BY", "dependencies": deps });

    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    zip.start_file("meta.json", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(meta.to_string().as_bytes()).unwrap();
    zip.finish().unwrap();
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
