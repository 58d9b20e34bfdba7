//! Integration tests for the watcher public API.
//! Exercises ExportWatcher::is_export and that watch() can be created for a temp directory.

use std::path::Path;
use surveylab::watcher::ExportWatcher;

#[test]
fn watcher_is_export_accepts_csv() {
    let dir = tempfile::TempDir::new().unwrap();
    let watcher = ExportWatcher::watch(dir.path()).unwrap();
    assert!(watcher.is_export(Path::new("wave1.csv")));
    assert!(watcher.is_export(Path::new("data/Slides_B.CSV")));
}

#[test]
fn watcher_is_export_rejects_other_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let watcher = ExportWatcher::watch(dir.path()).unwrap();
    assert!(!watcher.is_export(Path::new("report.md")));
    assert!(!watcher.is_export(Path::new(".surveylab-cache.json")));
    assert!(!watcher.is_export(Path::new("csv")));
}

#[test]
fn watcher_ignores_output_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir_all(&out).unwrap();
    let watcher = ExportWatcher::watch(dir.path()).unwrap().ignoring(&out);

    let canonical_out = out.canonicalize().unwrap();
    assert!(!watcher.is_export(&canonical_out.join("loadings1.csv")));
    assert!(watcher.is_export(&dir.path().canonicalize().unwrap().join("wave2.csv")));
}

#[test]
fn watcher_watch_single_file_succeeds() {
    let dir = tempfile::TempDir::new().unwrap();
    let export = dir.path().join("wave1.csv");
    std::fs::write(&export, "variant,g01\n1,3\n").unwrap();
    let result = ExportWatcher::watch(&export);
    assert!(
        result.is_ok(),
        "watch on a single export should succeed: {:?}",
        result.err()
    );
}
