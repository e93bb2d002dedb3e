//! Integration checks of the in-memory content-hash registry (`spec.md`
//! §3.6, §4.1.3).

use std::path::{Path, PathBuf};

use depscan::registry::{ContentHashRegistry, InMemoryHashRegistry};
use depscan::HunterError;

#[test]
fn lookup_by_exact_path_round_trips() {
    let mut registry = InMemoryHashRegistry::new();
    registry.insert("/src/a.h", "abc123");
    assert_eq!(registry.get_file_hash(Path::new("/src/a.h")).unwrap(), "abc123");
    assert_eq!(registry.get_filepath_by_hash("abc123"), Some(PathBuf::from("/src/a.h")));
}

#[test]
fn untracked_path_is_fatal_miss() {
    let registry = InMemoryHashRegistry::new();
    let result = registry.get_file_hash(Path::new("/nowhere.h"));
    assert!(matches!(result, Err(HunterError::HashRegistryMiss { .. })));
}

#[test]
fn tracked_files_lists_every_inserted_path() {
    let mut registry = InMemoryHashRegistry::new();
    registry.insert("/a.h", "1");
    registry.insert("/b.h", "2");
    let mut files = registry.tracked_files();
    files.sort();
    assert_eq!(files, vec![PathBuf::from("/a.h"), PathBuf::from("/b.h")]);
}
