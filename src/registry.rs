//! The content-hash registry (`spec.md` §3.6, §4.1.3, §B.3): the engine
//! never hashes file contents itself, it looks hashes up from whatever
//! external source tracks them (a git index in production, a flat map in
//! tests/embedding). Grounded on `compiletools.global_hash_registry`'s
//! singleton path-to-hash map with exact/absolute/relative fallback
//! lookup, reshaped as an injected trait rather than a module-global.

use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::error::{HunterError, Result};

/// A source of truth mapping tracked file paths to content hashes. The
/// engine is deliberately ignorant of how hashes are computed or kept
/// current (git blob IDs, a content-addressed store, ...); it only needs
/// lookup in both directions.
pub trait ContentHashRegistry {
    /// The content hash for `path`, or `HashRegistryMiss` if `path` is not
    /// tracked. Always fatal (`spec.md` §7) — an untracked file breaks the
    /// content-addressing invariant every cache tier relies on.
    fn get_file_hash(&self, path: &Path) -> Result<String>;

    /// The tracked path whose content hash is `hash`, if any.
    fn get_filepath_by_hash(&self, hash: &str) -> Option<PathBuf>;

    /// Every path this registry tracks, for diagnostics and tests.
    fn tracked_files(&self) -> Vec<PathBuf>;
}

/// A flat in-memory registry: the reference implementation for tests and
/// for embedders that already know their file-to-hash mapping up front
/// (e.g. from a build manifest) rather than wanting git enumeration.
#[derive(Clone, Debug, Default)]
pub struct InMemoryHashRegistry {
    by_path: HashMap<PathBuf, String>,
    by_hash: HashMap<String, PathBuf>,
}

impl InMemoryHashRegistry {
    pub fn new() -> Self {
        InMemoryHashRegistry::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, hash: impl Into<String>) {
        let path = path.into();
        let hash = hash.into();
        self.by_hash.insert(hash.clone(), path.clone());
        self.by_path.insert(path, hash);
    }

    /// Look up `path` as given, then canonicalized, matching
    /// `global_hash_registry`'s exact/absolute fallback behavior so
    /// callers don't have to agree in advance on path representation.
    fn resolve<'a>(&'a self, path: &Path) -> Option<&'a String> {
        if let Some(hash) = self.by_path.get(path) {
            return Some(hash);
        }
        path.canonicalize().ok().and_then(|canon| self.by_path.get(&canon))
    }
}

impl ContentHashRegistry for InMemoryHashRegistry {
    fn get_file_hash(&self, path: &Path) -> Result<String> {
        self.resolve(path).cloned().ok_or_else(|| HunterError::HashRegistryMiss { path: path.to_path_buf() })
    }

    fn get_filepath_by_hash(&self, hash: &str) -> Option<PathBuf> {
        self.by_hash.get(hash).cloned()
    }

    fn tracked_files(&self) -> Vec<PathBuf> {
        self.by_path.keys().cloned().collect()
    }
}
