//! `HunterSession` (`spec.md` §6.5-§6.6): the one long-lived object an
//! embedder holds. It owns the caches and the warning ledger that used to
//! be process-global statics in `armake2`, and exposes the dependency-set
//! and macro-state fingerprints consumers use for artifact naming.

use std::path::{Path, PathBuf};

use crate::cache::PreprocessingCache;
use crate::error::{Result, WarningLedger};
use crate::hunter::{DependencyClosure, Hunter};
use crate::macros::{macro_fingerprint, MacroEnv};
use crate::options::HunterOptions;
use crate::registry::ContentHashRegistry;
use crate::toolrunner::ToolRunner;

/// Owns every per-process cache and diagnostic sink this engine uses.
/// Constructing a second `HunterSession` starts from cold caches — there
/// is deliberately no shared global state between sessions.
pub struct HunterSession {
    options: HunterOptions,
    cache: PreprocessingCache,
    warnings: WarningLedger,
}

impl HunterSession {
    pub fn new(options: HunterOptions) -> Self {
        let muted = std::collections::HashSet::new();
        let warnings = WarningLedger::new(options.verbose, muted);
        HunterSession { options, cache: PreprocessingCache::new(), warnings }
    }

    pub fn options(&self) -> &HunterOptions {
        &self.options
    }

    /// Hunt `entry`'s dependency closure relative to `working_tree` (used
    /// only to pick a read strategy), using `registry` for content hashes
    /// and `tool_runner` for compiler/`pkg-config` queries.
    pub fn hunt(
        &mut self,
        working_tree: &Path,
        registry: &dyn ContentHashRegistry,
        tool_runner: &dyn ToolRunner,
        entry: &Path,
    ) -> Result<DependencyClosure> {
        let hunter = Hunter::new(&self.options, registry, tool_runner, working_tree, entry)?;
        hunter.closure(&mut self.cache, &mut self.warnings, entry)
    }

    /// Discard every cache tier. `spec.md` §4.3.3: clearing the
    /// preprocessing cache also invalidates the file-analysis cache.
    pub fn clear_caches(&mut self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &PreprocessingCache {
        &self.cache
    }

    pub fn warnings(&self) -> &WarningLedger {
        &self.warnings
    }

    pub fn print_warning_summary(&self) {
        self.warnings.print_summary();
    }

    /// The 16-hex macro-state fingerprint for `env` (`spec.md` §6.6),
    /// used by artifact-naming consumers to distinguish build outputs
    /// produced under different macro environments.
    pub fn macro_state_fingerprint(&self, env: &MacroEnv) -> String {
        macro_fingerprint(env)
    }

    /// The 14-hex dependency-set fingerprint for a closure (`spec.md`
    /// §6.5): a commutative fold over each dependency's content hash, so
    /// the fingerprint is independent of discovery order. See DESIGN.md
    /// for why a truncated FNV-1a XOR-fold was chosen over an ordered
    /// hash.
    pub fn dependency_set_fingerprint(
        &self,
        registry: &dyn ContentHashRegistry,
        closure: &DependencyClosure,
    ) -> Result<String> {
        let mut acc: u64 = 0xcbf29ce484222325; // FNV offset basis
        for path in closure.header_dependencies.iter().chain(closure.required_source_files.iter()) {
            let hash = registry.get_file_hash(path)?;
            acc ^= fnv1a(hash.as_bytes());
        }
        Ok(format!("{:014x}", acc & 0x00ff_ffff_ffff_ffff))
    }
}

/// FNV-1a over raw bytes, used as the per-dependency contribution folded
/// commutatively (XOR) across the whole dependency set.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
