//! The two-tier preprocessing cache (`spec.md` §3.4, §4.3): a
//! content-hash-keyed analysis cache feeding a content-hash-keyed
//! "invariant" result cache and a `(content_hash, macro state)`-keyed
//! "variant" result cache. Owned by [`crate::session::HunterSession`]
//! rather than held in process-global statics — `armake2`'s own
//! module-global caches are exactly the pattern `spec.md` §9 flags for
//! re-architecture.

use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::analyzer::{self, FileAnalysis};
use crate::error::{HunterError, Result};
use crate::eval::{self, ProcessingResult};
use crate::macros::{macro_fingerprint, FrozenMacros, MacroEnv};
use crate::reader::ReadStrategy;

/// Diagnostic counters for one cache tier (`spec.md` §4.3.3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct TierStats {
    hits: u64,
    misses: u64,
}

/// A file's analysis, keyed by its content hash, plus the two-tier
/// evaluation-result cache built on top of it. Clearing the preprocessing
/// cache also invalidates the file-analysis cache (§4.3.3): a cleared
/// session should re-read files from disk, not just re-run the stack
/// machine over a stale scan.
pub struct PreprocessingCache {
    analysis: HashMap<String, Arc<FileAnalysis>>,
    analysis_stats: TierStats,
    /// Results that don't depend on the macro environment at all — the
    /// "effectively macro-invariant" case of §4.3.1.
    invariant: HashMap<String, Arc<ProcessingResult>>,
    invariant_stats: TierStats,
    /// Results keyed by the full frozen macro state, for files whose
    /// active-line set does depend on the environment.
    variant: HashMap<(String, FrozenMacros), Arc<ProcessingResult>>,
    variant_stats: TierStats,
}

impl PreprocessingCache {
    pub fn new() -> Self {
        PreprocessingCache {
            analysis: HashMap::new(),
            analysis_stats: TierStats::default(),
            invariant: HashMap::new(),
            invariant_stats: TierStats::default(),
            variant: HashMap::new(),
            variant_stats: TierStats::default(),
        }
    }

    /// Read `path` under `strategy` and analyze it, or return the memoized
    /// analysis for `content_hash` if this process has already seen it
    /// (§4.1.3: exactly one analysis per distinct content hash per
    /// process).
    pub fn get_or_analyze(
        &mut self,
        path: &Path,
        content_hash: &str,
        strategy: ReadStrategy,
        max_read_size: usize,
    ) -> Result<Arc<FileAnalysis>> {
        if let Some(existing) = self.analysis.get(content_hash) {
            self.analysis_stats.hits += 1;
            return Ok(Arc::clone(existing));
        }

        self.analysis_stats.misses += 1;
        let (bytes, was_truncated) = strategy.read(path, max_read_size)?;
        let analysis = Arc::new(analyzer::analyze(&bytes, content_hash.to_string(), was_truncated));
        self.analysis.insert(content_hash.to_string(), Arc::clone(&analysis));
        Ok(analysis)
    }

    /// Evaluate `file` against `input_env`, serving from whichever cache
    /// tier applies (§4.3.1, §4.3.2): the invariant cache if none of
    /// `file`'s `conditional_macros` are defined in `input_env` (so the
    /// result can't depend on the environment), the variant cache
    /// otherwise.
    pub fn get_or_compute(&mut self, file: &FileAnalysis, input_env: &MacroEnv) -> Arc<ProcessingResult> {
        let macro_invariant = input_env.disjoint_from(file.conditional_macros.iter().map(String::as_str));

        if macro_invariant {
            if let Some(existing) = self.invariant.get(&file.content_hash) {
                self.invariant_stats.hits += 1;
                return Arc::clone(existing);
            }
            self.invariant_stats.misses += 1;
            let result = Arc::new(eval::evaluate(file, input_env));
            self.invariant.insert(file.content_hash.clone(), Arc::clone(&result));
            return result;
        }

        let key = (file.content_hash.clone(), FrozenMacros::freeze(input_env));
        if let Some(existing) = self.variant.get(&key) {
            self.variant_stats.hits += 1;
            return Arc::clone(existing);
        }
        self.variant_stats.misses += 1;
        let result = Arc::new(eval::evaluate(file, input_env));
        self.variant.insert(key, Arc::clone(&result));
        result
    }

    /// Clear every tier. Per §4.3.3, clearing the preprocessing cache
    /// invalidates the file-analysis cache too — there is no reason to
    /// keep a stale scan of a file whose processed results were just
    /// discarded.
    pub fn clear(&mut self) {
        self.analysis.clear();
        self.invariant.clear();
        self.variant.clear();
    }

    pub fn analysis_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.analysis_stats.hits,
            misses: self.analysis_stats.misses,
            entries: self.analysis.len(),
        }
    }

    pub fn invariant_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.invariant_stats.hits,
            misses: self.invariant_stats.misses,
            entries: self.invariant.len(),
        }
    }

    pub fn variant_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.variant_stats.hits,
            misses: self.variant_stats.misses,
            entries: self.variant.len(),
        }
    }
}

impl Default for PreprocessingCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a macro-state fingerprint string to nothing more than a log
/// label; kept here (rather than inlined at call sites) since both cache
/// tiers and diagnostics want the same string.
pub fn describe_macro_state(env: &MacroEnv) -> String {
    macro_fingerprint(env)
}

