//! Error taxonomy for the dependency-closure engine, plus the warning
//! ledger that gates non-fatal diagnostics by verbosity (`spec.md` §7).
//!
//! `armake2`'s `error.rs` modeled this with a bare `std::io::Error`, an
//! `error!` macro, and three `static mut` globals for warning bookkeeping.
//! The taxonomy here is closed and each kind carries distinct structured
//! context a caller is expected to match on, so it is a `thiserror` enum
//! instead; the warning bookkeeping keeps the same shape (per-name counters,
//! a cap, a mute set) but lives in a `WarningLedger` a `HunterSession` owns,
//! per the "no module-global mutable caches" design note.

use std::collections::HashSet;
use std::path::PathBuf;

use colored::*;
use hashbrown::HashMap;
use thiserror::Error;

/// All errors the engine can produce.
#[derive(Debug, Error)]
pub enum HunterError {
    /// A path the caller asked to analyze does not exist, or could not be read.
    #[error("file not found: {path}")]
    FileMissing {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The content-hash registry has no entry for `path`; it was not
    /// enumerated at startup. Always fatal.
    #[error("no content hash registered for {path}")]
    HashRegistryMiss { path: PathBuf },

    /// A `//#SOURCE=value` magic flag named a companion source that does
    /// not exist on disk. Always fatal.
    #[error("{origin}: //#SOURCE={value} does not exist")]
    MagicFlagSourceMissing { origin: PathBuf, value: String },

    /// The injected tool runner (compiler or `pkg-config`) failed.
    #[error("command failed ({command}): {message}")]
    ToolInvocationFailed { command: String, message: String },

    /// A `#if`/`#elif` condition could not be evaluated. Non-fatal: the
    /// branch is treated as false by the caller.
    #[error("failed to evaluate expression `{expr}`: {reason}")]
    ExpressionEvaluationFailed { expr: String, reason: String },

    /// An `#include` target could not be resolved against any search path.
    /// Non-fatal: the include is dropped.
    #[error("unresolved include \"{target}\" from {origin}")]
    UnresolvedInclude { target: String, origin: PathBuf },

    /// The dependency-hunter fixed-point loop did not stabilize within its
    /// iteration bound. Non-fatal: the last iteration's result is returned.
    #[error("convergence exceeded after {iterations} iterations for {tu}")]
    ConvergenceExceeded { tu: PathBuf, iterations: u32 },

    /// `context` prepended onto an underlying error, the original kept
    /// below it. Mirrors `armake2::error::ErrorExt::prepend_error`.
    #[error("{context}\n{source}")]
    Context {
        context: String,
        #[source]
        source: Box<HunterError>,
    },
}

impl HunterError {
    /// Whether §7 classifies this kind as fatal. The three non-fatal kinds
    /// never reach a public entry point as an `Err` in the first place —
    /// this exists for callers that log an error generically and still
    /// want to know whether to abort.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            HunterError::ExpressionEvaluationFailed { .. }
                | HunterError::UnresolvedInclude { .. }
                | HunterError::ConvergenceExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, HunterError>;

/// Adds `armake2`'s "prepend a sentence of context" idiom to `Result<T, HunterError>`.
pub trait ErrorExt<T> {
    fn context<M: Into<String>>(self, msg: M) -> Result<T>;
}

impl<T> ErrorExt<T> for Result<T> {
    fn context<M: Into<String>>(self, msg: M) -> Result<T> {
        self.map_err(|e| HunterError::Context {
            context: msg.into(),
            source: Box::new(e),
        })
    }
}

/// Per-name warning counters with a cap and a mute set, owned by a session
/// rather than held in process-global statics.
pub struct WarningLedger {
    maximum: u32,
    muted: HashSet<String>,
    raised: HashMap<String, u32>,
    verbose: u8,
}

impl WarningLedger {
    pub fn new(verbose: u8, muted: HashSet<String>) -> Self {
        WarningLedger {
            maximum: if verbose >= 9 { u32::MAX } else { 10 },
            muted,
            raised: HashMap::new(),
            verbose,
        }
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    /// How many times `warn` was called under `name`, including calls past
    /// the spam cap. `0` if `name` was never raised.
    pub fn raised_count(&self, name: &str) -> u32 {
        self.raised.get(name).copied().unwrap_or(0)
    }

    /// Emit a warning gated by verbosity, name-based muting, and the
    /// per-name spam cap. `name` lets callers group repeated complaints
    /// (e.g. "unresolved-include") so that only the first `maximum` of a
    /// kind are printed.
    pub fn warn(&mut self, msg: &str, name: Option<&str>, location: Option<(&PathBuf, Option<u32>)>) {
        if self.verbose == 0 {
            return;
        }

        if let Some(name) = name {
            if self.muted.contains(name) {
                return;
            }

            let raised = self.raised.entry(name.to_string()).or_insert(0);
            *raised += 1;
            if *raised > self.maximum {
                return;
            }
        }

        let loc_str = match location {
            Some((path, Some(line))) => format!("{}:{}: ", path.display(), line),
            Some((path, None)) => format!("{}: ", path.display()),
            None => String::new(),
        };

        let name_str = name.map(|n| format!(" [{}]", n)).unwrap_or_default();

        log::warn!("{}{}{}", loc_str, msg, name_str);
        eprintln!("{}{}: {}{}", loc_str, "warning".yellow().bold(), msg, name_str);
    }

    /// Print "N warnings of type X were suppressed" for every name that
    /// exceeded the cap, the way `armake2::error::print_warning_summary` does.
    pub fn print_summary(&self) {
        for (name, raised) in &self.raised {
            if self.muted.contains(name) || *raised <= self.maximum {
                continue;
            }

            let excess = *raised - self.maximum;
            let plural = if excess > 1 { "warnings" } else { "warning" };
            eprintln!(
                "{}: {} {} of type \"{}\" were suppressed to prevent spam. Use \"-w {}\" to disable these warnings entirely.",
                "warning".yellow().bold(),
                excess,
                plural,
                name,
                name
            );
        }
    }
}
