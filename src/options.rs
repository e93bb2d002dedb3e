//! The engine's argument bag (`spec.md` §6.1): plain data describing one
//! run's compiler configuration, search paths, and file-reading limits.
//! Kept as an inert struct rather than something that reaches out to the
//! environment itself — `HunterSession`/the demo binary are responsible
//! for populating it from `clap` args, environment variables, or whatever
//! an embedder already has lying around.

use std::path::PathBuf;

/// Bounded dependency-closure fixed-point iteration, per `spec.md` §4.4.4.
pub const DEFAULT_MAX_CONVERGENCE_ITERATIONS: u32 = 5;

#[derive(Clone, Debug)]
pub struct HunterOptions {
    /// The C compiler to query for predefined macros and, eventually,
    /// invoke (`spec.md` §6.1). Defaults to `cc`.
    pub cc: String,
    /// The C++ compiler, analogous to `cc`. Defaults to `c++`.
    pub cxx: String,
    /// `CPPFLAGS`: preprocessor flags applied to both C and C++ sources.
    /// `-D`/`-U` entries here seed the base macro environment.
    pub cppflags: Vec<String>,
    /// `CFLAGS`: C-specific compiler flags, recorded but not inspected for
    /// macro definitions (by convention `-D`/`-U` belong in `CPPFLAGS`).
    pub cflags: Vec<String>,
    /// `CXXFLAGS`: C++-specific compiler flags.
    pub cxxflags: Vec<String>,
    /// `LDFLAGS`: linker flags.
    pub ldflags: Vec<String>,
    /// Project include directories searched for both quoted and
    /// angle-bracket includes, after the including file's own directory.
    pub include_dirs: Vec<PathBuf>,
    /// Include directories whose headers are treated as out of scope for
    /// dependency tracking (`spec.md` §4.4.1's system-path exclusion):
    /// resolved but not hashed, recursed into, or reported.
    pub system_include_dirs: Vec<PathBuf>,
    /// Truncate any file read to this many bytes; `0` means unbounded
    /// (`spec.md` §4.1.1).
    pub max_file_read_size: usize,
    /// Force `ReadStrategy::Normal` instead of `mmap`.
    pub force_no_mmap: bool,
    /// Force `ReadStrategy::FdSafe`.
    pub force_fd_safe: bool,
    /// Force `ReadStrategy::Normal` unconditionally (distinct from
    /// `force_no_mmap` only in that it also rules out `FdSafe`; kept
    /// separate because they're independent CLI switches in `spec.md`
    /// §6.1's table).
    pub force_normal_mode: bool,
    /// Bound on the dependency-closure fixed-point loop (`spec.md` §4.4.4).
    /// `None` uses [`DEFAULT_MAX_CONVERGENCE_ITERATIONS`].
    pub max_convergence_iterations: Option<u32>,
    /// Regex-like substrings identifying a translation unit as an
    /// executable's entry point, for build-planning consumers (`spec.md`
    /// §6.1's `exemarkers`).
    pub exe_markers: Vec<String>,
    /// Analogous markers for test binaries (`testmarkers`).
    pub test_markers: Vec<String>,
    /// An opaque build variant name, threaded through to diagnostics and
    /// artifact naming but otherwise uninterpreted by this engine
    /// (`spec.md` §6.1/§6.5).
    pub variant: Option<String>,
    /// Verbosity level (0-9), mapped onto `log::Level` per the ambient
    /// logging table and used to size `WarningLedger`'s spam cap.
    pub verbose: u8,
}

impl Default for HunterOptions {
    fn default() -> Self {
        HunterOptions {
            cc: "cc".to_string(),
            cxx: "c++".to_string(),
            cppflags: Vec::new(),
            cflags: Vec::new(),
            cxxflags: Vec::new(),
            ldflags: Vec::new(),
            include_dirs: Vec::new(),
            system_include_dirs: Vec::new(),
            max_file_read_size: 0,
            force_no_mmap: false,
            force_fd_safe: false,
            force_normal_mode: false,
            max_convergence_iterations: None,
            exe_markers: Vec::new(),
            test_markers: Vec::new(),
            variant: None,
            verbose: 0,
        }
    }
}

impl HunterOptions {
    pub fn max_convergence_iterations(&self) -> u32 {
        self.max_convergence_iterations.unwrap_or(DEFAULT_MAX_CONVERGENCE_ITERATIONS)
    }
}
