//! The dependency hunter (`spec.md` §4.4): walks the `#include` graph of a
//! translation unit under the two-tier cache, applies magic flags as it
//! goes, and repeats the walk to a fixed point since a magic flag
//! discovered late in one pass can change how an earlier include resolves
//! in the next. Grounded on `compiletools.magicflags`'s
//! `_apply_magic_flags`/fixed-point loop and `armake2::preprocess`'s
//! include-resolution search order.

use std::path::{Path, PathBuf};

use hashbrown::HashSet;
use serde::Serialize;

use crate::cache::PreprocessingCache;
use crate::error::{ErrorExt, HunterError, Result, WarningLedger};
use crate::flags::FlagBag;
use crate::macros::MacroEnv;
use crate::options::HunterOptions;
use crate::reader::ReadStrategy;
use crate::registry::ContentHashRegistry;
use crate::toolrunner::{self, ToolRunner};

/// The result of hunting one translation unit's dependencies (`spec.md`
/// §4.4.5): everything a build planner needs to know it depends on.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DependencyClosure {
    /// Project headers reachable from the entry file, in first-discovered
    /// order. System headers are deliberately excluded (§4.4.1).
    pub header_dependencies: Vec<PathBuf>,
    /// Companion source files pulled in via `//#SOURCE=` magic flags, in
    /// first-discovered order.
    pub required_source_files: Vec<PathBuf>,
    /// Accumulated `CPPFLAGS`/`CFLAGS`/`CXXFLAGS`/`LDFLAGS`/user-defined
    /// flags, deduplicated per [`crate::flags`]'s pair-aware rule.
    pub flags: FlagBag,
}

/// The fixed, per-run collaborators a hunt needs. Borrowed rather than
/// owned so a `HunterSession` can hold the real cache/registry/runner and
/// lend them out per call, instead of this type owning its own copies.
pub struct Hunter<'a> {
    pub options: &'a HunterOptions,
    pub registry: &'a dyn ContentHashRegistry,
    pub tool_runner: &'a dyn ToolRunner,
    read_strategy: ReadStrategy,
    base_macro_env: MacroEnv,
}

impl<'a> Hunter<'a> {
    /// Build a `Hunter` for one run: select a read strategy from
    /// `options`, and seed the base macro environment from the
    /// configured compiler's predefined macros plus any `-D`/`-U` already
    /// present in `CPPFLAGS`.
    pub fn new(
        options: &'a HunterOptions,
        registry: &'a dyn ContentHashRegistry,
        tool_runner: &'a dyn ToolRunner,
        working_tree: &Path,
        entry: &Path,
    ) -> Result<Hunter<'a>> {
        let read_strategy = ReadStrategy::select(
            working_tree,
            options.force_no_mmap,
            options.force_fd_safe,
            options.force_normal_mode,
        );

        let compiler = if is_cxx_source(entry) { &options.cxx } else { &options.cc };
        let mut base_macro_env =
            toolrunner::predefined_macros(tool_runner, compiler, &[]).context("querying compiler predefined macros")?;
        apply_dash_d_dash_u(&options.cppflags, &mut base_macro_env);

        Ok(Hunter { options, registry, tool_runner, read_strategy, base_macro_env })
    }

    /// Hunt `entry`'s transitive dependency closure to a fixed point
    /// (`spec.md` §4.4.4), bounded at
    /// [`HunterOptions::max_convergence_iterations`].
    pub fn closure(
        &self,
        cache: &mut PreprocessingCache,
        warnings: &mut WarningLedger,
        entry: &Path,
    ) -> Result<DependencyClosure> {
        let entry_canonical = entry.canonicalize().unwrap_or_else(|_| entry.to_path_buf());
        let mut include_dirs = self.options.include_dirs.clone();
        let mut flags = FlagBag::new();
        let mut previous: Option<(Vec<PathBuf>, Vec<PathBuf>)> = None;
        let max_iterations = self.options.max_convergence_iterations();
        let mut final_state = None;

        for iteration in 0..max_iterations {
            let mut header_seen = HashSet::new();
            // The entry TU is never its own dependency, even if a cycle
            // routes back through it.
            header_seen.insert(entry_canonical.clone());
            let mut state = ClosureState {
                include_dirs: include_dirs.clone(),
                header_dependencies: Vec::new(),
                header_seen,
                required_source_files: Vec::new(),
                source_seen: HashSet::new(),
                flags: flags.clone(),
            };
            let mut ancestors = HashSet::new();
            self.walk(entry, self.base_macro_env.clone(), &mut ancestors, &mut state, cache, warnings)?;

            let signature = (state.header_dependencies.clone(), state.required_source_files.clone());
            include_dirs = state.include_dirs.clone();
            flags = state.flags.clone();
            let stable = previous.as_ref() == Some(&signature);
            previous = Some(signature);
            final_state = Some(state);

            if stable {
                break;
            }
            if iteration + 1 == max_iterations {
                warnings.warn(
                    &format!("dependency closure for {} did not converge within {} iterations", entry.display(), max_iterations),
                    Some("convergence-exceeded"),
                    Some((&entry.to_path_buf(), None)),
                );
            }
        }

        let state = final_state.expect("the loop always runs at least one iteration");
        Ok(DependencyClosure {
            header_dependencies: state.header_dependencies,
            required_source_files: state.required_source_files,
            flags: state.flags,
        })
    }

    fn walk(
        &self,
        path: &Path,
        env: MacroEnv,
        ancestors: &mut HashSet<PathBuf>,
        state: &mut ClosureState,
        cache: &mut PreprocessingCache,
        warnings: &mut WarningLedger,
    ) -> Result<()> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !ancestors.insert(canonical.clone()) {
            return Ok(());
        }

        let origin_dir = canonical.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let content_hash = self.registry.get_file_hash(&canonical)?;
        let analysis =
            cache.get_or_analyze(&canonical, &content_hash, self.read_strategy, self.options.max_file_read_size)?;
        let result = cache.get_or_compute(&analysis, &env);

        for &idx in &result.active_magic_flags {
            let flag = &analysis.magic_flags[idx];
            self.apply_magic_flag(&flag.key, &flag.value, &origin_dir, state, cache, warnings)?;
        }

        for &idx in &result.active_includes {
            let include = &analysis.includes[idx];
            match resolve_include(&origin_dir, &include.filename, include.is_system, &state.include_dirs, &self.options.system_include_dirs) {
                Some(resolved) if !resolved.is_system => {
                    if state.header_seen.insert(resolved.path.clone()) {
                        state.header_dependencies.push(resolved.path.clone());
                    }
                    self.walk(&resolved.path, result.updated_macros.clone(), ancestors, state, cache, warnings)?;
                }
                Some(_) => {}
                None => {
                    warnings.warn(
                        &format!("unresolved include \"{}\"", include.filename),
                        Some("unresolved-include"),
                        Some((&canonical, Some(include.line_num as u32 + 1))),
                    );
                }
            }
        }

        ancestors.remove(&canonical);
        Ok(())
    }

    fn apply_magic_flag(
        &self,
        key: &str,
        value: &str,
        origin_dir: &Path,
        state: &mut ClosureState,
        cache: &mut PreprocessingCache,
        warnings: &mut WarningLedger,
    ) -> Result<()> {
        match key {
            "INCLUDE" => {
                let dir = resolve_relative(origin_dir, value);
                let flag = format!("-I{}", dir.display());
                if !state.include_dirs.contains(&dir) {
                    state.include_dirs.push(dir);
                }
                for flag_key in ["CPPFLAGS", "CFLAGS", "CXXFLAGS"] {
                    state.flags.push(flag_key, flag.clone());
                }
                state.flags.push("INCLUDE", value);
            }
            "SOURCE" => {
                let source_path = resolve_relative(origin_dir, value);
                if !source_path.is_file() {
                    return Err(HunterError::MagicFlagSourceMissing {
                        origin: origin_dir.to_path_buf(),
                        value: value.to_string(),
                    });
                }
                if state.source_seen.insert(source_path.clone()) {
                    state.required_source_files.push(source_path.clone());
                }
                let mut ancestors = HashSet::new();
                self.walk(&source_path, self.base_macro_env.clone(), &mut ancestors, state, cache, warnings)?;
            }
            "PKG-CONFIG" => {
                for package in value.split_whitespace() {
                    state.flags.push("PKG-CONFIG", package);
                    let (cflags, libs) = toolrunner::pkg_config_flags(self.tool_runner, package)
                        .context(format!("resolving pkg-config package \"{}\"", package))?;
                    for flag in cflags {
                        for flag_key in ["CPPFLAGS", "CFLAGS", "CXXFLAGS"] {
                            state.flags.push(flag_key, flag.clone());
                        }
                    }
                    for flag in libs {
                        state.flags.push("LDFLAGS", flag);
                    }
                }
            }
            "CPPFLAGS" | "CFLAGS" | "CXXFLAGS" | "LDFLAGS" => {
                for token in value.split_whitespace() {
                    state.flags.push(key, token);
                }
            }
            other => {
                state.flags.push(other, value);
            }
        }
        Ok(())
    }
}

struct ClosureState {
    include_dirs: Vec<PathBuf>,
    header_dependencies: Vec<PathBuf>,
    header_seen: HashSet<PathBuf>,
    required_source_files: Vec<PathBuf>,
    source_seen: HashSet<PathBuf>,
    flags: FlagBag,
}

struct ResolvedInclude {
    path: PathBuf,
    is_system: bool,
}

/// Resolve one `#include` target (`spec.md` §4.4.1). Quoted includes
/// search the including file's own directory first, then project include
/// directories; angle-bracket includes search only the configured system
/// include directories, never the project ones. A result under a
/// configured system include directory is flagged `is_system` so the
/// caller can exclude it from dependency tracking.
fn resolve_include(
    origin_dir: &Path,
    filename: &str,
    is_system: bool,
    project_include_dirs: &[PathBuf],
    system_include_dirs: &[PathBuf],
) -> Option<ResolvedInclude> {
    let search: Vec<&Path> = if is_system {
        system_include_dirs.iter().map(PathBuf::as_path).collect()
    } else {
        std::iter::once(origin_dir).chain(project_include_dirs.iter().map(PathBuf::as_path)).collect()
    };

    for dir in search {
        let candidate = dir.join(filename);
        if candidate.is_file() {
            let canonical = candidate.canonicalize().unwrap_or(candidate);
            let is_system_path = system_include_dirs.iter().any(|sys_dir| {
                sys_dir
                    .canonicalize()
                    .map(|sys_canon| canonical.starts_with(sys_canon))
                    .unwrap_or_else(|_| canonical.starts_with(sys_dir))
            });
            return Some(ResolvedInclude { path: canonical, is_system: is_system_path });
        }
    }
    None
}

fn resolve_relative(origin_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value.trim());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        origin_dir.join(path)
    }
}

/// Whether `path`'s extension marks it as a C++ (rather than plain C)
/// translation unit, for picking `CXX` vs `CC` to query predefined macros
/// (`spec.md` §6.1). Headers have no reliable language of their own; this
/// only matters for the entry TU itself.
fn is_cxx_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("cpp") | Some("cc") | Some("cxx") | Some("c++") | Some("hpp") | Some("hh") | Some("hxx")
    )
}

fn apply_dash_d_dash_u(flags: &[String], env: &mut MacroEnv) {
    for flag in flags {
        if let Some(def) = flag.strip_prefix("-D") {
            match def.split_once('=') {
                Some((name, value)) => env.define(name.to_string(), value.to_string()),
                None => env.define(def.to_string(), String::new()),
            }
        } else if let Some(name) = flag.strip_prefix("-U") {
            env.undef(name);
        }
    }
}

