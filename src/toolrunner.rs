//! Subprocess access for the two external tools the engine shells out to
//! (`spec.md` §4.4, §B.1): the configured compiler, to discover its
//! predefined macros, and `pkg-config`, to resolve package flags. Callers
//! inject a [`ToolRunner`] rather than this module calling
//! `std::process::Command` directly, so tests can substitute a fake
//! process and the hunter never spawns anything during dependency
//! analysis proper — grounded on `armake2`'s pattern of keeping
//! subprocess invocation (`p3d.rs`'s calls out to external converters)
//! behind a narrow seam callers can swap in tests.

use crate::error::{HunterError, Result};
use crate::macros::MacroEnv;

/// Runs an external command and returns its captured stdout. Implementors
/// are expected to treat a non-zero exit status as failure.
pub trait ToolRunner {
    fn run(&self, argv: &[String], stdin: Option<&[u8]>) -> Result<String>;
}

/// Shells out via [`std::process::Command`]. The only `ToolRunner` the
/// engine itself constructs; embedders and tests are expected to supply
/// their own for anything that shouldn't touch the real filesystem/PATH.
pub struct SubprocessToolRunner;

impl ToolRunner for SubprocessToolRunner {
    fn run(&self, argv: &[String], stdin: Option<&[u8]>) -> Result<String> {
        use std::io::Write;
        use std::process::{Command, Stdio};

        let (program, args) = argv.split_first().ok_or_else(|| HunterError::ToolInvocationFailed {
            command: String::new(),
            message: "empty argv".to_string(),
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HunterError::ToolInvocationFailed {
                command: argv.join(" "),
                message: e.to_string(),
            })?;

        if let Some(input) = stdin {
            child
                .stdin
                .take()
                .expect("piped stdin")
                .write_all(input)
                .map_err(|e| HunterError::ToolInvocationFailed {
                    command: argv.join(" "),
                    message: e.to_string(),
                })?;
        }

        let output = child.wait_with_output().map_err(|e| HunterError::ToolInvocationFailed {
            command: argv.join(" "),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(HunterError::ToolInvocationFailed {
                command: argv.join(" "),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Ask `compiler` for its predefined macros (`gcc -dM -E -x c /dev/null`
/// and compatible invocations) and parse the `#define NAME VALUE` lines
/// it prints. Memoizing this per `(compiler, flags)` pair is the caller's
/// job (`HunterSession` does it) — this function is a pure wrapper around
/// one subprocess call.
pub fn predefined_macros(
    runner: &dyn ToolRunner,
    compiler: &str,
    extra_flags: &[String],
) -> Result<MacroEnv> {
    let mut argv = vec![compiler.to_string()];
    argv.extend(extra_flags.iter().cloned());
    argv.extend(["-dM".to_string(), "-E".to_string(), "-x".to_string(), "c".to_string(), "-".to_string()]);

    let output = runner.run(&argv, Some(b""))?;
    Ok(parse_predefine_output(&output))
}

/// Parse `#define NAME VALUE` lines (one compiler-emitted predefined
/// macro per line) into a [`MacroEnv`]. Lines that aren't well-formed
/// `#define`s are skipped rather than failing the whole parse — compilers
/// occasionally emit a stray warning on stdout when misconfigured, and a
/// single bad line shouldn't discard every macro found on the others.
fn parse_predefine_output(output: &str) -> MacroEnv {
    let mut env = MacroEnv::new();
    for line in output.lines() {
        let Some(rest) = line.strip_prefix("#define ") else { continue };
        let mut parts = rest.splitn(2, char::is_whitespace);
        let Some(name) = parts.next() else { continue };
        let value = parts.next().unwrap_or("").trim();
        env.define(name.to_string(), value.to_string());
    }
    env
}

/// Run `pkg-config --cflags --libs <package>` and split the results into
/// (cflags, libs) token vectors, rewriting every `-I` into `-isystem`
/// (`spec.md` §4.4.3 / §8.3 Scenario: third-party package headers should
/// not generate the same warnings as the project's own headers).
pub fn pkg_config_flags(runner: &dyn ToolRunner, package: &str) -> Result<(Vec<String>, Vec<String>)> {
    let cflags_out = runner.run(
        &["pkg-config".to_string(), "--cflags".to_string(), package.to_string()],
        None,
    )?;
    let libs_out = runner.run(
        &["pkg-config".to_string(), "--libs".to_string(), package.to_string()],
        None,
    )?;

    let cflags = tokenize_shell_words(&cflags_out).into_iter().map(rewrite_include_to_isystem).collect();
    let libs = tokenize_shell_words(&libs_out);
    Ok((cflags, libs))
}

/// `pkg-config` output is whitespace-separated shell-word tokens; no
/// quoting or escaping is expected in practice (flags, paths, and library
/// names), so plain whitespace splitting is sufficient.
fn tokenize_shell_words(output: &str) -> Vec<String> {
    output.split_whitespace().map(str::to_string).collect()
}

fn rewrite_include_to_isystem(flag: String) -> String {
    if let Some(path) = flag.strip_prefix("-I") {
        format!("-isystem{}", path)
    } else {
        flag
    }
}
