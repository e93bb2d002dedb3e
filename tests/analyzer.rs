//! Integration-level checks of the File Analyzer against its public
//! `analyze` entry point, from single-field smoke checks up to a realistic
//! header exercising every structured field together.

use depscan::analyzer::{analyze, DirectiveKind, FileAnalysis, IncludeGuard};

fn fa(src: &str) -> FileAnalysis {
    analyze(src.as_bytes(), "deadbeef".repeat(5), false)
}

#[test]
fn empty_file() {
    let a = fa("");
    assert_eq!(a.line_count, 1);
    assert_eq!(a.line_byte_offsets, vec![0]);
    assert!(a.directives.is_empty());
}

#[test]
fn no_trailing_newline_keeps_last_line() {
    let a = fa("#define X 1\nfoo");
    assert_eq!(a.line_count, 2);
    assert_eq!(a.defines.len(), 1);
    assert_eq!(a.defines[0].name, "X");
}

#[test]
fn quoted_and_system_includes_are_classified() {
    let a = fa("#include \"a.h\"\n#include <b.h>\n");
    assert_eq!(a.quoted_headers.len(), 1);
    assert!(a.quoted_headers.contains("a.h"));
    assert!(a.system_headers.contains("b.h"));
}

#[test]
fn commented_include_is_excluded_from_header_sets() {
    let a = fa("// #include \"a.h\"\n/* #include <b.h>\n*/\n#include <c.h>\n");
    assert!(a.quoted_headers.is_empty());
    assert!(!a.system_headers.contains("b.h"));
    assert!(a.system_headers.contains("c.h"));
    assert_eq!(a.includes.len(), 3);
    assert!(a.includes[0].is_commented);
    assert!(a.includes[1].is_commented);
    assert!(!a.includes[2].is_commented);
}

#[test]
fn magic_flag_requires_only_whitespace_before_it() {
    let a = fa("  //#INCLUDE=/opt/foo\nint x; //#CFLAGS=-O2\n");
    assert_eq!(a.magic_flags.len(), 1);
    assert_eq!(a.magic_flags[0].key, "INCLUDE");
    assert_eq!(a.magic_flags[0].value, "/opt/foo");
}

#[test]
fn include_guard_detected_and_excluded_from_defines() {
    let a = fa("#ifndef FOO_H\n#define FOO_H\n#define BAR 1\n#endif\n");
    assert_eq!(a.include_guard, Some(IncludeGuard::Named("FOO_H".to_string())));
    assert_eq!(a.defines.len(), 1);
    assert_eq!(a.defines[0].name, "BAR");
}

#[test]
fn pragma_once_detected_when_no_ifndef_guard() {
    let a = fa("#pragma once\n#define BAR 1\n");
    assert_eq!(a.include_guard, Some(IncludeGuard::PragmaOnce));
}

#[test]
fn continuation_lines_are_counted_and_joined() {
    let a = fa("#define FOO 1 + \\\n    2\nrest\n");
    assert_eq!(a.directives[0].continuation_lines, 1);
    assert_eq!(a.defines[0].value.as_deref(), Some("1 + 2"));
}

#[test]
fn conditional_macros_collects_ifdef_and_if_identifiers() {
    let a = fa("#ifdef FOO\n#endif\n#if BAR && !defined(BAZ)\n#endif\n");
    assert!(a.conditional_macros.contains("FOO"));
    assert!(a.conditional_macros.contains("BAR"));
    assert!(a.conditional_macros.contains("BAZ"));
    assert!(!a.conditional_macros.contains("defined"));
}

#[test]
fn undef_of_undefined_macro_is_still_recorded_as_a_directive() {
    let a = fa("#undef NEVER_DEFINED\n");
    assert_eq!(a.directives.len(), 1);
    assert_eq!(a.directives[0].kind, DirectiveKind::Undef);
    assert_eq!(a.directives[0].macro_name.as_deref(), Some("NEVER_DEFINED"));
}

#[test]
fn function_like_define_params_are_parsed() {
    let a = fa("#define FOO(x, y) ((x) + (y))\n");
    assert_eq!(a.defines.len(), 1);
    assert!(a.defines[0].is_function_like);
    assert_eq!(a.defines[0].params, vec!["x".to_string(), "y".to_string()]);
    assert_eq!(a.defines[0].value.as_deref(), Some("((x) + (y))"));
}

#[test]
fn object_like_define_is_not_function_like() {
    let a = fa("#define FOO 1\n");
    assert!(!a.defines[0].is_function_like);
    assert!(a.defines[0].params.is_empty());
}

#[test]
fn realistic_header_is_fully_structured() {
    let src = "\
#ifndef WIDGET_H
#define WIDGET_H

//#INCLUDE=vendor
//#PKG-CONFIG=zlib
#include \"base.h\"
#include <cstdint>

#ifdef FEATURE_X
#include \"feature_x.h\"
#endif

#endif
";

    let a = fa(src);

    assert!(matches!(a.include_guard, Some(IncludeGuard::Named(ref n)) if n == "WIDGET_H"));
    assert_eq!(a.quoted_headers.len(), 2);
    assert!(a.quoted_headers.contains("base.h"));
    assert!(a.quoted_headers.contains("feature_x.h"));
    assert!(a.system_headers.contains("cstdint"));
    assert_eq!(a.magic_flags.len(), 2);
    assert!(a.conditional_macros.contains("FEATURE_X"));
}
