//! Integration-level checks of the conditional-compilation evaluator
//! against its public `evaluate`/`evaluate_expression` entry points.

use depscan::analyzer::{analyze, FileAnalysis};
use depscan::eval::{evaluate, evaluate_expression};
use depscan::macros::MacroEnv;

fn analyze_src(src: &str) -> FileAnalysis {
    analyze(src.as_bytes(), "0".repeat(16), false)
}

#[test]
fn simple_ifdef_true_branch() {
    let fa = analyze_src("#ifdef FOO\nactive\n#else\ninactive\n#endif\n");
    let mut env = MacroEnv::new();
    env.define("FOO", "");
    let result = evaluate(&fa, &env);
    assert!(result.active_lines.contains(&1));
    assert!(!result.active_lines.contains(&3));
}

#[test]
fn ifdef_false_takes_else_branch() {
    let fa = analyze_src("#ifdef FOO\nactive\n#else\ninactive\n#endif\n");
    let env = MacroEnv::new();
    let result = evaluate(&fa, &env);
    assert!(!result.active_lines.contains(&1));
    assert!(result.active_lines.contains(&3));
}

#[test]
fn elif_chain_takes_first_true_branch_only() {
    let fa = analyze_src("#if 0\na\n#elif 1\nb\n#elif 1\nc\n#else\nd\n#endif\n");
    let env = MacroEnv::new();
    let result = evaluate(&fa, &env);
    assert!(!result.active_lines.contains(&1));
    assert!(result.active_lines.contains(&3));
    assert!(!result.active_lines.contains(&5));
    assert!(!result.active_lines.contains(&7));
}

#[test]
fn nested_if_inactive_when_parent_false() {
    let fa = analyze_src("#if 0\n#if 1\ninner\n#endif\n#endif\n");
    let env = MacroEnv::new();
    let result = evaluate(&fa, &env);
    assert!(!result.active_lines.contains(&2));
}

#[test]
fn define_only_takes_effect_on_active_branch() {
    let fa = analyze_src("#ifdef FOO\n#define BAR 1\n#endif\n");
    let env = MacroEnv::new();
    let result = evaluate(&fa, &env);
    assert!(!result.updated_macros.is_defined("BAR"));
    assert!(result.active_defines.is_empty());
}

#[test]
fn undef_removes_macro_on_active_branch() {
    let fa = analyze_src("#undef FOO\n");
    let mut env = MacroEnv::new();
    env.define("FOO", "1");
    let result = evaluate(&fa, &env);
    assert!(!result.updated_macros.is_defined("FOO"));
}

#[test]
fn commented_include_never_marked_active() {
    // The `#include` itself sits at the start of its line (so the
    // directive pass records it), but a block comment opened on the
    // previous line covers it — it must not surface as active.
    let fa = analyze_src("/*\n#include <a.h>\n*/\n");
    let env = MacroEnv::new();
    let result = evaluate(&fa, &env);
    assert!(result.active_includes.is_empty());
}

#[test]
fn hex_and_hash_defined_expression() {
    assert!(evaluate_expression("0x10 == 16", &MacroEnv::new()));
}

#[test]
fn defined_call_form_and_bare_form() {
    let mut env = MacroEnv::new();
    env.define("FOO", "1");
    assert!(evaluate_expression("defined(FOO)", &env));
    assert!(evaluate_expression("defined FOO", &env));
    assert!(!evaluate_expression("defined(BAR)", &env));
}

#[test]
fn undefined_identifier_treated_as_zero() {
    assert!(!evaluate_expression("UNDEFINED_MACRO", &MacroEnv::new()));
    assert!(evaluate_expression("UNDEFINED_MACRO == 0", &MacroEnv::new()));
}

#[test]
fn recursive_macro_substitution_resolves_chain() {
    let mut env = MacroEnv::new();
    env.define("A", "B");
    env.define("B", "1");
    assert!(evaluate_expression("A", &env));
}

#[test]
fn division_by_zero_fails_expression_to_false() {
    assert!(!evaluate_expression("1 / 0", &MacroEnv::new()));
}

#[test]
fn malformed_expression_fails_to_false() {
    assert!(!evaluate_expression("( ( 1", &MacroEnv::new()));
}

#[test]
fn operator_precedence_and_parentheses() {
    assert!(evaluate_expression("1 + 2 * 3 == 7", &MacroEnv::new()));
    assert!(evaluate_expression("(1 + 2) * 3 == 9", &MacroEnv::new()));
}

#[test]
fn line_comment_and_block_comment_stripped_before_evaluation() {
    assert!(evaluate_expression("1 /* inline */ == 1 // trailing", &MacroEnv::new()));
}

#[test]
fn logical_and_or_truth_table() {
    assert!(evaluate_expression("1 || 0", &MacroEnv::new()));
    assert!(!evaluate_expression("0 && 1", &MacroEnv::new()));
    assert!(evaluate_expression("1 && 1", &MacroEnv::new()));
}

#[test]
fn nested_conditional_resolves_against_empty_environment() {
    let src = "\
#define FOO 1
#ifdef FOO
    #ifdef BAR
        inner_active;
    #else
        inner_inactive;
    #endif
    outer_active;
#else
    outer_inactive;
#endif
";

    let analysis = analyze_src(src);
    let result = evaluate(&analysis, &MacroEnv::new());

    let active_text: Vec<&str> = src
        .lines()
        .enumerate()
        .filter(|(i, _)| result.active_lines.contains(i))
        .map(|(_, l)| l.trim())
        .collect();

    assert!(active_text.contains(&"inner_inactive;"));
    assert!(active_text.contains(&"outer_active;"));
    assert!(!active_text.contains(&"inner_active;"));
    assert!(!active_text.contains(&"outer_inactive;"));
    assert_eq!(result.updated_macros.get("FOO"), Some("1"));
}
