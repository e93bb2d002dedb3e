//! The conditional-compilation evaluator (`spec.md` §4.2): walks a
//! [`FileAnalysis`]'s directive list against an input [`MacroEnv`], running
//! the `#if`/`#ifdef`/.../`#endif` stack machine to decide which lines are
//! active, and folds in the resulting `#define`/`#undef` effects. Grounded
//! on `compiletools.simple_preprocessor`'s state-transition table and
//! `_safe_eval` expression evaluator.

use hashbrown::HashSet;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzer::{Directive, DirectiveKind, FileAnalysis};
use crate::macros::MacroEnv;

/// The outcome of evaluating one file against one macro environment
/// (`spec.md` §4.2.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingResult {
    /// Line numbers whose text is active under this environment.
    pub active_lines: HashSet<usize>,
    /// Indices into `FileAnalysis::includes` that are active (not
    /// commented out, and on an active line).
    pub active_includes: Vec<usize>,
    /// Indices into `FileAnalysis::magic_flags` that are active.
    pub active_magic_flags: Vec<usize>,
    /// Indices into `FileAnalysis::defines` that took effect (are on an
    /// active `#define` line).
    pub active_defines: Vec<usize>,
    /// The macro environment after applying every active `#define`/`#undef`
    /// in this file, in line order, on top of the input environment.
    pub updated_macros: MacroEnv,
}

/// One frame of the conditional-compilation stack (`spec.md` §4.2.1):
/// whether this branch's body is currently active, whether an `#else` has
/// already been seen for this `#if`/`#ifdef` chain (a second `#else` is a
/// malformed-input edge case handled by simply ignoring it), and whether
/// any branch in the chain has been taken yet (so a later `#elif`/`#else`
/// knows to stay inactive even if its own condition would be true).
struct Frame {
    active: bool,
    seen_else: bool,
    any_branch_taken: bool,
    /// The frame's activity is irrelevant if an enclosing frame is already
    /// inactive; `enclosing_active` lets a nested frame tell "my condition
    /// is false" apart from "my parent is inactive, so I can't be active
    /// regardless of my own condition".
    enclosing_active: bool,
}

impl Frame {
    fn effective(&self) -> bool {
        self.active && self.enclosing_active
    }
}

/// Walk `file`'s directives against `input_env` and produce the
/// corresponding [`ProcessingResult`]. Expression evaluation failures are
/// non-fatal (`spec.md` §7): a condition that cannot be evaluated is
/// treated as false and the branch is skipped.
pub fn evaluate(file: &FileAnalysis, input_env: &MacroEnv) -> ProcessingResult {
    let mut env = input_env.clone();
    let mut stack: Vec<Frame> = Vec::new();
    let mut active_lines = HashSet::new();
    let mut active_includes = Vec::new();
    let mut active_magic_flags = Vec::new();
    let mut active_defines = Vec::new();

    for line_num in 0..file.line_count {
        let directive = file.directive_by_line.get(&line_num).map(|&i| &file.directives[i]);
        let currently_active = stack.last().map(Frame::effective).unwrap_or(true);

        match directive.map(|d| d.kind) {
            Some(DirectiveKind::If) | Some(DirectiveKind::Ifdef) | Some(DirectiveKind::Ifndef) => {
                let d = directive.unwrap();
                let enclosing_active = currently_active;
                let condition_true = enclosing_active && directive_is_true(d, &env);
                stack.push(Frame {
                    active: condition_true,
                    seen_else: false,
                    any_branch_taken: condition_true,
                    enclosing_active,
                });
                active_lines.insert(line_num);
            }
            Some(DirectiveKind::Elif) => {
                let d = directive.unwrap();
                if let Some(frame) = stack.last_mut() {
                    if !frame.seen_else {
                        let take = frame.enclosing_active
                            && !frame.any_branch_taken
                            && evaluate_expression(d.condition.as_deref().unwrap_or(""), &env);
                        frame.active = take;
                        frame.any_branch_taken |= take;
                    } else {
                        frame.active = false;
                    }
                }
                active_lines.insert(line_num);
            }
            Some(DirectiveKind::Else) => {
                if let Some(frame) = stack.last_mut() {
                    let take = frame.enclosing_active && !frame.any_branch_taken && !frame.seen_else;
                    frame.active = take;
                    frame.seen_else = true;
                    frame.any_branch_taken |= take;
                }
                active_lines.insert(line_num);
            }
            Some(DirectiveKind::Endif) => {
                stack.pop();
                active_lines.insert(line_num);
            }
            Some(DirectiveKind::Define) => {
                if currently_active {
                    active_lines.insert(line_num);
                    if let Some(idx) = file.directive_by_line.get(&line_num) {
                        if let Some(define_idx) = define_index_for_directive(file, *idx) {
                            active_defines.push(define_idx);
                            let define = &file.defines[define_idx];
                            env.define(define.name.clone(), define.value.clone().unwrap_or_default());
                        }
                    }
                }
            }
            Some(DirectiveKind::Undef) => {
                if currently_active {
                    active_lines.insert(line_num);
                    if let Some(d) = directive {
                        if let Some(name) = &d.macro_name {
                            env.undef(name);
                        }
                    }
                }
            }
            Some(DirectiveKind::Include) => {
                if currently_active {
                    active_lines.insert(line_num);
                    for (i, inc) in file.includes.iter().enumerate() {
                        if inc.line_num == line_num && !inc.is_commented {
                            active_includes.push(i);
                        }
                    }
                }
            }
            Some(_) | None => {
                if currently_active {
                    active_lines.insert(line_num);
                }
            }
        }

        if currently_active {
            for (i, flag) in file.magic_flags.iter().enumerate() {
                if flag.line_num == line_num {
                    active_magic_flags.push(i);
                }
            }
        }
    }

    ProcessingResult {
        active_lines,
        active_includes,
        active_magic_flags,
        active_defines,
        updated_macros: env,
    }
}

fn define_index_for_directive(file: &FileAnalysis, directive_index: usize) -> Option<usize> {
    let directive = &file.directives[directive_index];
    file.defines
        .iter()
        .position(|d| d.line_num == directive.line_num && Some(&d.name) == directive.macro_name.as_ref())
}

fn directive_is_true(d: &Directive, env: &MacroEnv) -> bool {
    match d.kind {
        DirectiveKind::Ifdef => d.macro_name.as_deref().map(|n| env.is_defined(n)).unwrap_or(false),
        DirectiveKind::Ifndef => d.macro_name.as_deref().map(|n| !env.is_defined(n)).unwrap_or(true),
        DirectiveKind::If => evaluate_expression(d.condition.as_deref().unwrap_or(""), env),
        _ => false,
    }
}

static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"//.*$").unwrap());
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*.*?\*/").unwrap());
static DEFINED_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"defined\s*\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*\)").unwrap());
static DEFINED_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"defined\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());
static NUMERIC_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(0x[0-9a-f]+|0b[01]+|0[0-7]+|[0-9]+)(u|l|ul|lu|ull|llu)?\b").unwrap());

/// Maximum recursive macro-identifier substitution passes (§4.2.2), mirroring
/// `simple_preprocessor`'s bound against runaway or mutually-recursive
/// macro chains.
const MAX_SUBSTITUTION_PASSES: usize = 10;

/// Evaluate a `#if`/`#elif` condition expression against `env`. Any failure
/// (unparseable expression, division by zero, unresolved identifier left
/// over after substitution) makes the condition false rather than
/// propagating an error — `spec.md` §7 classifies this as the non-fatal
/// `ExpressionEvaluationFailed` kind, absorbed here and left to the caller
/// to log if it wants to.
pub fn evaluate_expression(expr: &str, env: &MacroEnv) -> bool {
    eval_inner(expr, env).unwrap_or(false)
}

fn eval_inner(expr: &str, env: &MacroEnv) -> Option<bool> {
    let stripped = strip_comments(expr);
    let expanded = expand_defined(&stripped, env);
    let substituted = substitute_macros(&expanded, env);
    let normalized = normalize_numeric_literals(&substituted);
    eval_arith(&normalized).map(|v| v != 0)
}

fn strip_comments(expr: &str) -> String {
    let no_block = BLOCK_COMMENT.replace_all(expr, " ");
    LINE_COMMENT.replace_all(&no_block, "").into_owned()
}

/// Replace `defined(X)` / `defined X` with `1`/`0` before any other macro
/// substitution runs, so that `X` itself is never mistaken for a macro to
/// expand.
fn expand_defined(expr: &str, env: &MacroEnv) -> String {
    let after_calls = DEFINED_CALL.replace_all(expr, |caps: &regex::Captures| {
        if env.is_defined(&caps[1]) { "1" } else { "0" }
    });
    DEFINED_BARE
        .replace_all(&after_calls, |caps: &regex::Captures| {
            if env.is_defined(&caps[1]) { "1" } else { "0" }
        })
        .into_owned()
}

/// Recursively substitute macro identifiers with their values, bounded at
/// [`MAX_SUBSTITUTION_PASSES`]. An identifier with no definition in `env`
/// is replaced with `0`, matching C's rule that an undefined identifier in
/// a preprocessor conditional evaluates to zero.
fn substitute_macros(expr: &str, env: &MacroEnv) -> String {
    let mut current = expr.to_string();
    for _ in 0..MAX_SUBSTITUTION_PASSES {
        let mut changed = false;
        let next = IDENTIFIER.replace_all(&current, |caps: &regex::Captures| {
            let name = &caps[0];
            changed = true;
            env.get(name).map(str::to_string).unwrap_or_else(|| "0".to_string())
        });
        let next = next.into_owned();
        if !changed || next == current {
            return next;
        }
        current = next;
    }
    current
}

/// Normalize hex (`0x…`), binary (`0b…`), and octal (`0…`) literals to
/// decimal, and strip trailing integer suffixes (`u`, `l`, `ul`, `ull`, …)
/// so the arithmetic evaluator only ever sees plain decimal integers.
fn normalize_numeric_literals(expr: &str) -> String {
    NUMERIC_LITERAL
        .replace_all(expr, |caps: &regex::Captures| {
            let digits = &caps[1];
            let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16).unwrap_or(0)
            } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
                i64::from_str_radix(bin, 2).unwrap_or(0)
            } else if digits.len() > 1 && digits.starts_with('0') {
                i64::from_str_radix(digits, 8).unwrap_or(0)
            } else {
                digits.parse().unwrap_or(0)
            };
            value.to_string()
        })
        .into_owned()
}

/// A small recursive-descent evaluator over the C-like operator subset
/// `spec.md` §4.2.2 requires: `||`, `&&`, bitwise `| ^ &`, equality
/// (`== !=`), relational (`< <= > >=`), shifts (`<< >>`), additive,
/// multiplicative, unary (`! - ~ +`), parentheses, and integer literals.
/// Operates on signed 64-bit integers; division and modulo by zero fail
/// the whole expression (propagated as `None`) rather than panicking.
struct ExprParser<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|\||&&|<<|>>|<=|>=|==|!=|[()!~+\-*/%<>|^&]|[0-9]+").unwrap());

fn tokenize(expr: &str) -> Vec<&str> {
    TOKEN.find_iter(expr).map(|m| m.as_str()).collect()
}

fn eval_arith(expr: &str) -> Option<i64> {
    let tokens = tokenize(expr);
    if tokens.is_empty() {
        return None;
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let value = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return None;
    }
    Some(value)
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<&'a str> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Option<i64> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some("||") {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = ((lhs != 0) || (rhs != 0)) as i64;
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<i64> {
        let mut lhs = self.parse_bitor()?;
        while self.peek() == Some("&&") {
            self.bump();
            let rhs = self.parse_bitor()?;
            lhs = ((lhs != 0) && (rhs != 0)) as i64;
        }
        Some(lhs)
    }

    fn parse_bitor(&mut self) -> Option<i64> {
        let mut lhs = self.parse_bitxor()?;
        while self.peek() == Some("|") {
            self.bump();
            lhs |= self.parse_bitxor()?;
        }
        Some(lhs)
    }

    fn parse_bitxor(&mut self) -> Option<i64> {
        let mut lhs = self.parse_bitand()?;
        while self.peek() == Some("^") {
            self.bump();
            lhs ^= self.parse_bitand()?;
        }
        Some(lhs)
    }

    fn parse_bitand(&mut self) -> Option<i64> {
        let mut lhs = self.parse_equality()?;
        while self.peek() == Some("&") {
            self.bump();
            lhs &= self.parse_equality()?;
        }
        Some(lhs)
    }

    fn parse_equality(&mut self) -> Option<i64> {
        let mut lhs = self.parse_relational()?;
        loop {
            match self.peek() {
                Some("==") => {
                    self.bump();
                    lhs = (lhs == self.parse_relational()?) as i64;
                }
                Some("!=") => {
                    self.bump();
                    lhs = (lhs != self.parse_relational()?) as i64;
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_relational(&mut self) -> Option<i64> {
        let mut lhs = self.parse_shift()?;
        loop {
            match self.peek() {
                Some("<") => {
                    self.bump();
                    lhs = (lhs < self.parse_shift()?) as i64;
                }
                Some("<=") => {
                    self.bump();
                    lhs = (lhs <= self.parse_shift()?) as i64;
                }
                Some(">") => {
                    self.bump();
                    lhs = (lhs > self.parse_shift()?) as i64;
                }
                Some(">=") => {
                    self.bump();
                    lhs = (lhs >= self.parse_shift()?) as i64;
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_shift(&mut self) -> Option<i64> {
        let mut lhs = self.parse_additive()?;
        loop {
            match self.peek() {
                Some("<<") => {
                    self.bump();
                    lhs <<= self.parse_additive()?;
                }
                Some(">>") => {
                    self.bump();
                    lhs >>= self.parse_additive()?;
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_additive(&mut self) -> Option<i64> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            match self.peek() {
                Some("+") => {
                    self.bump();
                    lhs += self.parse_multiplicative()?;
                }
                Some("-") => {
                    self.bump();
                    lhs -= self.parse_multiplicative()?;
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_multiplicative(&mut self) -> Option<i64> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek() {
                Some("*") => {
                    self.bump();
                    lhs *= self.parse_unary()?;
                }
                Some("/") => {
                    self.bump();
                    let rhs = self.parse_unary()?;
                    lhs = lhs.checked_div(rhs)?;
                }
                Some("%") => {
                    self.bump();
                    let rhs = self.parse_unary()?;
                    lhs = lhs.checked_rem(rhs)?;
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<i64> {
        match self.peek() {
            Some("!") => {
                self.bump();
                Some((self.parse_unary()? == 0) as i64)
            }
            Some("-") => {
                self.bump();
                Some(-self.parse_unary()?)
            }
            Some("+") => {
                self.bump();
                self.parse_unary()
            }
            Some("~") => {
                self.bump();
                Some(!self.parse_unary()?)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Option<i64> {
        match self.bump()? {
            "(" => {
                let value = self.parse_or()?;
                if self.bump() != Some(")") {
                    return None;
                }
                Some(value)
            }
            tok => tok.parse().ok(),
        }
    }
}

