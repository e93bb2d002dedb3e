//! The File Analyzer (`spec.md` §3.1, §4.1): a single-pass structural scan
//! of one file's bytes that locates directives, `#include`s, and magic-flag
//! comments. `analyze` is a pure function of its input bytes — content-hash
//! memoization and I/O live in [`crate::cache`], per the design note that
//! global mutable caches must be owned by the session rather than the
//! scanner itself.

use hashbrown::{HashMap, HashSet};
use once_cell::sync::Lazy;
use regex::Regex;

/// Recognized preprocessor directive kinds (`spec.md` §3.1). Anything else
/// following a line-initial `#` is left unrecorded; its line behaves like
/// ordinary text during evaluation (`spec.md` §4.2.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DirectiveKind {
    If,
    Ifdef,
    Ifndef,
    Elif,
    Else,
    Endif,
    Define,
    Undef,
    Include,
    Pragma,
    Error,
    Warning,
    Line,
}

impl DirectiveKind {
    fn parse(keyword: &str) -> Option<DirectiveKind> {
        Some(match keyword {
            "if" => DirectiveKind::If,
            "ifdef" => DirectiveKind::Ifdef,
            "ifndef" => DirectiveKind::Ifndef,
            "elif" => DirectiveKind::Elif,
            "else" => DirectiveKind::Else,
            "endif" => DirectiveKind::Endif,
            "define" => DirectiveKind::Define,
            "undef" => DirectiveKind::Undef,
            "include" => DirectiveKind::Include,
            "pragma" => DirectiveKind::Pragma,
            "error" => DirectiveKind::Error,
            "warning" => DirectiveKind::Warning,
            "line" => DirectiveKind::Line,
            _ => return None,
        })
    }
}

/// A recognized preprocessor directive (`spec.md` §3.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    pub line_num: usize,
    pub byte_pos: usize,
    pub kind: DirectiveKind,
    /// Number of `\`-continued lines joined onto this one; the directive
    /// logically occupies `1 + continuation_lines` source lines.
    pub continuation_lines: usize,
    /// `#if`/`#elif` condition text, and the raw trailing text of
    /// `#pragma`/`#error`/`#warning`/`#line` (spec.md leaves the latter
    /// unspecified beyond "recorded with whatever fields could be parsed";
    /// reusing this field avoids inventing a second free-text slot).
    pub condition: Option<String>,
    /// The identifier for `#ifdef`/`#ifndef`/`#undef`/`#define`.
    pub macro_name: Option<String>,
    /// The value text for `#define` (absent for a valueless `#define FOO`).
    pub macro_value: Option<String>,
}

/// `#include` occurrence (`spec.md` §3.1). Present even when commented out,
/// so downstream consumers can tell the two cases apart instead of having
/// the line silently vanish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeRef {
    pub line_num: usize,
    pub byte_pos: usize,
    pub filename: String,
    pub is_system: bool,
    pub is_commented: bool,
    pub full_line: String,
}

/// A `//#KEY=VALUE` magic-flag comment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MagicFlagRef {
    pub line_num: usize,
    pub byte_pos: usize,
    pub key: String,
    pub value: String,
}

/// A `#define` (the file's include guard, if any, is reported via
/// `FileAnalysis::include_guard` instead and excluded here).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefineRef {
    pub line_num: usize,
    pub byte_pos: usize,
    pub name: String,
    pub value: Option<String>,
    pub is_function_like: bool,
    pub params: Vec<String>,
}

/// Either a named `#ifndef`/`#define` guard or the `#pragma once` sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncludeGuard {
    Named(String),
    PragmaOnce,
}

/// The immutable, content-addressed result of analyzing one file
/// (`spec.md` §3.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileAnalysis {
    pub content_hash: String,
    pub line_count: usize,
    pub line_byte_offsets: Vec<usize>,
    pub directives: Vec<Directive>,
    /// `line_num -> index into directives`.
    pub directive_by_line: HashMap<usize, usize>,
    pub directive_positions: HashMap<DirectiveKind, Vec<usize>>,
    pub includes: Vec<IncludeRef>,
    pub magic_flags: Vec<MagicFlagRef>,
    pub defines: Vec<DefineRef>,
    pub system_headers: HashSet<String>,
    pub quoted_headers: HashSet<String>,
    pub include_guard: Option<IncludeGuard>,
    pub conditional_macros: HashSet<String>,
    pub was_truncated: bool,
}

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());
static MAGIC_FLAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)=(.*)$").unwrap());
static RESERVED_CONDITION_WORDS: &[&str] = &["and", "or", "not", "true", "false", "defined"];

/// Analyze `bytes` (already read under whatever strategy `spec.md` §4.1.1
/// selected, and already truncated to `max_read_size` if applicable).
/// Deterministic and pure: identical bytes always produce an
/// identical `FileAnalysis` aside from the caller-supplied `content_hash`
/// and `was_truncated` flag.
pub fn analyze(bytes: &[u8], content_hash: String, was_truncated: bool) -> FileAnalysis {
    let line_byte_offsets = scan_line_offsets(bytes);
    let comment_spans = scan_block_comment_spans(bytes);
    let includes = scan_includes(bytes, &line_byte_offsets, &comment_spans);
    let magic_flags = scan_magic_flags(bytes, &line_byte_offsets, &comment_spans);
    let (directives, directive_by_line, directive_positions, raw_defines) =
        scan_directives(bytes, &line_byte_offsets);

    let include_guard = detect_include_guard(&directives);
    let defines = filter_guard_define(raw_defines, &include_guard);
    let conditional_macros = extract_conditional_macros(&directives);

    let mut system_headers = HashSet::new();
    let mut quoted_headers = HashSet::new();
    for inc in &includes {
        if inc.is_commented {
            continue;
        }
        if inc.is_system {
            system_headers.insert(inc.filename.clone());
        } else {
            quoted_headers.insert(inc.filename.clone());
        }
    }

    FileAnalysis {
        content_hash,
        line_count: line_byte_offsets.len(),
        line_byte_offsets,
        directives,
        directive_by_line,
        directive_positions,
        includes,
        magic_flags,
        defines,
        system_headers,
        quoted_headers,
        include_guard,
        conditional_macros,
        was_truncated,
    }
}

/// Line `i` begins at `line_byte_offsets[i]`; a file with no trailing
/// newline still has its last (partial) line represented, and a file
/// ending exactly on a newline does not grow a phantom empty final line —
/// both fall out of only ever recording a start offset for a `\n` that is
/// followed by more bytes.
fn scan_line_offsets(bytes: &[u8]) -> Vec<usize> {
    let mut offsets = vec![0];
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' && i + 1 < bytes.len() {
            offsets.push(i + 1);
        }
    }
    offsets
}

fn line_of(offsets: &[usize], byte_pos: usize) -> usize {
    match offsets.binary_search(&byte_pos) {
        Ok(i) => i,
        Err(i) => i.saturating_sub(1),
    }
}

fn line_span(offsets: &[usize], bytes: &[u8], line_num: usize) -> (usize, usize) {
    let start = offsets[line_num];
    let end = offsets.get(line_num + 1).copied().unwrap_or(bytes.len());
    // exclude the trailing newline itself from the "line content" span
    let end = if end > start && bytes[end - 1] == b'\n' { end - 1 } else { end };
    (start, end)
}

/// Non-nested `/* ... */` spans, correctly ignoring comment openers that
/// appear inside a `//` line comment and vice versa. An unterminated block
/// comment extends to end of file.
fn scan_block_comment_spans(bytes: &[u8]) -> Vec<(usize, usize)> {
    #[derive(PartialEq)]
    enum State {
        Code,
        Line,
        Block(usize),
    }

    let mut spans = Vec::new();
    let mut state = State::Code;
    let mut i = 0;
    while i < bytes.len() {
        match state {
            State::Code => {
                if bytes[i..].starts_with(b"/*") {
                    state = State::Block(i);
                    i += 2;
                } else if bytes[i..].starts_with(b"//") {
                    state = State::Line;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            State::Line => {
                if bytes[i] == b'\n' {
                    state = State::Code;
                }
                i += 1;
            }
            State::Block(start) => {
                if bytes[i..].starts_with(b"*/") {
                    spans.push((start, i + 2));
                    state = State::Code;
                    i += 2;
                } else {
                    i += 1;
                }
            }
        }
    }
    if let State::Block(start) = state {
        spans.push((start, bytes.len()));
    }
    spans
}

fn in_block_comment(spans: &[(usize, usize)], pos: usize) -> bool {
    spans.iter().any(|&(start, end)| start <= pos && pos < end)
}

fn find_sub(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut start = 0;
    while let Some(rel) = find_sub(&haystack[start..], needle) {
        out.push(start + rel);
        start += rel + 1;
    }
    out
}

fn is_line_commented(bytes: &[u8], line_start: usize, pos: usize) -> bool {
    find_sub(&bytes[line_start..pos], b"//").is_some()
}

fn scan_includes(
    bytes: &[u8],
    offsets: &[usize],
    comment_spans: &[(usize, usize)],
) -> Vec<IncludeRef> {
    let mut out = Vec::new();
    for pos in find_all(bytes, b"#include") {
        let line_num = line_of(offsets, pos);
        let (line_start, line_end) = line_span(offsets, bytes, line_num);
        let full_line = String::from_utf8_lossy(&bytes[line_start..line_end]).into_owned();

        let rest = &bytes[pos + b"#include".len()..line_end];
        let rest_str = String::from_utf8_lossy(rest);
        let trimmed = rest_str.trim_start();

        let (filename, is_system) = if let Some(stripped) = trimmed.strip_prefix('<') {
            match stripped.find('>') {
                Some(end) => (stripped[..end].to_string(), true),
                None => continue,
            }
        } else if let Some(stripped) = trimmed.strip_prefix('"') {
            match stripped.find('"') {
                Some(end) => (stripped[..end].to_string(), false),
                None => continue,
            }
        } else {
            continue;
        };

        let is_commented =
            is_line_commented(bytes, line_start, pos) || in_block_comment(comment_spans, pos);

        out.push(IncludeRef {
            line_num,
            byte_pos: pos,
            filename,
            is_system,
            is_commented,
            full_line,
        });
    }
    out
}

fn scan_magic_flags(
    bytes: &[u8],
    offsets: &[usize],
    comment_spans: &[(usize, usize)],
) -> Vec<MagicFlagRef> {
    let mut out = Vec::new();
    for pos in find_all(bytes, b"//#") {
        let line_num = line_of(offsets, pos);
        let (line_start, line_end) = line_span(offsets, bytes, line_num);

        let prefix = &bytes[line_start..pos];
        if !prefix.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }
        if in_block_comment(comment_spans, pos) {
            continue;
        }

        let rest = String::from_utf8_lossy(&bytes[pos + 3..line_end]);
        if let Some(caps) = MAGIC_FLAG.captures(rest.trim_end()) {
            out.push(MagicFlagRef {
                line_num,
                byte_pos: pos,
                key: caps[1].to_string(),
                value: caps[2].to_string(),
            });
        }
    }
    out
}

/// `true` if `line`'s last non-whitespace byte is `\`, i.e. it continues
/// onto the next physical line.
fn continues(bytes: &[u8], offsets: &[usize], line_num: usize) -> bool {
    let (start, end) = line_span(offsets, bytes, line_num);
    let trimmed_end = bytes[start..end]
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| start + i + 1)
        .unwrap_or(start);
    trimmed_end > start && bytes[trimmed_end - 1] == b'\\'
}

/// Join a directive's physical lines (stripping each continuation's
/// trailing `\`) into one logical line of text, along with how many
/// continuation lines were consumed.
fn join_logical_line(bytes: &[u8], offsets: &[usize], first_line: usize) -> (String, usize) {
    let mut text = String::new();
    let mut line_num = first_line;
    let mut continuation_lines = 0;

    loop {
        let (start, end) = line_span(offsets, bytes, line_num);
        let mut line = &bytes[start..end];
        if line_num > first_line {
            let lead = line.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(line.len());
            line = &line[lead..];
        }
        let is_continued = continues(bytes, offsets, line_num);
        if is_continued {
            let backslash_at = line
                .iter()
                .rposition(|b| !b.is_ascii_whitespace())
                .unwrap_or(0);
            line = &line[..backslash_at];
            let content_end = line.iter().rposition(|b| !b.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(0);
            line = &line[..content_end];
        }
        text.push_str(&String::from_utf8_lossy(line));

        if !is_continued || line_num + 1 >= offsets.len() {
            break;
        }
        text.push(' ');
        line_num += 1;
        continuation_lines += 1;
    }

    (text, continuation_lines)
}

type ScanDirectivesResult = (
    Vec<Directive>,
    HashMap<usize, usize>,
    HashMap<DirectiveKind, Vec<usize>>,
    Vec<DefineRef>,
);

fn scan_directives(bytes: &[u8], offsets: &[usize]) -> ScanDirectivesResult {
    let mut directives = Vec::new();
    let mut directive_by_line = HashMap::new();
    let mut directive_positions: HashMap<DirectiveKind, Vec<usize>> = HashMap::new();
    let mut defines = Vec::new();

    let mut line_num = 0;
    while line_num < offsets.len() {
        let (start, end) = line_span(offsets, bytes, line_num);
        let line = &bytes[start..end];
        let first_non_ws = line.iter().position(|b| !b.is_ascii_whitespace());

        let hash_pos = match first_non_ws {
            Some(i) if line[i] == b'#' => start + i,
            _ => {
                line_num += 1;
                continue;
            }
        };

        let after_hash = &bytes[hash_pos + 1..end];
        let ws_skip = after_hash.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(after_hash.len());
        let keyword_start = hash_pos + 1 + ws_skip;
        let keyword_bytes = &bytes[keyword_start..end];
        let keyword_len = keyword_bytes
            .iter()
            .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
            .unwrap_or(keyword_bytes.len());
        let keyword = String::from_utf8_lossy(&keyword_bytes[..keyword_len]);

        let kind = match DirectiveKind::parse(&keyword) {
            Some(k) => k,
            None => {
                line_num += 1;
                continue;
            }
        };

        let (logical, continuation_lines) = join_logical_line(bytes, offsets, line_num);
        // `logical` still contains the leading "#keyword"; isolate the
        // remainder relative to the *joined* text, not per-line byte math.
        let keyword_end_in_logical = logical.find(&*keyword).map(|i| i + keyword.len()).unwrap_or(logical.len());
        let remainder = logical[keyword_end_in_logical..].trim();

        let (condition, macro_name, macro_value) = match kind {
            DirectiveKind::If | DirectiveKind::Elif => (Some(remainder.to_string()), None, None),
            DirectiveKind::Ifdef | DirectiveKind::Ifndef | DirectiveKind::Undef => {
                let name = IDENTIFIER.find(remainder).map(|m| m.as_str().to_string());
                (None, name, None)
            }
            DirectiveKind::Define => {
                let parsed = ParsedDefine::parse(remainder);
                let entry = (None, Some(parsed.name.clone()), parsed.value.clone());
                defines.push(DefineRef {
                    line_num,
                    byte_pos: hash_pos,
                    name: parsed.name,
                    value: parsed.value,
                    is_function_like: parsed.is_function_like,
                    params: parsed.params,
                });
                entry
            }
            DirectiveKind::Pragma | DirectiveKind::Error | DirectiveKind::Warning | DirectiveKind::Line => {
                (Some(remainder.to_string()), None, None)
            }
            DirectiveKind::Include | DirectiveKind::Else | DirectiveKind::Endif => (None, None, None),
        };

        let index = directives.len();
        directive_by_line.insert(line_num, index);
        directive_positions.entry(kind).or_insert_with(Vec::new).push(hash_pos);
        directives.push(Directive {
            line_num,
            byte_pos: hash_pos,
            kind,
            continuation_lines,
            condition,
            macro_name,
            macro_value,
        });

        line_num += 1 + continuation_lines;
    }

    (directives, directive_by_line, directive_positions, defines)
}

struct ParsedDefine {
    name: String,
    value: Option<String>,
    is_function_like: bool,
    params: Vec<String>,
}

impl ParsedDefine {
    /// Parse a `#define` remainder (the text after `define` and its
    /// whitespace) into name, value, and — for a function-like macro
    /// (`FOO(` with no space before the paren) — its parameter list.
    fn parse(remainder: &str) -> ParsedDefine {
        let remainder = remainder.trim_start();
        let name_end = remainder
            .find(|c: char| c == '(' || c.is_whitespace())
            .unwrap_or(remainder.len());
        let name = remainder[..name_end].to_string();

        if remainder[name_end..].starts_with('(') {
            match remainder[name_end..].find(')') {
                Some(close) => {
                    let close = name_end + close;
                    let params = remainder[name_end + 1..close]
                        .split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect();
                    let value = remainder[close + 1..].trim();
                    let value = if value.is_empty() { None } else { Some(value.to_string()) };
                    ParsedDefine { name, value, is_function_like: true, params }
                }
                None => ParsedDefine { name, value: None, is_function_like: true, params: Vec::new() },
            }
        } else {
            let value = remainder[name_end..].trim();
            let value = if value.is_empty() { None } else { Some(value.to_string()) };
            ParsedDefine { name, value, is_function_like: false, params: Vec::new() }
        }
    }
}

fn detect_include_guard(directives: &[Directive]) -> Option<IncludeGuard> {
    if directives.len() >= 2
        && directives[0].kind == DirectiveKind::Ifndef
        && directives[1].kind == DirectiveKind::Define
        && directives[0].macro_name.is_some()
        && directives[0].macro_name == directives[1].macro_name
    {
        return Some(IncludeGuard::Named(directives[0].macro_name.clone().unwrap()));
    }

    if directives.iter().any(|d| {
        d.kind == DirectiveKind::Pragma && d.condition.as_deref().map(str::trim) == Some("once")
    }) {
        return Some(IncludeGuard::PragmaOnce);
    }

    None
}

/// Drop the file's own include-guard `#define` (if any) from the reported
/// define list; everything else scan_directives already parsed stands.
fn filter_guard_define(mut defines: Vec<DefineRef>, guard: &Option<IncludeGuard>) -> Vec<DefineRef> {
    if let Some(IncludeGuard::Named(name)) = guard {
        defines.retain(|d| &d.name != name);
    }
    defines
}

fn extract_conditional_macros(directives: &[Directive]) -> HashSet<String> {
    let mut macros = HashSet::new();
    for d in directives {
        match d.kind {
            DirectiveKind::Ifdef | DirectiveKind::Ifndef => {
                if let Some(name) = &d.macro_name {
                    macros.insert(name.clone());
                }
            }
            DirectiveKind::If | DirectiveKind::Elif => {
                if let Some(cond) = &d.condition {
                    for m in IDENTIFIER.find_iter(cond) {
                        let word = m.as_str();
                        if !RESERVED_CONDITION_WORDS.contains(&word) {
                            macros.insert(word.to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    macros
}
