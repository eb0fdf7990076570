//! Named text transformations applied to captured tool output.
//!
//! Every truncation in fixlog goes through [`bounded`] so the caps are
//! explicit: output snippets are capped at [`SNIPPET_MAX_CHARS`], pattern
//! signatures at [`SIGNATURE_MAX_CHARS`], extracted path sets at
//! [`MAX_EXTRACTED`] entries.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

pub const SNIPPET_MAX_CHARS: usize = 500;
pub const SIGNATURE_MAX_CHARS: usize = 200;
pub const MAX_EXTRACTED: usize = 10;

const ERROR_MARKERS: &[&str] = &[
    "error",
    "exception",
    "failed",
    "fatal",
    "panic",
    "cannot",
    "denied",
    "not found",
];

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'[^'\n]*'|"[^"\n]*"|`[^`\n]*`"#).expect("quoted literal regex")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static FILE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:[A-Za-z]:)?(?:[\w.@-]+/)*[\w@-][\w.@-]*\.(?:tsx|ts|jsx|js|mjs|cjs|py|rs|go|java|kt|rb|php|cs|cpp|cc|hpp|h|c|swift|vue|svelte|json|toml|ya?ml|css|scss|html|sql|sh)\b",
    )
    .expect("file path regex")
});

static STACK_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:[\w.@-]+/)*[\w@-][\w.@-]*\.[A-Za-z]{1,6}):(\d+)(?::\d+)?")
        .expect("stack location regex")
});

/// Char-boundary-safe prefix of at most `max_chars` characters.
pub fn bounded(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Char-boundary-safe suffix of at most `max_chars` characters.
fn bounded_tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}

/// Pick the most informative slice of tool output: everything from the
/// first line that looks like an error, or the tail of the output when no
/// line does.
pub fn error_excerpt(output: &str, max_chars: usize) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    let start = lines.iter().position(|line| {
        let lowered = line.to_lowercase();
        ERROR_MARKERS.iter().any(|marker| lowered.contains(marker))
    });

    match start {
        Some(idx) => bounded(lines[idx..].join("\n").trim(), max_chars),
        None => bounded_tail(trimmed, max_chars).trim().to_string(),
    }
}

/// Whitespace-normalized command text. Two commands correlate only when
/// their normalized forms are equal.
pub fn normalize_command(command: &str) -> String {
    WHITESPACE_RE.replace_all(command.trim(), " ").into_owned()
}

/// Grouping key for the pattern analyzer: quoted literals collapse to
/// `<str>`, digits are dropped, whitespace collapses.
pub fn normalize_signature(snippet: &str) -> String {
    let collapsed = QUOTED_RE.replace_all(snippet, "<str>");
    let without_digits: String = collapsed
        .to_lowercase()
        .chars()
        .filter(|ch| !ch.is_ascii_digit())
        .collect();
    let squeezed = WHITESPACE_RE.replace_all(without_digits.trim(), " ");
    bounded(&squeezed, SIGNATURE_MAX_CHARS)
}

pub fn extract_file_paths(text: &str) -> BTreeSet<String> {
    FILE_PATH_RE
        .find_iter(text)
        .map(|found| found.as_str().trim_start_matches("./").to_string())
        .filter(|path| !path.starts_with("//"))
        .take(MAX_EXTRACTED)
        .collect()
}

pub fn extract_stack_locations(text: &str) -> BTreeSet<String> {
    STACK_LOCATION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let file = caps.get(1)?.as_str().trim_start_matches("./");
            let line = caps.get(2)?.as_str();
            Some(format!("{file}:{line}"))
        })
        .take(MAX_EXTRACTED)
        .collect()
}
