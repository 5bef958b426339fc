//! Function name resolution against the user's source

use regex::Regex;
use tracing::debug;

use crate::harness::{generator, javascript};

/// Names that are never the function under test
const NON_CANDIDATES: &[&str] = &[
    "main", "Main", "if", "elif", "else", "for", "foreach", "while", "do", "switch", "case",
    "catch", "return", "new", "function", "sizeof", "typeof", "unless", "until", "using",
    "lock", "when", "match", "loop", "defer", "go", "select", "constructor", "init", "super",
    "this", "throw", "yield", "await",
];

/// Declaration pattern for a language id, including the sandboxed family
pub fn function_pattern(language: &str) -> Option<&'static str> {
    match language.to_ascii_lowercase().as_str() {
        "javascript" | "typescript" | "js" | "ts" => Some(javascript::FUNCTION_PATTERN),
        other => generator(other).map(|g| g.function_pattern()),
    }
}

/// Pick the function the harness should call for `language`
///
/// Languages without a known declaration pattern keep the requested name.
pub fn resolve_function_name(language: &str, source: &str, requested: &str) -> String {
    match function_pattern(language) {
        Some(pattern) => resolve_with_pattern(pattern, source, requested),
        None => requested.to_owned(),
    }
}

/// Resolve against an explicit declaration pattern
///
/// Declared names are collected with `pattern`; the first non-empty capture
/// group of each match is the name. If the requested name is declared it
/// wins, otherwise the first declared candidate does. With no candidates at
/// all the requested name is used unchanged.
pub(crate) fn resolve_with_pattern(pattern: &str, source: &str, requested: &str) -> String {
    let Ok(re) = Regex::new(pattern) else {
        return requested.to_owned();
    };

    let candidates: Vec<&str> = re
        .captures_iter(source)
        .filter_map(|caps| caps.iter().skip(1).flatten().next())
        .map(|m| m.as_str())
        .filter(|name| !NON_CANDIDATES.contains(name))
        .collect();

    if candidates.contains(&requested) {
        return requested.to_owned();
    }
    match candidates.first() {
        Some(first) => {
            debug!(requested, resolved = first, "function name substituted");
            (*first).to_owned()
        }
        None => requested.to_owned(),
    }
}
