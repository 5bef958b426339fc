//! Test harness generation
//!
//! A harness is driver source appended to the user's program. It calls the
//! user's function once per test case, compares the canonical JSON of the
//! actual and expected values, and prints a JSON array of results between
//! [`RESULTS_START_MARKER`] and [`RESULTS_END_MARKER`].
//!
//! Every supported language implements [`HarnessGenerator`]; generators are
//! looked up by language id through [`generator`]. JavaScript and TypeScript
//! run their harness inside the sandbox instead, see [`javascript`].

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::harness::resolve::resolve_with_pattern;
pub use crate::harness::resolve::{function_pattern, resolve_function_name};
use crate::literal::canonical_json;
pub use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

pub mod javascript;
pub mod languages;
mod resolve;

/// Code generation for one target language
pub trait HarnessGenerator: Send + Sync {
    /// Language id this generator is registered under
    fn id(&self) -> &'static str;

    /// Render a JSON value as a literal expression in this language
    fn encode_literal(&self, value: &Value) -> String;

    /// Regex whose first matching capture group is a declared function name
    fn function_pattern(&self) -> &'static str;

    /// Build the full driver program for an already resolved function name
    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String;
}

static GENERATORS: &[&dyn HarnessGenerator] = &[
    &languages::Python,
    &languages::Ruby,
    &languages::Php,
    &languages::R,
    &languages::Go,
    &languages::Rust,
    &languages::Cpp,
    &languages::Java,
    &languages::Kotlin,
    &languages::CSharp,
    &languages::Swift,
    &languages::Dart,
];

/// Look up the generator for a language id
pub fn generator(language: &str) -> Option<&'static dyn HarnessGenerator> {
    let language = language.to_ascii_lowercase();
    let id = match language.as_str() {
        "python3" | "py" => "python",
        "c++" | "cplusplus" => "cpp",
        "c#" | "cs" => "csharp",
        "golang" => "go",
        "rs" => "rust",
        "kt" => "kotlin",
        "rscript" => "r",
        other => other,
    };
    GENERATORS.iter().copied().find(|g| g.id() == id)
}

/// Ids of every language with a generator
pub fn supported_languages() -> Vec<&'static str> {
    GENERATORS.iter().map(|g| g.id()).collect()
}

/// Render a JSON value as a literal in the given language
pub fn encode(language: &str, value: &Value) -> Option<String> {
    generator(language).map(|g| g.encode_literal(value))
}

/// Generate a driver program for `language`
///
/// The function name is resolved against the source first, so a mismatch
/// between the declared metadata and what the user wrote does not break the
/// call. Returns `None` when the language has no generator.
pub fn generate_harness(
    language: &str,
    source: &str,
    function_name: &str,
    cases: &[TestCase],
) -> Option<String> {
    let generator = generator(language)?;
    let resolved = resolve_with_pattern(generator.function_pattern(), source, function_name);
    debug!(
        language = generator.id(),
        requested = function_name,
        resolved,
        cases = cases.len(),
        "generating harness"
    );
    Some(generator.generate(source, &resolved, cases))
}

/// Per-case data every generator needs, pre-rendered as JSON text
#[derive(Debug, Clone)]
pub(crate) struct PreparedCase {
    /// The case name as a JSON string (quotes included)
    pub name_json: String,
    /// Canonical JSON of the expected value
    pub expected_json: String,
    /// Argument literals in the target language
    pub args: Vec<String>,
}

pub(crate) fn prepare_cases(
    generator: &dyn HarnessGenerator,
    cases: &[TestCase],
) -> Vec<PreparedCase> {
    cases
        .iter()
        .map(|case| PreparedCase {
            name_json: Value::String(case.name.clone()).to_string(),
            expected_json: canonical_json(&case.expected),
            args: case
                .input
                .iter()
                .map(|v| generator.encode_literal(v))
                .collect(),
        })
        .collect()
}

/// String literal for `s` in the generator's language
pub(crate) fn string_literal(generator: &dyn HarnessGenerator, s: &str) -> String {
    generator.encode_literal(&Value::String(s.to_owned()))
}

static TYPE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:class|struct|object)\s+([A-Za-z_]\w*)")
        .expect("type declaration pattern should compile")
});

static CLASS_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bclass\s+([A-Za-z_]\w*)").expect("class declaration pattern should compile")
});

/// Whether the source declares a class or struct with this name
pub(crate) fn declares_type(source: &str, name: &str) -> bool {
    TYPE_DECLARATION
        .captures_iter(source)
        .any(|c| c.get(1).is_some_and(|m| m.as_str() == name))
}

/// Name of the first class declared in the source
pub(crate) fn first_class_name(source: &str) -> Option<String> {
    CLASS_DECLARATION
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Rename a user entry point so the driver can declare its own
///
/// `pattern` must have two capture groups surrounding the entry point name.
pub(crate) fn rename_entry_point(source: &str, pattern: &str, replacement: &str) -> String {
    match Regex::new(pattern) {
        Ok(re) => re
            .replace_all(source, format!("${{1}}{replacement}${{2}}").as_str())
            .into_owned(),
        Err(_) => source.to_owned(),
    }
}
