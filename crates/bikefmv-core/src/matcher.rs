//! Fuzzy model-name matching.
//!
//! Listing titles and stored model names rarely agree on trim suffixes
//! ("Stumpjumper Comp Carbon" vs "Stumpjumper Expert"), so lookups search by
//! the stable leading tokens of a model name instead of the full string. The
//! output patterns are SQL `LIKE` "contains" patterns (`%token%`) that the
//! store adapter treats as opaque strings.

use std::sync::LazyLock;

use regex::Regex;

static YEAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year regex"));

/// Trim/variant words and drivetrain group codes that do not identify a model.
static STOP_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(cf|al|sl|slx|s-works|expert|comp|pro|race|rc|factory|team|ultimate|select|r|rs|gx|sx|nx)\b",
    )
    .expect("valid stop-word regex")
});

/// Upper bound on patterns produced for one model.
pub const MAX_PATTERNS: usize = 3;

/// Patterns shorter than this are too unselective to be useful.
const MIN_PATTERN_LEN: usize = 2;

/// Lowercases, drops apostrophes, replaces punctuation (except hyphens) with
/// spaces, and collapses whitespace.
#[must_use]
pub fn normalize_text(value: &str) -> String {
    let mapped: String = value
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}'))
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&mapped)
}

/// Normalizes a model name and strips year tokens and trim/variant words.
#[must_use]
pub fn sanitize_model(model: &str) -> String {
    let cleaned = normalize_text(model);
    let cleaned = YEAR_TOKEN.replace_all(&cleaned, " ");
    let cleaned = STOP_WORDS.replace_all(&cleaned, " ");
    collapse_whitespace(&cleaned)
}

/// Builds up to [`MAX_PATTERNS`] `%contains%` patterns for a model name:
/// the first two tokens, the first token, and the full cleaned name, in that
/// order and without repeats.
///
/// Empty or whitespace-only input (or input made only of stop words) yields
/// an empty list.
#[must_use]
pub fn build_model_patterns(model: &str) -> Vec<String> {
    let cleaned = sanitize_model(model);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let tokens: Vec<&str> = cleaned.split(' ').filter(|t| !t.is_empty()).collect();
    let mut candidates: Vec<String> = Vec::with_capacity(MAX_PATTERNS);
    if tokens.len() >= 2 {
        candidates.push(tokens[..2].join(" "));
    }
    if let Some(first) = tokens.first() {
        candidates.push((*first).to_string());
    }
    candidates.push(cleaned.clone());

    let mut patterns: Vec<String> = Vec::with_capacity(MAX_PATTERNS);
    for candidate in candidates {
        if candidate.chars().count() < MIN_PATTERN_LEN {
            continue;
        }
        let pattern = format!("%{candidate}%");
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }
    patterns
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
