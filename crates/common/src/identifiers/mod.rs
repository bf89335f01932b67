//! Identifier normalization
//!
//! Every cache key that refers to an external work or DOI passes through
//! here first, so that `https://openalex.org/W1`, `openalex:W1` and `W1`
//! address the same row.

use regex_lite::Regex;
use std::sync::OnceLock;

/// Prefixes stripped from external identifiers, compared case-insensitively.
const KNOWN_PREFIXES: &[&str] = &[
    "https://api.openalex.org/works/",
    "http://api.openalex.org/works/",
    "https://openalex.org/",
    "http://openalex.org/",
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "openalex:",
    "doi:",
];

/// Canonicalize an external identifier.
///
/// Strips URL and scheme prefixes and surrounding whitespace. Returns `None`
/// for empty input. `normalize(normalize(x)) == normalize(x)` for all `x`.
pub fn normalize(id: &str) -> Option<String> {
    let mut current = id.trim();

    loop {
        let stripped = KNOWN_PREFIXES.iter().find_map(|prefix| {
            current
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| &current[prefix.len()..])
        });

        match stripped {
            Some(rest) => current = rest.trim(),
            None => break,
        }
    }

    if current.is_empty() {
        None
    } else {
        Some(current.to_string())
    }
}

/// Normalize an optional identifier, treating `None` like empty input.
pub fn normalize_opt(id: Option<&str>) -> Option<String> {
    id.and_then(normalize)
}

/// Canonical work id (`W123...`). Work ids are case-insensitive upstream;
/// the cache stores them uppercased.
pub fn normalize_work_id(id: &str) -> Option<String> {
    normalize(id).map(|id| id.to_ascii_uppercase())
}

/// Canonical DOI: prefix-free, lowercase, without trailing punctuation.
pub fn normalize_doi(doi: &str) -> Option<String> {
    let normalized = normalize(doi)?;
    let trimmed = normalized.trim_end_matches(|c: char| c == '.' || c == ',' || c == ';' || c.is_whitespace());

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year pattern is valid"))
}

/// First four-digit 19xx/20xx year found in a free-form date string.
pub fn extract_year(date: &str) -> Option<i32> {
    year_pattern()
        .find(date)
        .and_then(|m| m.as_str().parse().ok())
}
