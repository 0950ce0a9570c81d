//! Forbidden source patterns in checker code.
//!
//! Checkers must use the game's own HTTP helpers instead of the plain
//! `requests` library. A few quoted usages (imports for exception types,
//! session type hints, a log message) are tolerated and stripped before
//! the scan.

/// Occurrences removed from the source before scanning.
pub const ALLOWED_CHECKER_PATTERNS: &[&str] = &[
    "import requests",
    "requests.exceptions",
    "s: requests.Session",
    "sess: requests.Session",
    "session: requests.Session",
    "Got requests connection error",
];

/// Substrings that must not survive stripping.
pub const FORBIDDEN_CHECKER_PATTERNS: &[&str] = &["requests"];

/// Forbidden patterns still present in `source` once the allowed
/// occurrences are stripped, in table order.
pub fn forbidden_occurrences(source: &str) -> Vec<&'static str> {
    let stripped = ALLOWED_CHECKER_PATTERNS
        .iter()
        .fold(source.to_string(), |code, allowed| code.replace(allowed, ""));

    FORBIDDEN_CHECKER_PATTERNS
        .iter()
        .copied()
        .filter(|pattern| stripped.contains(pattern))
        .collect()
}
