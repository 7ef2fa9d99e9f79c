//! Allow-list gate for location targets.
//!
//! Targets are admitted by shell-style glob patterns: `*` matches any run of
//! characters (including `/`), `?` matches exactly one character, and
//! everything else is literal. An absent pattern list admits everything; a
//! present but empty list admits nothing.

use wildmatch::WildMatch;

/// Check whether `target` is admitted by `patterns`.
pub fn is_allowed(target: &str, patterns: Option<&[String]>) -> bool {
    match patterns {
        None => true,
        Some(patterns) => patterns.iter().any(|pattern| pattern_matches(pattern, target)),
    }
}

/// Match a single pattern. Blank patterns are malformed and match nothing.
fn pattern_matches(pattern: &str, target: &str) -> bool {
    if pattern.trim().is_empty() {
        return false;
    }

    WildMatch::new(pattern).matches(target)
}
