//! Token-overlap text helpers shared by inference, retrieval and prediction.

use std::collections::HashSet;
use std::hash::Hash;

/// Lower-cased, whitespace-split word set.
#[must_use]
pub fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard index `|a ∩ b| / |a ∪ b|`; 0.0 when both sets are empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Estimated tokens for `text`: characters divided by 4, rounded up.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Truncates to at most `max_chars` characters, marking the cut with `...`.
#[must_use]
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Returns the substring within `radius` characters either side of the byte
/// range `start..end`, respecting character boundaries.
#[must_use]
pub fn excerpt(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(start, |(i, _)| i);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| end + i);
    &text[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("", 0)]
    #[test_case("abcd", 1)]
    #[test_case("abcde", 2)]
    #[test_case("héllo wörld", 3)]
    fn test_estimate_tokens(text: &str, expected: usize) {
        assert_eq!(estimate_tokens(text), expected);
    }

    #[test]
    fn test_jaccard() {
        let a = word_set("Token Refresh flow");
        let b = word_set("token refresh");
        assert!((jaccard(&a, &b) - 2.0 / 3.0).abs() < 1e-9);
        assert!(jaccard(&word_set(""), &word_set("")).abs() < f64::EPSILON);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let long = "x".repeat(150);
        let cut = truncate(&long, 100);
        assert_eq!(cut.chars().count(), 100);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_excerpt_window() {
        let text = "0123456789see mem-abc here0123456789";
        let start = text.find("mem-abc").unwrap();
        let end = start + "mem-abc".len();
        assert_eq!(excerpt(text, start, end, 4), "see mem-abc her");
        assert_eq!(excerpt(text, 0, 4, 2), "012345");
    }
}
