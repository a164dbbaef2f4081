//! Version string normalization, prerelease detection and ordering.

use std::cmp::Ordering;

/// Strip a leading `v`/`V` prefix (`v6.12.1` -> `6.12.1`).
pub fn normalize(version: &str) -> &str {
    version.strip_prefix(['v', 'V']).unwrap_or(version)
}

const PRERELEASE_MARKERS: &[&str] = &[
    "-rc", ".rc", "_rc", "-alpha", "alpha", "-beta", "beta", "-dev", "-pre",
];

/// Case-insensitive substring match against the fixed prerelease marker set.
pub fn is_prerelease(version: &str) -> bool {
    let lower = version.to_lowercase();
    PRERELEASE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Splits a version into its leading dot-separated numeric run and a
/// trailing suffix (e.g. `6.12-rc1` -> (`[6, 12]`, `-rc1`)).
fn split_numeric_prefix(version: &str) -> (Vec<u64>, &str) {
    let mut parts = Vec::new();
    let mut rest = version;

    loop {
        let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits_len == 0 {
            break;
        }
        let (digits, tail) = rest.split_at(digits_len);
        parts.push(digits.parse().unwrap_or(0));
        rest = tail;
        if let Some(after_dot) = rest.strip_prefix('.') {
            let lookahead_digits = after_dot.chars().take_while(|c| c.is_ascii_digit()).count();
            if lookahead_digits == 0 {
                break;
            }
            rest = after_dot;
        } else {
            break;
        }
    }

    (parts, rest)
}

/// Compares two version strings by numeric dot-separated prefix, falling
/// back to lexicographic suffix comparison with empty-suffix-is-greater
/// (so a release like `6.12` sorts above its own `6.12-rc1`).
pub fn compare(a: &str, b: &str) -> Ordering {
    let (a_nums, a_suffix) = split_numeric_prefix(normalize(a));
    let (b_nums, b_suffix) = split_numeric_prefix(normalize(b));

    let len = a_nums.len().max(b_nums.len());
    for i in 0..len {
        let an = a_nums.get(i).copied().unwrap_or(0);
        let bn = b_nums.get(i).copied().unwrap_or(0);
        match an.cmp(&bn) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    match (a_suffix.is_empty(), b_suffix.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a_suffix.cmp(b_suffix),
    }
}

/// Sorts versions strictly descending (newest first) using [`compare`].
pub fn sort_descending(versions: &mut [String]) {
    versions.sort_by(|a, b| compare(a, b).reverse());
}

/// Fallback exclude expression used when a provider can't observe enough
/// live data to build one from prerelease tags.
pub const FALLBACK_EXCLUDE_FILTER: &str = "!*-rc*,!*alpha*,!*beta*,!*-dev*,!*-pre*";

/// Builds an exclude-pattern filter expression from a sample of observed
/// version strings, keeping only the markers actually seen.
pub fn extract_exclude_patterns(observed: &[String]) -> Option<String> {
    let mut patterns: Vec<&'static str> = Vec::new();
    let mut push_if_seen = |marker: &'static str, pattern: &'static str| {
        if observed
            .iter()
            .any(|v| v.to_lowercase().contains(marker) && !patterns.contains(&pattern))
        {
            patterns.push(pattern);
        }
    };

    push_if_seen("rc", "!*-rc*");
    push_if_seen("alpha", "!*alpha*");
    push_if_seen("beta", "!*beta*");
    push_if_seen("-dev", "!*-dev*");
    push_if_seen("-pre", "!*-pre*");

    if patterns.is_empty() {
        None
    } else {
        Some(patterns.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_leading_v() {
        assert_eq!(normalize("v6.12.1"), "6.12.1");
        assert_eq!(normalize("V6.12.1"), "6.12.1");
        assert_eq!(normalize("6.12.1"), "6.12.1");
    }

    #[test]
    fn prerelease_detection() {
        assert!(is_prerelease("6.12-rc1"));
        assert!(is_prerelease("6.12.rc1"));
        assert!(is_prerelease("6.12_rc1"));
        assert!(is_prerelease("1.0.0-alpha.1"));
        assert!(is_prerelease("1.0.0-beta"));
        assert!(is_prerelease("1.0.0-dev"));
        assert!(!is_prerelease("6.12"));
        assert!(!is_prerelease("1.0.0"));
    }

    #[test]
    fn release_sorts_above_its_own_rc() {
        assert_eq!(compare("6.12", "6.12-rc1"), Ordering::Greater);
    }

    #[test]
    fn numeric_prefix_compares_numerically_not_lexically() {
        assert_eq!(compare("6.9", "6.10"), Ordering::Less);
    }

    #[test]
    fn sort_descending_order() {
        let mut versions = vec![
            "6.12-rc1".to_string(),
            "6.9".to_string(),
            "6.12".to_string(),
            "6.10".to_string(),
        ];
        sort_descending(&mut versions);
        assert_eq!(versions, vec!["6.12", "6.12-rc1", "6.10", "6.9"]);
    }

    #[test]
    fn extract_patterns_only_includes_observed_markers() {
        let observed = vec!["6.12".to_string(), "6.13-rc1".to_string()];
        assert_eq!(
            extract_exclude_patterns(&observed),
            Some("!*-rc*".to_string())
        );
    }

    #[test]
    fn extract_patterns_none_when_nothing_observed() {
        let observed = vec!["6.12".to_string(), "6.13".to_string()];
        assert_eq!(extract_exclude_patterns(&observed), None);
    }
}
