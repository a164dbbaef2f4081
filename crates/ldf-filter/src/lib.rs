//! Glob-based version include/exclude filter DSL.
//!
//! A filter is a comma-separated list of terms: `pattern` or `+pattern` adds
//! to the include set, `!pattern` adds to the exclude set. Glob syntax: `*`
//! matches any run (including empty), `?` matches exactly one character;
//! matching is case-insensitive. A version is included iff (the include set
//! is empty OR some include pattern matches) AND no exclude pattern matches.
//!
//! # Example
//!
//! ```
//! use ldf_filter::VersionFilter;
//!
//! let filter = VersionFilter::parse("6.*,!*-rc*");
//! assert!(filter.matches("6.12.1"));
//! assert!(!filter.matches("6.12.1-rc1"));
//! assert!(!filter.matches("5.15"));
//! ```

use serde::{Deserialize, Serialize};

/// A parsed version filter: an include set and an exclude set of glob patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Result of evaluating a filter against one version string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredVersion {
    pub version: String,
    pub included: bool,
    pub reason: String,
}

impl VersionFilter {
    /// Parse a comma-separated filter expression. The empty string is the
    /// accept-all identity filter.
    pub fn parse(expr: &str) -> Self {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for raw_term in expr.split(',') {
            let term = raw_term.trim();
            if term.is_empty() {
                continue;
            }
            if let Some(pattern) = term.strip_prefix('!') {
                if !pattern.is_empty() {
                    exclude.push(pattern.to_string());
                }
            } else if let Some(pattern) = term.strip_prefix('+') {
                if !pattern.is_empty() {
                    include.push(pattern.to_string());
                }
            } else {
                include.push(term.to_string());
            }
        }

        Self { include, exclude }
    }

    /// Whether this is the accept-all identity filter (`""`).
    pub fn is_identity(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// `true` iff `version` is included by this filter.
    pub fn matches(&self, version: &str) -> bool {
        self.evaluate(version).0
    }

    /// Evaluate every version, returning `{version, included, reason}` per input,
    /// in the same order they were given.
    pub fn filter_with_reasons(&self, versions: &[impl AsRef<str>]) -> Vec<FilteredVersion> {
        versions
            .iter()
            .map(|v| {
                let version = v.as_ref().to_string();
                let (included, reason) = self.evaluate(&version);
                FilteredVersion {
                    version,
                    included,
                    reason,
                }
            })
            .collect()
    }

    fn evaluate(&self, version: &str) -> (bool, String) {
        if let Some(pattern) = self.exclude.iter().find(|p| glob_match(p, version)) {
            return (false, format!("excluded by !{pattern}"));
        }

        if self.include.is_empty() {
            return (true, "no include pattern configured".to_string());
        }

        if let Some(pattern) = self.include.iter().find(|p| glob_match(p, version)) {
            return (true, format!("matches {pattern}"));
        }

        (false, "no include pattern matched".to_string())
    }
}

/// A fixed table of common filter presets, exposed to clients for UI presets.
pub const COMMON_FILTERS: &[(&str, &str)] = &[
    ("all", ""),
    ("stable-only", "!*-rc*,!*alpha*,!*beta*,!*-dev*,!*-pre*"),
    ("exclude-rc", "!*-rc*,!*.rc*,!*_rc*"),
    ("lts-only", "*"),
];

/// Look up a named preset from [`COMMON_FILTERS`].
pub fn common_filter(name: &str) -> Option<&'static str> {
    COMMON_FILTERS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, expr)| *expr)
}

/// Case-insensitive glob match. `*` matches any run including empty, `?`
/// matches exactly one character. Classic two-pointer wildcard matching
/// with backtracking, operating on bytes of the lowercased strings (glob
/// patterns here are always ASCII).
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let text = text.to_lowercase();
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star_idx, mut match_idx) = (None, 0usize);

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star_idx = Some(pi);
            match_idx = ti;
            pi += 1;
        } else if let Some(si) = star_idx {
            pi = si + 1;
            match_idx += 1;
            ti = match_idx;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }

    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scenario_1_from_spec() {
        let filter = VersionFilter::parse("6.*,!*-rc*");
        let result = filter.filter_with_reasons(&["6.12.1", "6.12.1-rc1", "5.15"]);

        assert_eq!(result[0], FilteredVersion {
            version: "6.12.1".into(),
            included: true,
            reason: "matches 6.*".into(),
        });
        assert_eq!(result[1], FilteredVersion {
            version: "6.12.1-rc1".into(),
            included: false,
            reason: "excluded by !*-rc*".into(),
        });
        assert_eq!(result[2], FilteredVersion {
            version: "5.15".into(),
            included: false,
            reason: "no include pattern matched".into(),
        });
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = VersionFilter::parse("");
        assert!(filter.is_identity());
        for v in ["1.0", "6.12-rc1", "anything-at-all"] {
            assert!(filter.matches(v));
        }
    }

    #[test]
    fn plus_prefix_is_include() {
        let filter = VersionFilter::parse("+6.*,+5.*");
        assert!(filter.matches("6.1"));
        assert!(filter.matches("5.9"));
        assert!(!filter.matches("4.0"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let filter = VersionFilter::parse("6.1?");
        assert!(filter.matches("6.12"));
        assert!(filter.matches("6.1a"));
        assert!(!filter.matches("6.1"));
        assert!(!filter.matches("6.123"));
    }

    #[test]
    fn case_insensitive() {
        let filter = VersionFilter::parse("*RC*");
        assert!(filter.matches("6.12-rc1"));
        assert!(filter.matches("6.12-RC1"));
    }

    #[test]
    fn exclude_strictly_narrows_identity() {
        let identity = VersionFilter::parse("");
        let excluding = VersionFilter::parse("!*-rc*");
        assert!(identity.matches("6.12-rc1"));
        assert!(!excluding.matches("6.12-rc1"));
        assert!(identity.matches("6.12"));
        assert!(excluding.matches("6.12"));
    }

    #[test]
    fn common_filters_lookup() {
        assert_eq!(common_filter("all"), Some(""));
        assert!(common_filter("stable-only").is_some());
        assert_eq!(common_filter("not-a-real-preset"), None);
    }

    proptest! {
        #[test]
        fn matches_agrees_with_filter_with_reasons(
            include in "[a-z0-9*?]{0,6}",
            exclude in "[a-z0-9*?]{0,6}",
            version in "[a-z0-9]{1,8}",
        ) {
            let expr = format!("{include},!{exclude}");
            let filter = VersionFilter::parse(&expr);
            let reasoned = filter.filter_with_reasons(&[version.clone()]);
            prop_assert_eq!(filter.matches(&version), reasoned[0].included);
        }

        #[test]
        fn empty_include_set_means_accept_all_unless_excluded(version in "[a-z0-9]{1,8}") {
            let filter = VersionFilter::parse("");
            prop_assert!(filter.matches(&version));
        }
    }
}
