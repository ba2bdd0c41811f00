//! Domain normalization and wildcard matching for §4.E's domain
//! authorization checks.

/// Lowercase, strip `http://`/`https://`, strip a trailing `/`.
pub fn normalize(domain: &str) -> String {
    let lower = domain.to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    without_scheme.strip_suffix('/').unwrap_or(without_scheme).to_string()
}

/// `*` matches anything; `*.suffix` matches `suffix` exactly and anything
/// ending in `.suffix`; anything else is an exact match against the
/// normalized candidate.
pub fn matches(pattern: &str, candidate: &str) -> bool {
    let candidate = normalize(candidate);
    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix("*.") {
        return candidate == suffix || candidate.ends_with(&format!(".{suffix}"));
    }
    normalize(pattern) == candidate
}

/// An exact-match set plus an ordered list of wildcard patterns, per the
/// spec's "two structures" design note: lookup is a set hit, else a linear
/// scan of the wildcard patterns.
pub struct WildcardDomainSet {
    exact: std::collections::HashSet<String>,
    wildcards: Vec<String>,
}

impl WildcardDomainSet {
    pub fn from_patterns(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut exact = std::collections::HashSet::new();
        let mut wildcards = Vec::new();
        for pattern in patterns {
            let pattern = pattern.into();
            if pattern.contains('*') {
                wildcards.push(pattern);
            } else {
                exact.insert(normalize(&pattern));
            }
        }
        Self { exact, wildcards }
    }

    pub fn contains(&self, candidate: &str) -> bool {
        let normalized = normalize(candidate);
        if self.exact.contains(&normalized) {
            return true;
        }
        self.wildcards.iter().any(|pattern| matches(pattern, &normalized))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn normalize_strips_scheme_and_trailing_slash_and_case() {
        assert_eq!(normalize("HTTPS://Example.com/"), "example.com");
        assert_eq!(normalize("example.com"), "example.com");
    }

    #[test]
    fn wildcard_suffix_matches_subdomains_not_lookalikes() {
        assert!(matches("*.example.com", "example.com"));
        assert!(matches("*.example.com", "api.example.com"));
        assert!(!matches("*.example.com", "evilexample.com"));
    }

    #[test]
    fn star_matches_anything() {
        assert!(matches("*", "anything.at.all"));
    }

    #[test]
    fn wildcard_set_checks_exact_then_patterns() {
        let set = WildcardDomainSet::from_patterns(["*.example.com", "other.org"]);
        assert!(set.contains("api.example.com"));
        assert!(set.contains("other.org"));
        assert!(!set.contains("evilexample.com"));
    }
}
