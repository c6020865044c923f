/// Checks if a host matches a domain scope pattern
///
/// Two pattern forms are supported:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches the bare domain and any
///    subdomain at any depth
///
/// Comparison is case-insensitive.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "Example.com"));
/// assert!(!matches_wildcard("example.com", "blog.example.com"));
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Returns true if the host matches any of the patterns
///
/// An empty pattern list places no restriction on the host.
pub fn matches_any(patterns: &[String], candidate: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| matches_wildcard(p, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "other.com"));
        assert!(!matches_wildcard("blog.example.com", "example.com"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches_wildcard("Example.COM", "example.com"));
        assert!(matches_wildcard("*.EXAMPLE.com", "Docs.Example.Com"));
    }

    #[test]
    fn test_wildcard_matches_bare_and_nested() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "blog.example.com"));
        assert!(matches_wildcard("*.example.com", "deep.nested.sub.example.com"));
    }

    #[test]
    fn test_wildcard_rejects_lookalikes() {
        assert!(!matches_wildcard("*.example.com", "myexample.com"));
        assert!(!matches_wildcard("*.example.com", "example.com.org"));
        assert!(!matches_wildcard("*.example.com", ""));
    }

    #[test]
    fn test_matches_any_empty_is_unrestricted() {
        assert!(matches_any(&[], "anything.org"));
    }

    #[test]
    fn test_matches_any() {
        let scope = vec!["docs.rs".to_string(), "*.rust-lang.org".to_string()];
        assert!(matches_any(&scope, "docs.rs"));
        assert!(matches_any(&scope, "blog.rust-lang.org"));
        assert!(!matches_any(&scope, "crates.io"));
    }
}
