use subtle::ConstantTimeEq;

/// Constant-time string comparison to prevent timing attacks
/// Use this for comparing API keys and other sensitive values
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check a presented API key against the configured one.
///
/// With no key configured every request is allowed; with one configured the
/// request must present exactly that key.
pub fn api_key_matches(expected: Option<&str>, presented: Option<&str>) -> bool {
    match (expected, presented) {
        (None, _) => true,
        (Some(expected), Some(presented)) => constant_time_compare(expected, presented),
        (Some(_), None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret123", "secret123"));
        assert!(!constant_time_compare("secret123", "secret124"));
        assert!(!constant_time_compare("secret123", "secret12"));
        assert!(!constant_time_compare("", "secret"));
    }

    #[test]
    fn test_api_key_matches() {
        assert!(api_key_matches(None, None));
        assert!(api_key_matches(None, Some("anything")));
        assert!(api_key_matches(Some("secret"), Some("secret")));
        assert!(!api_key_matches(Some("secret"), Some("wrong")));
        assert!(!api_key_matches(Some("secret"), None));
    }
}
