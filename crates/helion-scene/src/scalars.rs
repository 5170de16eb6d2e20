//! Strict scalar parsing for attribute values.
//!
//! Numeric attributes must be consumed in their entirety: surrounding
//! whitespace is tolerated, any other trailing characters are not.

/// Parse a float, rejecting trailing garbage.
pub fn parse_float(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

/// Parse a 64-bit integer, rejecting trailing garbage.
pub fn parse_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

/// Parse a boolean. Only the exact strings `true` and `false` are accepted.
pub fn parse_boolean(s: &str) -> Option<bool> {
    match s {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Split a whitespace-separated list into tokens.
pub fn tokenize(s: &str) -> Vec<&str> {
    s.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_accepts_surrounding_whitespace() {
        assert_eq!(parse_float(" 1.5 "), Some(1.5));
        assert_eq!(parse_float("-2"), Some(-2.0));
        assert_eq!(parse_float("1e-3"), Some(0.001));
    }

    #[test]
    fn test_float_rejects_trailing_garbage() {
        assert_eq!(parse_float("1.5x"), None);
        assert_eq!(parse_float("1.5 2.5"), None);
        assert_eq!(parse_float(""), None);
        assert_eq!(parse_float("  "), None);
    }

    #[test]
    fn test_integer_strictness() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer(" -7 "), Some(-7));
        assert_eq!(parse_integer("42.0"), None);
        assert_eq!(parse_integer("42abc"), None);
    }

    #[test]
    fn test_boolean_exact_match_only() {
        assert_eq!(parse_boolean("true"), Some(true));
        assert_eq!(parse_boolean("false"), Some(false));
        assert_eq!(parse_boolean("True"), None);
        assert_eq!(parse_boolean("TRUE"), None);
        assert_eq!(parse_boolean("1"), None);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("  0.5   1 2.0 "), vec!["0.5", "1", "2.0"]);
        assert!(tokenize("   ").is_empty());
    }
}
