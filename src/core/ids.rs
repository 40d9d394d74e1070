//! Record identifiers.
//!
//! Every record is keyed by a hyphenated UUID string. Identifiers coming from
//! clients are checked before they reach the store.

use once_cell::sync::Lazy;
use regex::Regex;

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// Generate a new record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Whether `value` is a well-formed identifier.
pub fn is_valid_id(value: &str) -> bool {
    ID_PATTERN.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_valid() {
        for _ in 0..16 {
            assert!(is_valid_id(&new_id()));
        }
    }

    #[test]
    fn test_accepts_uppercase() {
        assert!(is_valid_id("0F8FAD5B-D9CB-469F-A165-70867728950E"));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("42"));
        assert!(!is_valid_id("0f8fad5bd9cb469fa16570867728950e"));
        assert!(!is_valid_id("0f8fad5b-d9cb-469f-a165-70867728950e-extra"));
        assert!(!is_valid_id("zf8fad5b-d9cb-469f-a165-70867728950e"));
    }
}
