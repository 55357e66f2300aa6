use regex::Regex;
use std::sync::LazyLock;

use crate::error::{LinkError, LinkResult};

static SLUG_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// First path segments owned by the service itself
const RESERVED_SLUGS: &[&str] = &["api", "dashboard", "_docs", "health"];

/// Canonical form and validation of slugs
#[derive(Debug, Clone)]
pub struct SlugCodec {
    case_sensitive: bool,
    max_length: usize,
}

impl SlugCodec {
    pub fn new(case_sensitive: bool, max_length: usize) -> Self {
        Self {
            case_sensitive,
            max_length,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Validate `raw` and return the key used for store and cache access
    pub fn normalize(&self, raw: &str) -> LinkResult<String> {
        if raw.is_empty() {
            return Err(LinkError::InvalidSlug("slug must not be empty".to_string()));
        }
        if raw.len() > self.max_length {
            return Err(LinkError::InvalidSlug(format!(
                "slug must be at most {} characters",
                self.max_length
            )));
        }
        if !SLUG_CHARSET.is_match(raw) {
            return Err(LinkError::InvalidSlug(
                "slug may only contain letters, digits, '-' and '_'".to_string(),
            ));
        }

        let slug = if self.case_sensitive {
            raw.to_string()
        } else {
            raw.to_ascii_lowercase()
        };

        if RESERVED_SLUGS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(&slug))
        {
            return Err(LinkError::InvalidSlug(format!("slug '{slug}' is reserved")));
        }

        Ok(slug)
    }

    pub fn validate(&self, raw: &str) -> bool {
        self.normalize(raw).is_ok()
    }

    /// Regex source describing a valid slug, as handed to the AI prompt
    pub fn pattern(&self) -> String {
        format!("^[A-Za-z0-9_-]{{1,{}}}$", self.max_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lowercases() {
        let codec = SlugCodec::new(false, 16);
        assert_eq!(codec.normalize("Launch-2024").unwrap(), "launch-2024");
        assert_eq!(codec.normalize("ABC").unwrap(), codec.normalize("abc").unwrap());
    }

    #[test]
    fn test_case_sensitive_keeps_input() {
        let codec = SlugCodec::new(true, 16);
        assert_eq!(codec.normalize("ABC").unwrap(), "ABC");
        assert_ne!(codec.normalize("ABC").unwrap(), codec.normalize("abc").unwrap());
    }

    #[test]
    fn test_rejects_bad_input() {
        let codec = SlugCodec::new(false, 8);
        assert!(!codec.validate(""));
        assert!(!codec.validate("123456789"));
        assert!(!codec.validate("has space"));
        assert!(!codec.validate("slash/es"));
        assert!(!codec.validate("ünïcode"));
        assert!(codec.validate("a_b-c9"));
        assert!(codec.validate("12345678"));
    }

    #[test]
    fn test_reserved_slugs_rejected_in_any_case() {
        let codec = SlugCodec::new(true, 16);
        assert!(matches!(codec.normalize("api"), Err(LinkError::InvalidSlug(_))));
        assert!(matches!(codec.normalize("API"), Err(LinkError::InvalidSlug(_))));
        assert!(codec.validate("apis"));
    }

    #[test]
    fn test_pattern_matches_codec() {
        let codec = SlugCodec::new(false, 12);
        let pattern = Regex::new(&codec.pattern()).unwrap();
        assert!(pattern.is_match("my-slug_1"));
        assert!(!pattern.is_match("thirteen-char"));
        assert!(!pattern.is_match("no spaces"));
    }
}
