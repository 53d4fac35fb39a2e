//! Lexical validation of addresses and the local/domain split.
//!
//! The checks are deliberately conservative: structural rules first (length
//! budgets, dot placement, label shape, alphabetic TLD), then a simplified
//! RFC 5322 regex as a final guard.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex pattern failed to compile")
});

/// Common domain misspellings and their canonical forms.
static TYPO_MAP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        // Gmail
        ("gmial.com", "gmail.com"),
        ("gmai.com", "gmail.com"),
        ("gmaill.com", "gmail.com"),
        ("gmail.co", "gmail.com"),
        ("gmail.cm", "gmail.com"),
        ("gamil.com", "gmail.com"),
        ("gnail.com", "gmail.com"),
        ("gmal.com", "gmail.com"),
        ("gmeil.com", "gmail.com"),
        ("gimail.com", "gmail.com"),
        // Yahoo
        ("yaho.com", "yahoo.com"),
        ("yahooo.com", "yahoo.com"),
        ("yhoo.com", "yahoo.com"),
        ("yahoo.co", "yahoo.com"),
        ("yahoo.cm", "yahoo.com"),
        ("yhaoo.com", "yahoo.com"),
        // Hotmail
        ("hotmal.com", "hotmail.com"),
        ("hotmial.com", "hotmail.com"),
        ("hotmail.co", "hotmail.com"),
        ("hotmail.cm", "hotmail.com"),
        ("hotmaill.com", "hotmail.com"),
        ("homail.com", "hotmail.com"),
        ("htmail.com", "hotmail.com"),
        // Outlook
        ("outlok.com", "outlook.com"),
        ("outloo.com", "outlook.com"),
        ("outlook.co", "outlook.com"),
        ("outllook.com", "outlook.com"),
        // iCloud
        ("iclod.com", "icloud.com"),
        ("icould.com", "icloud.com"),
        ("icloud.co", "icloud.com"),
        // Other
        ("protonmail.co", "protonmail.com"),
        ("aol.co", "aol.com"),
    ])
});

/// Canonicalizes an address: surrounding whitespace stripped, lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates address syntax and splits it into local and domain parts.
///
/// The input is normalized before analysis, so acceptance is invariant
/// under surrounding whitespace and letter case. Returns `None` when any
/// structural rule or the final regex guard fails.
pub fn validate_syntax(email: &str) -> Option<(String, String)> {
    let email = normalize_email(email);

    if email.is_empty() {
        debug!("empty email address");
        return None;
    }

    if email.len() > 254 {
        debug!(len = email.len(), "email too long");
        return None;
    }

    // Exactly one @
    if email.matches('@').count() != 1 {
        debug!("invalid @ count");
        return None;
    }

    let (local, domain) = email.split_once('@')?;

    // Local part
    if local.is_empty() || local.len() > 64 {
        return None;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return None;
    }

    // Domain part
    if domain.is_empty() || domain.len() > 253 {
        return None;
    }
    if !domain.contains('.') {
        return None;
    }
    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return None;
    }
    if domain.contains("..") {
        return None;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return None;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return None;
        }
    }

    // TLD: at least two characters, letters only
    let tld = labels.last()?;
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    // Final regex guard
    if !EMAIL_REGEX.is_match(&email) {
        debug!(email = %email, "failed regex validation");
        return None;
    }

    Some((local.to_string(), domain.to_string()))
}

/// Suggests a correction for a commonly misspelled domain.
///
/// Informational only: a suggestion never gates the verdict.
pub fn suggest_typo_fix(domain: &str) -> Option<&'static str> {
    TYPO_MAP.get(domain.to_lowercase().as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_simple_addresses() {
        let (local, domain) = validate_syntax("user@example.com").unwrap();
        assert_eq!(local, "user");
        assert_eq!(domain, "example.com");
    }

    #[test]
    fn accept_set_invariant_under_whitespace_and_case() {
        let canonical = validate_syntax("user@example.com");
        assert_eq!(validate_syntax("  User@Example.Com  "), canonical);
        assert_eq!(validate_syntax("\tUSER@EXAMPLE.COM\n"), canonical);
    }

    #[test]
    fn split_reassembles_to_canonical_form() {
        for input in ["  User@Example.Com  ", "a.b+c@sub.example.co.uk"] {
            let (local, domain) = validate_syntax(input).unwrap();
            assert_eq!(format!("{local}@{domain}"), normalize_email(input));
            assert!(!local.is_empty() && local.len() <= 64);
            assert!(domain.len() <= 253);
        }
    }

    #[test]
    fn rejects_structural_failures() {
        let invalid = [
            "",
            "invalid-email-no-at-sign",
            "two@@example.com",
            "a@b@example.com",
            "@example.com",
            "user@",
            ".user@example.com",
            "user.@example.com",
            "us..er@example.com",
            "user@nodot",
            "user@.example.com",
            "user@example.com.",
            "user@-example.com",
            "user@example.com-",
            "user@exa..mple.com",
            "user@example.c",
            "user@example.c0m",
            "user@example.123",
        ];
        for email in invalid {
            assert_eq!(validate_syntax(email), None, "accepted {email:?}");
        }
    }

    #[test]
    fn rejects_oversized_parts() {
        let long_local = format!("{}@example.com", "a".repeat(65));
        assert_eq!(validate_syntax(&long_local), None);

        let max_local = format!("{}@example.com", "a".repeat(64));
        assert!(validate_syntax(&max_local).is_some());

        let long_label = format!("user@{}.com", "a".repeat(64));
        assert_eq!(validate_syntax(&long_label), None);

        let long_total = format!("user@{}.example.com", "a.".repeat(130));
        assert_eq!(validate_syntax(&long_total), None);
    }

    #[test]
    fn typo_suggestions() {
        assert_eq!(suggest_typo_fix("gmial.com"), Some("gmail.com"));
        assert_eq!(suggest_typo_fix("GMAIL.CO"), Some("gmail.com"));
        assert_eq!(suggest_typo_fix("yaho.com"), Some("yahoo.com"));
        assert_eq!(suggest_typo_fix("example.com"), None);
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_email("  User@Example.Com  "), "user@example.com");
    }
}
