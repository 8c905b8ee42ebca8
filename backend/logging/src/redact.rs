//! Scrubs contact details and credentials from strings before logging.
//!
//! Detector input is user text; it only ever reaches a log line through
//! [`redact_sensitive_data`].

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.+%-]+@[\w-]+(?:\.[\w-]+)+").unwrap());
static TELEPHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\(?\d[\d\s().-]{6,}\d").unwrap());
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9]{32,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    // Tokens first: a bearer token may contain digit runs.
    let redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]");
    let redacted = EMAIL_RE.replace_all(&redacted, "[REDACTED_EMAIL]");
    TELEPHONE_RE
        .replace_all(&redacted, "[REDACTED_PHONE]")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_contacts_and_tokens() {
        let raw = "call me 721 481 142 or +1-555-123-4567, mail jan.novak@example.cz, Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("721 481 142"));
        assert!(!clean.contains("555-123-4567"));
        assert!(!clean.contains("jan.novak@example.cz"));
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
        assert!(clean.starts_with("call me [REDACTED_PHONE]"));
    }

    #[test]
    fn short_numbers_survive() {
        assert_eq!(redact_sensitive_data("room 112 at 9:30"), "room 112 at 9:30");
    }
}
