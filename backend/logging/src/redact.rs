//! Log Redaction Layer
//!
//! Scrubs card numbers, e-mail addresses, phone numbers, API keys and bearer
//! tokens from customer text prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static CARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d[ -]?){12,15}\d\b").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static TELEPHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap());
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(sk-[a-zA-Z0-9_-]{20,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    // Keys first: an `sk-` key may contain digit runs the other patterns would split
    let mut redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]").to_string();

    redacted = CARD_RE.replace_all(&redacted, "[REDACTED_CARD]").to_string();
    redacted = EMAIL_RE.replace_all(&redacted, "[REDACTED_EMAIL]").to_string();
    redacted = TELEPHONE_RE.replace_all(&redacted, "[REDACTED_PHONE]").to_string();

    redacted
}
