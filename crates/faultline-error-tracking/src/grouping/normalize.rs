//! Message normalization for grouping.
//!
//! Variable fragments (ids, timestamps, addresses) are replaced with
//! placeholders so that recurrences of the same logical error collapse to
//! one normalized message. Replacement order matters: identifiers first,
//! then timestamps, then network addresses.

use std::sync::LazyLock;

use regex::Regex;

const MAX_MESSAGE_LEN: usize = 500;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("uuid regex")
});
static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-fA-F]{24,}\b").expect("hex regex"));
static NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{6,}").expect("num regex"));
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
        .expect("timestamp regex")
});
static IP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").expect("ip regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[\w.%+-]+@[\w.-]+\.[A-Za-z]{2,}\b").expect("email regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize a message for fingerprinting.
pub fn normalize_message(message: &str) -> String {
    let normalized = UUID_RE.replace_all(message, "<uuid>");
    let normalized = HEX_RE.replace_all(&normalized, "<id>");
    let normalized = NUM_RE.replace_all(&normalized, "<num>");
    let normalized = TIMESTAMP_RE.replace_all(&normalized, "<timestamp>");
    let normalized = IP_RE.replace_all(&normalized, "<ip>");
    let normalized = EMAIL_RE.replace_all(&normalized, "<email>");
    let normalized = WHITESPACE_RE.replace_all(&normalized, " ");

    normalized.trim().chars().take(MAX_MESSAGE_LEN).collect()
}
