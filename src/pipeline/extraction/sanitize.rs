use std::sync::LazyLock;

use regex::Regex;

/// Two-letter USPS codes for the 50 states plus DC.
pub const US_STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

/// Quote-like characters OCR tends to glue onto short uppercase tokens.
const STRAY_QUOTES: &str = r#"['‘’`"“”]"#;

static QUOTE_AFTER_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({}){}+",
        US_STATE_CODES.join("|"),
        STRAY_QUOTES
    ))
    .expect("valid regex")
});

static QUOTE_BEFORE_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{}+({})\b",
        STRAY_QUOTES,
        US_STATE_CODES.join("|")
    ))
    .expect("valid regex")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize raw OCR text before pattern matching.
///
/// Strips quote marks stuck to state codes (`FL'` → `FL`) and collapses
/// whitespace runs to a single space. Case is left alone.
pub fn normalize_label_text(raw: &str) -> String {
    let unquoted = QUOTE_AFTER_STATE.replace_all(raw, "${1}");
    let unquoted = QUOTE_BEFORE_STATE.replace_all(&unquoted, "${1}");
    collapse_whitespace(&unquoted)
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// Remove every whitespace character. Tracking numbers are often split across tokens.
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
