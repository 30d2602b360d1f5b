//! Shipping label fields: recipient, street, tracking, service, city/state/zip.

use std::sync::LazyLock;

use regex::Regex;

use super::profile::ExtractionProfile;
use super::rules::{first_match, rule, Rule};
use crate::pipeline::extraction::sanitize::{
    collapse_whitespace, normalize_label_text, strip_whitespace, US_STATE_CODES,
};
use crate::pipeline::extraction::types::LocationCandidate;

// ──────────────────────────────────────────────
// Recipient
// ──────────────────────────────────────────────

/// Two upper-case words anchored on a label cue. Case-sensitive: labels print
/// the recipient block in capitals, body text does not.
static RECIPIENT_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule("line_item_code", r"([A-Z]+\s+[A-Z]+)\s+X-\d+"),
        rule("ship_to", r"SHIP\s+TO[:\s]+([A-Z]+\s+[A-Z]+)"),
        // SHIP and TO split around the name by column layout
        rule("ship_split_to", r"SHIP\s+([A-Z]+\s+[A-Z]+)\s+TO[:\s]"),
        rule("before_po_box", r"([A-Z]{3,}\s+[A-Z]{3,})\s+PO\s+BOX"),
        rule("before_street_line", r"([A-Z]{3,}\s+[A-Z]{3,})\s+\d{3,5}\s+[A-Z]"),
    ]
});

pub fn extract_recipient(text: &str, profile: &ExtractionProfile) -> Option<String> {
    first_match("recipient", &RECIPIENT_RULES, text, |caps| {
        let name = collapse_whitespace(caps.get(1)?.as_str());
        (name.chars().count() >= profile.min_recipient_len && !profile.is_recipient_noise(&name))
            .then_some(name)
    })
}

// ──────────────────────────────────────────────
// Street address
// ──────────────────────────────────────────────

static PO_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPO\s+BOX\s+\d+").expect("valid regex"));

/// Street lines, most specific first.
static STREET_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    const SUFFIX: &str = r"(?:STREET|ST|AVENUE|AVE|BOULEVARD|BLVD|DRIVE|DR|COURT|CT|LANE|LN|ROAD|RD)";
    vec![
        // 120 W 45TH ST
        rule(
            "directional_ordinal",
            &format!(r"(?i)\b(\d{{3,5}}\s+[A-Z]{{1,3}}\s+\d+(?:ST|ND|RD|TH)\s+{SUFFIX})\b"),
        ),
        // 4410 N MAIN ST
        rule(
            "directional_named",
            &format!(r"(?i)\b(\d{{3,5}}\s+[A-Z]\s+[A-Z]+\s+{SUFFIX})\b"),
        ),
        // 4410 N OCEAN SHORE
        rule(
            "directional_multi_word",
            r"(?i)\b(\d{3,5}\s+[A-Z]\s+[A-Z]+\s+[A-Z]+)\b",
        ),
        // 123 MAIN ST APT 4B
        rule(
            "named_with_suffix",
            &format!(r"(?i)\b(\d{{3,5}}\s+[A-Z]+\s+{SUFFIX}(?:\s+APT\s+[A-Z0-9]+)?)\b"),
        ),
    ]
});

/// Recipient street line, upper-cased. A PO box always wins.
pub fn extract_address(text: &str, profile: &ExtractionProfile) -> Option<String> {
    if let Some(po) = PO_BOX.find(text) {
        return Some(collapse_whitespace(po.as_str()).to_uppercase());
    }

    first_match("street_address", &STREET_RULES, text, |caps| {
        let address = collapse_whitespace(caps.get(1)?.as_str()).to_uppercase();
        (!profile.is_sender_address(&address)).then_some(address)
    })
}

// ──────────────────────────────────────────────
// Tracking number
// ──────────────────────────────────────────────

static TRACKING_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule("UPS", r"1Z[A-Z0-9]{16}"),
        rule("USPS", r"(?:94|93|92|95)\d{18,20}"),
    ]
});

/// Tracking number and its carrier tag, searched with all whitespace removed.
pub fn extract_tracking(text: &str) -> Option<(String, &'static str)> {
    let compact = strip_whitespace(text);
    TRACKING_RULES
        .iter()
        .find_map(|r| r.regex.find(&compact).map(|m| (m.as_str().to_string(), r.name)))
}

static CARRIER_FORMATS: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule("UPS", r"^1Z[A-Z0-9]{16}$"),
        rule("USPS", r"^(?:94|93|92|95|82)\d{20,22}$"),
        rule("FedEx", r"^\d{12,14}$"),
        rule("DHL", r"^\d{10,11}$"),
        rule("Amazon Logistics", r"^TBA\d{12}$"),
    ]
});

/// Carrier implied by the format of a bare tracking number.
pub fn detect_carrier(tracking: &str) -> Option<&'static str> {
    let cleaned = strip_whitespace(tracking).to_uppercase();
    if cleaned.is_empty() {
        return None;
    }
    Some(
        CARRIER_FORMATS
            .iter()
            .find(|r| r.regex.is_match(&cleaned))
            .map_or("Unknown", |r| r.name),
    )
}

// ──────────────────────────────────────────────
// Shipping service
// ──────────────────────────────────────────────

static SERVICE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule("UPS Ground", r"(?i)UPS\s+GROUND"),
        rule("USPS Ground Advantage", r"(?i)USPS\s+GROUND\s+ADVANTAGE"),
        rule("USPS Priority Mail", r"(?i)PRIORITY\s+MAIL"),
    ]
});

pub fn extract_shipping_service(text: &str) -> Option<String> {
    SERVICE_RULES
        .iter()
        .find(|r| r.regex.is_match(text))
        .map(|r| r.name.to_string())
}

// ──────────────────────────────────────────────
// City / state / zip
// ──────────────────────────────────────────────

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b([A-Z]{{3,}})\s+({})\s+(\d{{5}}(?:-\d{{4}})?)\b",
        US_STATE_CODES.join("|")
    ))
    .expect("valid regex")
});

/// Every `CITY ST 12345` triple in reading order, noise cities dropped.
pub fn location_candidates(text: &str, profile: &ExtractionProfile) -> Vec<LocationCandidate> {
    let text = normalize_label_text(text);
    LOCATION
        .captures_iter(&text)
        .filter(|caps| !profile.is_city_noise(&caps[1]))
        .map(|caps| LocationCandidate {
            city: caps[1].to_string(),
            state: caps[2].to_string(),
            zip: caps[3].to_string(),
        })
        .collect()
}

/// Destination city/state/zip.
///
/// The first candidate outside the origin state wins. If every candidate is
/// in the origin state, the last one is taken: labels print the sender block
/// before the recipient block.
pub fn extract_location(text: &str, profile: &ExtractionProfile) -> Option<LocationCandidate> {
    let mut candidates = location_candidates(text, profile);
    match candidates
        .iter()
        .position(|c| c.state != profile.origin_state)
    {
        Some(idx) => Some(candidates.swap_remove(idx)),
        None => candidates.pop(),
    }
}
