//! Device sticker fields: IMEI, serial, model, storage, color, carrier lock.

use std::sync::LazyLock;

use regex::Regex;

use super::rules::{first_group, first_match, rule, Rule};
use crate::pipeline::extraction::sanitize::{collapse_whitespace, strip_whitespace};

// ──────────────────────────────────────────────
// IMEI
// ──────────────────────────────────────────────

const IMEI_LEN: usize = 15;

/// Labeled forms, most specific first.
static IMEI_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule("labeled", r"(?i)IMEI[:\s]+([0-9]{15})"),
        // Small stickers print the value flush against the label.
        rule("labeled_tight", r"(?i)IMEI:([0-9]{15})"),
        // Trailing I read as 1 or L.
        rule("misread_label", r"(?i)IME[I1L][:\s]*([0-9]{15})"),
    ]
});

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid regex"));

/// Extract a 15-digit IMEI.
///
/// Unlabeled runs are only accepted when they are exactly 15 digits long
/// (no digit on either side, whitespace ignored) and start with `3`, the
/// leading digit of every type allocation code in the fleet.
pub fn extract_imei(text: &str) -> Option<String> {
    if let Some(imei) = first_group("imei", &IMEI_RULES, text) {
        return Some(imei);
    }

    let compact = strip_whitespace(text);
    DIGIT_RUN
        .find_iter(&compact)
        .map(|m| m.as_str())
        .find(|run| run.len() == IMEI_LEN && run.starts_with('3'))
        .map(str::to_string)
}

// ──────────────────────────────────────────────
// Serial
// ──────────────────────────────────────────────

static SERIAL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule("s_n", r"(?i:S/N)[:\s]*([A-Z0-9]{8,})"),
        rule(
            "serial",
            r"(?i:Serial(?:\s*(?:No\.?|Number|#))?)[:\s]*([A-Z0-9]{8,})",
        ),
    ]
});

pub fn extract_serial(text: &str) -> Option<String> {
    first_group("serial", &SERIAL_RULES, text)
}

// ──────────────────────────────────────────────
// Model
// ──────────────────────────────────────────────

/// Observed misreads of "iPhone 14" on the sticker font.
const MODEL_MISREADS: &[(&str, &str)] = &[
    ("IPhone 114", "iPhone 14"),
    ("IPhone 4 ", "iPhone 14 "),
];

static SAMSUNG_RULE: LazyLock<Rule> = LazyLock::new(|| {
    rule(
        "samsung_galaxy",
        r"(?i)Samsung\s+Galaxy\s+(Z\s*(?:Fold|Flip)\s*\d+|[A-Z]{1,2}\s?\d{1,3}[A-Z+]*(?:\s+(?:Ultra|Plus|FE|Edge)\b)?)(?:\s*,\s*\d+)?",
    )
});

static APPLE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(
            "apple_qualified",
            r"(?i)Apple[,\s]+(iPhone|iPad)\s+(\d+)\s*(Pro\s*Max|Pro|Max|Plus|Mini)?",
        ),
        rule(
            "apple_bare",
            r"(?i)(iPhone|iPad)\s+(\d+)\s*(Pro\s*Max|Pro|Max|Plus|Mini)?",
        ),
    ]
});

static IPH_ABBREVIATION: LazyLock<Rule> =
    LazyLock::new(|| rule("iph_abbreviation", r"(?i)IPH\s*(\d+[A-Z]*)"));

pub fn extract_model(text: &str) -> Option<String> {
    let mut text = text.to_string();
    for (misread, fixed) in MODEL_MISREADS {
        text = text.replace(misread, fixed);
    }

    if let Some(token) = first_group("model", std::slice::from_ref(&*SAMSUNG_RULE), &text) {
        return Some(format!("Samsung Galaxy {}", collapse_whitespace(&token)));
    }

    let apple = first_match("model", &APPLE_RULES, &text, |caps| {
        let family = canonical_family(caps.get(1)?.as_str());
        let number = caps.get(2)?.as_str();
        Some(match caps.get(3) {
            Some(variant) => format!("{family} {number} {}", canonical_variant(variant.as_str())),
            None => format!("{family} {number}"),
        })
    });
    if apple.is_some() {
        return apple;
    }

    first_group("model", std::slice::from_ref(&*IPH_ABBREVIATION), &text)
        .map(|captured| format!("iPhone {captured}"))
}

fn canonical_family(raw: &str) -> &'static str {
    if raw.eq_ignore_ascii_case("ipad") {
        "iPad"
    } else {
        "iPhone"
    }
}

fn canonical_variant(raw: &str) -> &'static str {
    let squashed: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match squashed.as_str() {
        "promax" => "Pro Max",
        "pro" => "Pro",
        "max" => "Max",
        "plus" => "Plus",
        _ => "Mini",
    }
}

// ──────────────────────────────────────────────
// Storage
// ──────────────────────────────────────────────

/// Capacities a phone or tablet actually ships with, in GB.
const STORAGE_SIZES_GB: &[u32] = &[64, 128, 256, 512, 1024, 2048];

static STORAGE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // "Apple, iPhone 14, 128, Midnight" style attribute line
        rule("comma_delimited", r"(?i),\s*(\d{2,4})\s*(?:GB)?\s*,"),
        rule("gb_suffix", r"(?i)\b(\d{2,4})\s*GB"),
    ]
});

pub fn extract_storage(text: &str) -> Option<String> {
    first_match("storage", &STORAGE_RULES, text, |caps| {
        let size: u32 = caps.get(1)?.as_str().parse().ok()?;
        STORAGE_SIZES_GB
            .contains(&size)
            .then(|| format!("{size}GB"))
    })
}

// ──────────────────────────────────────────────
// Color
// ──────────────────────────────────────────────

/// Marketing names, checked before the generic words they contain.
static NAMED_COLORS: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule("Phantom Black", r"(?i)Phantom\s+Black"),
        rule("Starlight", r"(?i)\bStarlight\b"),
        rule("Midnight", r"(?i)\bMidnight\b"),
        rule("Sierra Blue", r"(?i)Sierra\s+Blue"),
        rule("Alpine Green", r"(?i)Alpine\s+Green"),
        rule("Space Gray", r"(?i)Space\s+Gr[ae]y"),
        rule("Space Black", r"(?i)Space\s+Black"),
        rule("Deep Purple", r"(?i)Deep\s+Purple"),
        rule("Pacific Blue", r"(?i)Pacific\s+Blue"),
        rule("Graphite", r"(?i)\bGraphite\b"),
    ]
});

static GENERIC_COLORS: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    ["Black", "White", "Blue", "Red", "Green", "Purple", "Gold", "Silver"]
        .into_iter()
        .map(|name| rule(name, &format!(r"(?i)\b{name}\b")))
        .collect()
});

pub fn extract_color(text: &str) -> Option<String> {
    NAMED_COLORS
        .iter()
        .chain(GENERIC_COLORS.iter())
        .find(|r| r.regex.is_match(text))
        .map(|r| r.name.to_string())
}

// ──────────────────────────────────────────────
// Carrier lock
// ──────────────────────────────────────────────

static OTHER_UNLOCKED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Other\s*\(Unlocked\)").expect("valid regex"));

static UNLOCKED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Unlocked").expect("valid regex"));

static NETWORK_CARRIERS: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    ["Verizon", "AT&T", "T-Mobile", "Sprint"]
        .into_iter()
        .map(|name| rule(name, &format!("(?i){}", regex::escape(name))))
        .collect()
});

/// Network the device is locked to, `"<Carrier> (Unlocked)"`, or `"Unlocked"`.
pub fn extract_carrier_device(text: &str) -> Option<String> {
    if OTHER_UNLOCKED.is_match(text) {
        return Some("Unlocked".to_string());
    }

    if let Some(carrier) = NETWORK_CARRIERS.iter().find(|r| r.regex.is_match(text)) {
        return Some(if UNLOCKED.is_match(text) {
            format!("{} (Unlocked)", carrier.name)
        } else {
            carrier.name.to_string()
        });
    }

    UNLOCKED.is_match(text).then(|| "Unlocked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── IMEI ──

    #[test]
    fn imei_with_label_and_space() {
        assert_eq!(extract_imei("IMEI: 355260780990629").as_deref(), Some("355260780990629"));
    }

    #[test]
    fn imei_with_label_no_space() {
        assert_eq!(extract_imei("IMEI:355260780990629").as_deref(), Some("355260780990629"));
    }

    #[test]
    fn imei_label_is_case_insensitive() {
        assert_eq!(extract_imei("imei 355260780990629").as_deref(), Some("355260780990629"));
    }

    #[test]
    fn imei_with_misread_label() {
        assert_eq!(extract_imei("IME1 355260780990629").as_deref(), Some("355260780990629"));
        assert_eq!(extract_imei("IMEL:355260780990629").as_deref(), Some("355260780990629"));
    }

    #[test]
    fn labeled_imei_need_not_start_with_three() {
        assert_eq!(extract_imei("IMEI:123456789012345").as_deref(), Some("123456789012345"));
    }

    #[test]
    fn bare_run_not_starting_with_three_is_rejected() {
        assert_eq!(extract_imei("order 123456789012345 shipped"), None);
    }

    #[test]
    fn bare_run_starting_with_three_is_accepted() {
        assert_eq!(extract_imei("S/N X 355260780990629").as_deref(), Some("355260780990629"));
    }

    #[test]
    fn bare_run_split_by_ocr_is_rejoined() {
        assert_eq!(extract_imei("3552 6078 0990 629").as_deref(), Some("355260780990629"));
    }

    #[test]
    fn bare_run_must_be_exactly_fifteen_digits() {
        assert_eq!(extract_imei("3552607809906291"), None);
        assert_eq!(extract_imei("35526078099062"), None);
    }

    #[test]
    fn bare_run_bounded_by_letters_is_accepted() {
        assert_eq!(extract_imei("AB355260780990629CD").as_deref(), Some("355260780990629"));
    }

    #[test]
    fn labeled_value_beats_earlier_bare_run() {
        let text = "355555555555555 IMEI: 351111111111111";
        assert_eq!(extract_imei(text).as_deref(), Some("351111111111111"));
    }

    // ── Serial ──

    #[test]
    fn serial_from_s_n_label() {
        assert_eq!(extract_serial("S/N: F2LXK0ABCD12").as_deref(), Some("F2LXK0ABCD12"));
    }

    #[test]
    fn serial_from_serial_label() {
        assert_eq!(extract_serial("Serial R58N12345XY").as_deref(), Some("R58N12345XY"));
        assert_eq!(extract_serial("serial no: R58N12345XY").as_deref(), Some("R58N12345XY"));
    }

    #[test]
    fn s_n_label_wins_over_serial_label() {
        let text = "Serial AAAAAAAA11 S/N BBBBBBBB22";
        assert_eq!(extract_serial(text).as_deref(), Some("BBBBBBBB22"));
    }

    #[test]
    fn short_serial_rejected() {
        assert_eq!(extract_serial("S/N: ABC123"), None);
    }

    // ── Model ──

    #[test]
    fn samsung_model_token_only() {
        assert_eq!(
            extract_model("Samsung Galaxy S23 Ultra, 256, Phantom Black").as_deref(),
            Some("Samsung Galaxy S23 Ultra")
        );
        assert_eq!(
            extract_model("SAMSUNG GALAXY A54, 128").as_deref(),
            Some("Samsung Galaxy A54")
        );
    }

    #[test]
    fn apple_qualified_model() {
        assert_eq!(
            extract_model("Apple, iPhone 14 Pro Max, 256, Deep Purple").as_deref(),
            Some("iPhone 14 Pro Max")
        );
    }

    #[test]
    fn apple_qualified_preferred_over_earlier_bare_mention() {
        let text = "iPhone 12 case Apple, iPhone 15 Plus";
        assert_eq!(extract_model(text).as_deref(), Some("iPhone 15 Plus"));
    }

    #[test]
    fn bare_iphone_and_ipad() {
        assert_eq!(extract_model("IPHONE 13 PRO 128GB").as_deref(), Some("iPhone 13 Pro"));
        assert_eq!(extract_model("iPad 10 Wi-Fi").as_deref(), Some("iPad 10"));
    }

    #[test]
    fn known_misreads_are_repaired() {
        assert_eq!(extract_model("IPhone 114 128GB").as_deref(), Some("iPhone 14"));
        assert_eq!(extract_model("IPhone 4 Midnight").as_deref(), Some("iPhone 14"));
    }

    #[test]
    fn iph_abbreviation_expanded() {
        assert_eq!(extract_model("MODEL IPH14PRO").as_deref(), Some("iPhone 14PRO"));
    }

    #[test]
    fn no_model_returns_none() {
        assert_eq!(extract_model("FRAGILE HANDLE WITH CARE"), None);
    }

    // ── Storage ──

    #[test]
    fn storage_with_gb_suffix() {
        assert_eq!(extract_storage("128GB").as_deref(), Some("128GB"));
        assert_eq!(extract_storage("256 GB Blue").as_deref(), Some("256GB"));
    }

    #[test]
    fn storage_outside_allow_list_rejected() {
        assert_eq!(extract_storage("100GB"), None);
    }

    #[test]
    fn storage_from_comma_delimited_attribute_line() {
        assert_eq!(
            extract_storage("Apple, iPhone 14, 512, Midnight").as_deref(),
            Some("512GB")
        );
    }

    #[test]
    fn zip_code_is_not_storage() {
        assert_eq!(extract_storage("MIAMI FL 33101, 2 PKGS"), None);
    }

    #[test]
    fn later_allowed_value_found_after_rejected_one() {
        assert_eq!(extract_storage("Apple, iPhone 14, 2022, 128GB").as_deref(), Some("128GB"));
    }

    // ── Color ──

    #[test]
    fn marketing_name_beats_generic_word() {
        assert_eq!(extract_color("Phantom Black case").as_deref(), Some("Phantom Black"));
    }

    #[test]
    fn space_gray_both_spellings() {
        assert_eq!(extract_color("Space Grey").as_deref(), Some("Space Gray"));
        assert_eq!(extract_color("SPACE GRAY").as_deref(), Some("Space Gray"));
    }

    #[test]
    fn generic_color_whole_word_only() {
        assert_eq!(extract_color("Blueberry Redwood"), None);
        assert_eq!(extract_color("color: red").as_deref(), Some("Red"));
    }

    #[test]
    fn generic_colors_follow_priority_order() {
        assert_eq!(extract_color("Silver White").as_deref(), Some("White"));
    }

    // ── Carrier lock ──

    #[test]
    fn other_unlocked_phrase() {
        assert_eq!(extract_carrier_device("Other (Unlocked)").as_deref(), Some("Unlocked"));
    }

    #[test]
    fn carrier_with_unlocked_suffix() {
        assert_eq!(
            extract_carrier_device("Verizon unlocked").as_deref(),
            Some("Verizon (Unlocked)")
        );
    }

    #[test]
    fn carrier_list_order() {
        assert_eq!(extract_carrier_device("Sprint AT&T").as_deref(), Some("AT&T"));
        assert_eq!(extract_carrier_device("t-mobile").as_deref(), Some("T-Mobile"));
    }

    #[test]
    fn bare_unlocked() {
        assert_eq!(extract_carrier_device("UNLOCKED").as_deref(), Some("Unlocked"));
        assert_eq!(extract_carrier_device("no network info"), None);
    }

    // ── Determinism ──

    #[test]
    fn extractors_are_deterministic() {
        let text = "Apple, iPhone 14 Pro, 256, Space Gray IMEI:355260780990629 S/N F2LXK0ABCD12 Verizon";
        for _ in 0..3 {
            assert_eq!(extract_imei(text).as_deref(), Some("355260780990629"));
            assert_eq!(extract_serial(text).as_deref(), Some("F2LXK0ABCD12"));
            assert_eq!(extract_model(text).as_deref(), Some("iPhone 14 Pro"));
            assert_eq!(extract_storage(text).as_deref(), Some("256GB"));
            assert_eq!(extract_color(text).as_deref(), Some("Space Gray"));
            assert_eq!(extract_carrier_device(text).as_deref(), Some("Verizon"));
        }
    }
}
