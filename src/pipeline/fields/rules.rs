//! Ordered rule tables: first rule (and first match within a rule) wins.

use regex::{Captures, Regex};

/// A compiled pattern with the name it is logged under.
pub struct Rule {
    pub name: &'static str,
    pub regex: Regex,
}

pub fn rule(name: &'static str, pattern: &str) -> Rule {
    Rule {
        name,
        regex: Regex::new(pattern).expect("valid regex"),
    }
}

/// Walk `rules` in priority order and return the first value `accept` yields.
///
/// Within one rule every non-overlapping match is tried left to right, so a
/// rejected candidate does not hide a later acceptable one.
pub fn first_match<'t, T>(
    field: &'static str,
    rules: &[Rule],
    text: &'t str,
    mut accept: impl FnMut(&Captures<'t>) -> Option<T>,
) -> Option<T> {
    for r in rules {
        for caps in r.regex.captures_iter(text) {
            if let Some(value) = accept(&caps) {
                tracing::trace!(field, rule = r.name, "rule matched");
                return Some(value);
            }
        }
    }
    None
}

/// First capture group of the first rule that matches, trimmed.
pub fn first_group(field: &'static str, rules: &[Rule], text: &str) -> Option<String> {
    first_match(field, rules, text, |caps| {
        caps.get(1).map(|m| m.as_str().trim().to_string())
    })
}
