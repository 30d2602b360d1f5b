//! Deployment tuning data for the shipping extractors.
//!
//! The defaults match a single NY warehouse's label boilerplate. Another site
//! overrides them with a JSON file (see `config::ServiceConfig::profile_path`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractionProfile {
    /// Phrases that look like a two-word name but never are the recipient.
    pub recipient_noise: Vec<String>,
    /// Street candidates containing any of these tokens belong to the sender.
    pub address_reject_tokens: Vec<String>,
    /// Words the location pattern picks up as a "city" that are not cities.
    pub city_noise: Vec<String>,
    /// State the parcels ship from. Destination candidates in other states win.
    pub origin_state: String,
    /// Shortest accepted recipient name, in characters.
    pub min_recipient_len: usize,
}

impl Default for ExtractionProfile {
    fn default() -> Self {
        Self {
            recipient_noise: strings(&[
                "SHIP TO",
                "UDEAL INC",
                "EAST MEADOW",
                "HUDSON ST",
                "UPS GROUND",
                "USPS GROUND",
                "FRAGILE PLEASE",
            ]),
            address_reject_tokens: strings(&["HUDSON", "MEADOW", "UDEAL"]),
            city_noise: strings(&[
                "EAST",
                "MEADOW",
                "HUDSON",
                "UPS",
                "USPS",
                "GROUND",
                "ADVANTAGE",
                "FRAGILE",
            ]),
            origin_state: "NY".to_string(),
            min_recipient_len: 5,
        }
    }
}

impl ExtractionProfile {
    /// Load a profile from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let profile: Self = serde_json::from_str(&raw).map_err(|e| ConfigError::ProfileParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(profile.uppercased())
    }

    /// Label text is matched upper-case, so keep the tuning data upper-case too.
    fn uppercased(mut self) -> Self {
        for list in [
            &mut self.recipient_noise,
            &mut self.address_reject_tokens,
            &mut self.city_noise,
        ] {
            for entry in list.iter_mut() {
                *entry = entry.trim().to_uppercase();
            }
        }
        self.origin_state = self.origin_state.trim().to_uppercase();
        self
    }

    /// Exact match or containment against the recipient noise set.
    pub fn is_recipient_noise(&self, name: &str) -> bool {
        self.recipient_noise
            .iter()
            .any(|n| name == n || name.contains(n.as_str()))
    }

    pub fn is_sender_address(&self, address: &str) -> bool {
        let upper = address.to_uppercase();
        self.address_reject_tokens
            .iter()
            .any(|t| upper.contains(t.as_str()))
    }

    pub fn is_city_noise(&self, city: &str) -> bool {
        self.city_noise.iter().any(|c| c == city)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
