use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::pipeline::extraction::vision_ocr::DEFAULT_GEMINI_MODEL;
use crate::pipeline::extraction::PassMode;
use crate::pipeline::fields::ExtractionProfile;

/// Application-level constants
pub const APP_NAME: &str = "Labelscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 8080;

/// Timeout for one vision-model request.
pub const VISION_TIMEOUT_SECS: u64 = 60;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "labelscan=info,tower_http=warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read extraction profile {path}: {source}")]
    ProfileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid extraction profile {path}: {source}")]
    ProfileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Which scanner backs `/scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Local OCR plus field heuristics.
    Ocr,
    /// Hosted vision LLM.
    Vision,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ocr" => Ok(Self::Ocr),
            "vision" => Ok(Self::Vision),
            other => Err(format!("unknown engine '{other}' (expected ocr or vision)")),
        }
    }
}

/// Process configuration, read once from the environment at start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub engine: EngineKind,
    pub passes: PassMode,
    pub tessdata_dir: Option<PathBuf>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// JSON file overriding `ExtractionProfile` defaults.
    pub profile_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            engine: EngineKind::Ocr,
            passes: PassMode::Dual,
            tessdata_dir: None,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            profile_path: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            bind: parse_or("LABELSCAN_BIND", get("LABELSCAN_BIND"), defaults.bind)?,
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            engine: parse_or("LABELSCAN_ENGINE", get("LABELSCAN_ENGINE"), defaults.engine)?,
            passes: parse_or("LABELSCAN_PASSES", get("LABELSCAN_PASSES"), defaults.passes)?,
            tessdata_dir: get("TESSDATA_PREFIX").map(PathBuf::from),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            profile_path: get("LABELSCAN_PROFILE").map(PathBuf::from),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// The configured profile file, or the built-in defaults.
    pub fn load_profile(&self) -> Result<ExtractionProfile, ConfigError> {
        match &self.profile_path {
            Some(path) => ExtractionProfile::from_file(path),
            None => Ok(ExtractionProfile::default()),
        }
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            message: format!("'{value}': {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.passes, PassMode::Dual);
    }

    #[test]
    fn reads_every_key() {
        let config = config_from(&[
            ("PORT", "9090"),
            ("LABELSCAN_BIND", "127.0.0.1"),
            ("LABELSCAN_ENGINE", "Vision"),
            ("LABELSCAN_PASSES", "single"),
            ("TESSDATA_PREFIX", "/usr/share/tessdata"),
            ("GEMINI_API_KEY", " secret "),
            ("GEMINI_MODEL", "gemini-1.5-pro"),
            ("LABELSCAN_PROFILE", "/etc/labelscan/profile.json"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9090");
        assert_eq!(config.engine, EngineKind::Vision);
        assert_eq!(config.passes, PassMode::Single);
        assert_eq!(config.tessdata_dir, Some(PathBuf::from("/usr/share/tessdata")));
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
        assert_eq!(
            config.profile_path,
            Some(PathBuf::from("/etc/labelscan/profile.json"))
        );
    }

    #[test]
    fn blank_values_are_unset() {
        let config = config_from(&[("PORT", "  "), ("GEMINI_API_KEY", "")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.gemini_api_key, None);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = config_from(&[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn invalid_engine_is_rejected() {
        let err = config_from(&[("LABELSCAN_ENGINE", "easyocr")]).unwrap_err();
        assert!(err.to_string().contains("LABELSCAN_ENGINE"));
    }

    #[test]
    fn load_profile_defaults_without_path() {
        let profile = ServiceConfig::default().load_profile().unwrap();
        assert_eq!(profile, ExtractionProfile::default());
    }

    #[test]
    fn load_profile_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, r#"{"origin_state": "ca"}"#).unwrap();
        let config = ServiceConfig {
            profile_path: Some(path),
            ..ServiceConfig::default()
        };
        assert_eq!(config.load_profile().unwrap().origin_state, "CA");
    }

    #[test]
    fn app_name_is_labelscan() {
        assert_eq!(APP_NAME, "Labelscan");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
