//! Runtime configuration.
//!
//! Values come from an optional `eduportal.toml` followed by `EDUPORTAL_*`
//! environment variables (later sources win).

pub mod institutions;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use fundu::DurationParser;
use serde::{Deserialize, Deserializer};

pub use institutions::{InstitutionConfig, InstitutionDirectory, InstitutionRegistry};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Level for this crate's own targets; `RUST_LOG` overrides it entirely.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Per-request timeout, e.g. `"30s"` or `"2m"`. Bare integers are seconds.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
    #[serde(default = "default_institutions_file")]
    pub institutions_file: PathBuf,
    /// Overrides the browser User-Agent sent with every request.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            request_timeout: default_request_timeout(),
            institutions_file: default_institutions_file(),
            user_agent: None,
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("eduportal.toml"))
            .merge(Env::prefixed("EDUPORTAL_"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::figment()
            .extract()
            .context("Failed to load configuration")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_institutions_file() -> PathBuf {
    PathBuf::from("schools_config.json")
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

/// Parse a human duration such as `"45s"`, `"2m"` or `"1.5s"`.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let parsed = DurationParser::with_all_time_units()
        .parse(text.trim())
        .map_err(|e| format!("invalid duration '{text}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{text}': {e}"))
}
