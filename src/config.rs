//! Runtime configuration, read from the environment.
//!
//! Keys are matched case-insensitively against the raw environment (a `.env`
//! file is loaded first by `main`). Everything except the catalogue
//! credentials has a default, so a bare `cargo run` serves against the
//! public endpoint without a durable store.

use crate::catalogue::TescoOptions;
use crate::catalogue::tesco::DEFAULT_URL;
use chrono_tz::Tz;
use figment::Figment;
use figment::providers::Env;
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Enables the Postgres challenge store when set.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_catalogue_url")]
    pub catalogue_url: String,
    #[serde(default)]
    pub catalogue_csrf_token: Option<String>,
    #[serde(default)]
    pub catalogue_cookie: Option<String>,
    #[serde(default = "default_superdepartment")]
    pub catalogue_superdepartment: String,
    #[serde(default = "default_requests_per_minute")]
    pub catalogue_requests_per_minute: u32,

    /// Timezone for visitors who send none.
    #[serde(
        default = "default_timezone",
        deserialize_with = "deserialize_timezone"
    )]
    pub default_timezone: Tz,
    /// Upper bound on a single challenge read.
    #[serde(
        default = "default_read_deadline",
        deserialize_with = "deserialize_duration"
    )]
    pub read_deadline: Duration,
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    pub fn tesco_options(&self) -> TescoOptions {
        TescoOptions {
            url: self.catalogue_url.clone(),
            superdepartment: self.catalogue_superdepartment.clone(),
            csrf_token: self.catalogue_csrf_token.clone(),
            cookie: self.catalogue_cookie.clone(),
            requests_per_minute: self.catalogue_requests_per_minute,
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_catalogue_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_superdepartment() -> String {
    "food-cupboard".to_string()
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_timezone() -> Tz {
    chrono_tz::Europe::London
}

fn default_read_deadline() -> Duration {
    Duration::from_secs(10)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

/// Accepts bare seconds (`10`) or a duration string (`10s`, `1m`, `500ms`).
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
        Raw::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    let parser = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ]);
    let parsed = parser
        .parse(text.trim())
        .map_err(|e| format!("invalid duration '{text}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{text}': {e}"))
}

fn deserialize_timezone<'de, D>(deserializer: D) -> Result<Tz, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    crate::clock::parse_timezone(&name).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    fn config_from(pairs: &[(&str, serde_json::Value)]) -> Result<Config, figment::Error> {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        Config::from_figment(Figment::new().merge(Serialized::defaults(map)))
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.catalogue_url, DEFAULT_URL);
        assert_eq!(config.catalogue_superdepartment, "food-cupboard");
        assert_eq!(config.default_timezone, chrono_tz::Europe::London);
        assert_eq!(config.read_deadline, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(8));
    }

    #[test]
    fn durations_accept_seconds_and_units() {
        let config = config_from(&[
            ("read_deadline", serde_json::json!("1500ms")),
            ("shutdown_timeout", serde_json::json!(3)),
        ])
        .unwrap();
        assert_eq!(config.read_deadline, Duration::from_millis(1500));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));

        let config = config_from(&[("read_deadline", serde_json::json!("1m"))]).unwrap();
        assert_eq!(config.read_deadline, Duration::from_secs(60));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("read_deadline", serde_json::json!("soon"))]).is_err());
        assert!(config_from(&[("default_timezone", serde_json::json!("Nowhere/City"))]).is_err());
    }

    #[test]
    fn tesco_options_carry_credentials() {
        let config = config_from(&[
            ("catalogue_csrf_token", serde_json::json!("tok")),
            ("catalogue_requests_per_minute", serde_json::json!(12)),
        ])
        .unwrap();
        let options = config.tesco_options();
        assert_eq!(options.csrf_token.as_deref(), Some("tok"));
        assert_eq!(options.cookie, None);
        assert_eq!(options.requests_per_minute, 12);
    }
}
