use std::env;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

use crate::coordinator::CoordinatorSettings;
use crate::feeds::alerts::DEFAULT_ALERTS_URL;
use crate::feeds::forecast::DEFAULT_FORECAST_URL;
use crate::feeds::observation::DEFAULT_OBSERVATION_URL;

/// Alert languages the CAP broker publishes
pub const SUPPORTED_ALERT_LANGUAGES: &[&str] = &["is", "en"];
pub const DEFAULT_ALERT_LANGUAGE: &str = "is";
/// Key the alert feed is polled with; the met office broker is nationwide
pub const DEFAULT_ALERT_REGION: &str = "met";

#[derive(Debug, Clone)]
pub struct Config {
    pub station_id: String,
    pub station_name: String,
    pub alert_language: String,
    pub alert_region: String,
    pub refresh_interval_minutes: u64,
    pub fetch_timeout_secs: u64,
    pub station_utc_offset_minutes: i32,
    pub forecast_url: String,
    pub observation_url: String,
    pub alerts_url: String,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let station_id = env::var("STATION_ID")?;
        Ok(Config {
            station_name: env::var("STATION_NAME").unwrap_or_else(|_| station_id.clone()),
            station_id,
            alert_language: normalize_language(
                &env::var("ALERT_LANGUAGE").unwrap_or_else(|_| DEFAULT_ALERT_LANGUAGE.to_string()),
            ),
            alert_region: env::var("ALERT_REGION").unwrap_or_else(|_| DEFAULT_ALERT_REGION.to_string()),
            refresh_interval_minutes: env::var("REFRESH_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            station_utc_offset_minutes: env::var("STATION_UTC_OFFSET_MINUTES")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
            forecast_url: env::var("FORECAST_URL").unwrap_or_else(|_| DEFAULT_FORECAST_URL.to_string()),
            observation_url: env::var("OBSERVATION_URL")
                .unwrap_or_else(|_| DEFAULT_OBSERVATION_URL.to_string()),
            alerts_url: env::var("ALERTS_URL").unwrap_or_else(|_| DEFAULT_ALERTS_URL.to_string()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        let utc_offset = self
            .station_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!(
                    "Station UTC offset of {} minutes is out of range, using UTC",
                    self.station_utc_offset_minutes
                );
                utc()
            });

        CoordinatorSettings {
            alert_language: self.alert_language.clone(),
            alert_region: self.alert_region.clone(),
            refresh_interval: Duration::from_secs(self.refresh_interval_minutes.max(1).saturating_mul(60)),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            utc_offset,
        }
    }
}

/// Lowercases a configured language, falling back to Icelandic when unsupported
pub fn normalize_language(value: &str) -> String {
    let language = value.trim().to_lowercase();
    if SUPPORTED_ALERT_LANGUAGES.contains(&language.as_str()) {
        language
    } else {
        warn!(
            "Unsupported alert language '{}', falling back to '{}'",
            value, DEFAULT_ALERT_LANGUAGE
        );
        DEFAULT_ALERT_LANGUAGE.to_string()
    }
}

pub(crate) fn utc() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "STATION_ID",
        "STATION_NAME",
        "ALERT_LANGUAGE",
        "ALERT_REGION",
        "REFRESH_INTERVAL_MINUTES",
        "FETCH_TIMEOUT_SECS",
        "STATION_UTC_OFFSET_MINUTES",
        "FORECAST_URL",
        "OBSERVATION_URL",
        "ALERTS_URL",
        "SERVER_HOST",
        "SERVER_PORT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        env::set_var("STATION_ID", "422");

        let config = Config::from_env().unwrap();
        assert_eq!(config.station_id, "422");
        assert_eq!(config.station_name, "422");
        assert_eq!(config.alert_language, "is");
        assert_eq!(config.alert_region, "met");
        assert_eq!(config.refresh_interval_minutes, 10);
        assert_eq!(config.fetch_timeout_secs, 20);
        assert_eq!(config.forecast_url, DEFAULT_FORECAST_URL);
        assert_eq!(config.server_addr(), "0.0.0.0:8080");

        let settings = config.coordinator_settings();
        assert_eq!(settings.refresh_interval, Duration::from_secs(600));
        assert_eq!(settings.fetch_timeout, Duration::from_secs(20));
        assert_eq!(settings.utc_offset, utc());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_requires_station() {
        clear_env();
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("STATION_ID", "1");
        env::set_var("STATION_NAME", "Reykjavík");
        env::set_var("ALERT_LANGUAGE", "EN");
        env::set_var("REFRESH_INTERVAL_MINUTES", "5");
        env::set_var("STATION_UTC_OFFSET_MINUTES", "-60");
        env::set_var("SERVER_PORT", "not-a-port");

        let config = Config::from_env().unwrap();
        assert_eq!(config.station_name, "Reykjavík");
        assert_eq!(config.alert_language, "en");
        assert_eq!(config.server_port, 8080);

        let settings = config.coordinator_settings();
        assert_eq!(settings.refresh_interval, Duration::from_secs(300));
        assert_eq!(settings.utc_offset, FixedOffset::west_opt(3600).unwrap());
        clear_env();
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("en"), "en");
        assert_eq!(normalize_language(" IS "), "is");
        assert_eq!(normalize_language("de"), "is");
    }
}
