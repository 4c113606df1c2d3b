//! Centralized bot configuration.
//!
//! Loaded via the `config` crate from environment variables, using `__` to
//! reach nested sections (e.g. `TRANSIT__API_KEY`). Only the database URL and
//! the transit endpoint and key are required; every limit has a default.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use transit_bot_access::{DEFAULT_ROTATION_HOURS, RateLimitConfig, RateLimitPolicy};
use transit_bot_transit::FetcherConfig;

/// Bot configuration composed from library configs.
///
/// `Debug` output redacts the database URL, which usually embeds a password.
#[derive(Deserialize)]
pub struct BotConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the webhook listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Transit API connection settings.
    pub transit: TransitConfig,

    /// Geocoding provider settings.
    #[serde(default)]
    pub geocoder: GeocoderConfig,

    /// Rate limits and session rotation.
    #[serde(default)]
    pub limits: LimitsConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl BotConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("database_url", &"<redacted>")
            .field("listen_addr", &self.listen_addr)
            .field("transit", &self.transit)
            .field("geocoder", &self.geocoder)
            .field("limits", &self.limits)
            .finish()
    }
}

/// Transit API settings.
#[derive(Clone, Deserialize)]
pub struct TransitConfig {
    /// Departures endpoint.
    pub base_url: String,

    /// Bearer token for the transit API.
    pub api_key: String,

    /// Per-try timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Tries per logical call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff unit in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl TransitConfig {
    /// Builds the fetcher configuration.
    #[must_use]
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig::new(self.base_url.clone(), self.api_key.clone())
            .with_timeout(Duration::from_secs(self.timeout_seconds))
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
    }
}

impl fmt::Debug for TransitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

/// Geocoder settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    /// Nominatim-compatible base URL.
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,

    /// User agent sent with every lookup, as Nominatim's usage policy requires.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    "bordeaux_transport_bot".to_string()
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Rate limit and session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Admitted actions per user per hour.
    #[serde(default = "default_user_requests_per_hour")]
    pub user_requests_per_hour: u32,

    /// Admitted actions per user per minute.
    #[serde(default = "default_user_requests_per_minute")]
    pub user_requests_per_minute: u32,

    /// Transit API calls per hour across all users.
    #[serde(default = "default_api_requests_per_hour")]
    pub api_requests_per_hour: u32,

    /// Idle hours after which a session token is rotated.
    #[serde(default = "default_session_rotation_hours")]
    pub session_rotation_hours: i64,
}

fn default_user_requests_per_hour() -> u32 {
    100
}

fn default_user_requests_per_minute() -> u32 {
    10
}

fn default_api_requests_per_hour() -> u32 {
    1000
}

fn default_session_rotation_hours() -> i64 {
    DEFAULT_ROTATION_HOURS
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            user_requests_per_hour: default_user_requests_per_hour(),
            user_requests_per_minute: default_user_requests_per_minute(),
            api_requests_per_hour: default_api_requests_per_hour(),
            session_rotation_hours: default_session_rotation_hours(),
        }
    }
}

impl LimitsConfig {
    /// Builds the rate limiter configuration.
    #[must_use]
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            per_user: RateLimitPolicy::per_hour(self.user_requests_per_hour),
            burst: RateLimitPolicy::per_minute(self.user_requests_per_minute),
            api: RateLimitPolicy::per_hour(self.api_requests_per_hour),
        }
    }

    /// Returns the session rotation threshold.
    ///
    /// # Errors
    ///
    /// Returns an error unless `session_rotation_hours` is a positive number
    /// of hours that fits a duration.
    pub fn rotation_threshold(&self) -> Result<chrono::Duration, config::ConfigError> {
        let hours = self.session_rotation_hours;
        chrono::Duration::try_hours(hours)
            .filter(|_| hours > 0)
            .ok_or_else(|| {
                config::ConfigError::Message(format!(
                    "limits.session_rotation_hours must be a positive number of hours, got {hours}"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_config_has_correct_defaults() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.user_requests_per_hour, 100);
        assert_eq!(limits.user_requests_per_minute, 10);
        assert_eq!(limits.api_requests_per_hour, 1000);
        assert_eq!(
            limits.rotation_threshold().expect("default is valid"),
            chrono::Duration::hours(12)
        );

        let rate = limits.rate_limit_config();
        assert_eq!(rate.per_user, RateLimitPolicy::per_hour(100));
        assert_eq!(rate.burst, RateLimitPolicy::per_minute(10));
        assert_eq!(rate.api, RateLimitPolicy::per_hour(1000));
    }

    #[test]
    fn rotation_hours_out_of_range_are_rejected() {
        for hours in [0, -1, i64::MAX, i64::MIN] {
            let limits = LimitsConfig {
                session_rotation_hours: hours,
                ..LimitsConfig::default()
            };
            assert!(
                limits.rotation_threshold().is_err(),
                "{hours} should be rejected"
            );
        }
    }

    #[test]
    fn burst_limit_is_configurable() {
        let limits: LimitsConfig = serde_json::from_value(serde_json::json!({
            "user_requests_per_minute": 3
        }))
        .expect("valid limits");

        assert_eq!(limits.user_requests_per_hour, 100);
        assert_eq!(
            limits.rate_limit_config().burst,
            RateLimitPolicy::per_minute(3)
        );
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config: BotConfig = serde_json::from_value(serde_json::json!({
            "database_url": "postgres://localhost/transit",
            "transit": {
                "base_url": "https://api.example.test/departures",
                "api_key": "secret"
            }
        }))
        .expect("valid config");

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.geocoder.user_agent, "bordeaux_transport_bot");

        let fetcher = config.transit.fetcher_config();
        assert_eq!(fetcher.timeout, Duration::from_secs(10));
        assert_eq!(fetcher.max_retries, 3);
        assert_eq!(fetcher.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn bot_config_debug_hides_database_password() {
        let config: BotConfig = serde_json::from_value(serde_json::json!({
            "database_url": "postgres://bot:hunter2@db/transit",
            "transit": {
                "base_url": "https://api.example.test/departures",
                "api_key": "transit-secret"
            }
        }))
        .expect("valid config");

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("transit-secret"));
        assert!(rendered.contains("0.0.0.0:8080"));
    }

    #[test]
    fn transit_config_debug_hides_key() {
        let transit = TransitConfig {
            base_url: "https://api.example.test".to_string(),
            api_key: "secret-key".to_string(),
            timeout_seconds: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
        };
        assert!(!format!("{transit:?}").contains("secret-key"));
    }
}
