use std::time::Duration;

use crate::{FetchRequest, Timeframe};

/// Where snapshots come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Live,
    Demo,
}

/// All configuration loaded from environment variables at startup.
/// Malformed values cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Signal source
    pub source_mode: SourceMode,
    pub signal_api_url: String,
    pub request_timeout: Duration,

    // Initial view
    pub default_timeframe: Timeframe,
    pub default_limit: u32,

    // Refresh policy
    pub refresh_interval: Duration,
    pub debounce: Duration,

    // Dashboard
    pub dashboard_port: u16,
    pub dashboard_token: Option<String>,

    // Optional TOML overriding band layout constants
    pub layout_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_mode: SourceMode::Live,
            signal_api_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_secs(20),
            default_timeframe: Timeframe::H4,
            default_limit: 50,
            refresh_interval: Duration::from_secs(120),
            debounce: Duration::from_millis(500),
            dashboard_port: 8080,
            dashboard_token: None,
            layout_config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads `.env` if present. Panics on any malformed variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        let defaults = Config::default();

        let source_mode = match optional_env("SIGNAL_SOURCE")
            .unwrap_or_else(|| "live".to_string())
            .to_lowercase()
            .as_str()
        {
            "live" => SourceMode::Live,
            "demo" => SourceMode::Demo,
            other => panic!("ERROR: SIGNAL_SOURCE must be 'live' or 'demo', got: '{other}'"),
        };

        let default_timeframe = optional_env("DEFAULT_TIMEFRAME")
            .map(|v| {
                v.parse::<Timeframe>()
                    .unwrap_or_else(|e| panic!("DEFAULT_TIMEFRAME is invalid: {e}"))
            })
            .unwrap_or(defaults.default_timeframe);

        let default_limit = parsed_env("DEFAULT_LIMIT").unwrap_or(defaults.default_limit);
        if default_limit == 0 {
            panic!("DEFAULT_LIMIT must be a positive integer");
        }

        Config {
            source_mode,
            signal_api_url: optional_env("SIGNAL_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.signal_api_url),
            request_timeout: parsed_env("SIGNAL_API_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            default_timeframe,
            default_limit,
            refresh_interval: positive_secs_env("REFRESH_INTERVAL_SECS")
                .unwrap_or(defaults.refresh_interval),
            debounce: parsed_env("DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            dashboard_port: parsed_env("DASHBOARD_PORT").unwrap_or(defaults.dashboard_port),
            dashboard_token: optional_env("DASHBOARD_TOKEN").filter(|t| !t.is_empty()),
            layout_config_path: optional_env("LAYOUT_CONFIG_PATH"),
        }
    }

    pub fn initial_request(&self) -> FetchRequest {
        FetchRequest::new(self.default_timeframe, self.default_limit)
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    optional_env(key).map(|v| {
        v.trim()
            .parse::<T>()
            .unwrap_or_else(|_| panic!("Environment variable '{key}' has an invalid value: '{v}'"))
    })
}

/// Whole seconds that must be at least one.
fn positive_secs_env(key: &str) -> Option<Duration> {
    parsed_env::<u64>(key).map(|secs| {
        if secs == 0 {
            panic!("{key} must be a positive number of seconds");
        }
        Duration::from_secs(secs)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name so parallel tests never race.

    #[test]
    #[should_panic(expected = "must be a positive number of seconds")]
    fn zero_interval_is_rejected_at_startup() {
        std::env::set_var("RADAR_TEST_ZERO_INTERVAL_SECS", "0");
        positive_secs_env("RADAR_TEST_ZERO_INTERVAL_SECS");
    }

    #[test]
    fn positive_interval_is_read_in_seconds() {
        std::env::set_var("RADAR_TEST_INTERVAL_SECS", "30");
        assert_eq!(
            positive_secs_env("RADAR_TEST_INTERVAL_SECS"),
            Some(Duration::from_secs(30))
        );
        assert_eq!(positive_secs_env("RADAR_TEST_INTERVAL_UNSET"), None);
    }
}
