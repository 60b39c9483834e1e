//! Runtime configuration loaded from `CAMSPORTS_*` environment variables.
//!
//! A `.env` file in the working directory is honoured for local runs.

use crate::poller::DEFAULT_POLL_INTERVAL;
use crate::transport::DEFAULT_REQUEST_TIMEOUT;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_STORE_PATH: &str = "camsports-session.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON file at `store_path`.
    File,
    /// OS keychain / secret service.
    Keyring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub store: StoreBackend,
    pub store_path: PathBuf,
    /// Used by the watcher only when no stored session can be restored.
    pub email: Option<String>,
    pub password: Option<String>,
    /// Overrides the signed-in user's own team.
    pub team_id: Option<String>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            store: StoreBackend::File,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            email: None,
            password: None,
            team_id: None,
            log_json: false,
        }
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn parse_seconds(key: &'static str, value: &str, min: u64) -> Result<Duration, ConfigError> {
    let seconds: u64 = value.trim().parse().map_err(|_| invalid(key, value))?;
    if seconds < min {
        return Err(invalid(key, value));
    }
    Ok(Duration::from_secs(seconds))
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get("CAMSPORTS_API_URL") {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(invalid("CAMSPORTS_API_URL", &url));
            }
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("CAMSPORTS_REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout = parse_seconds("CAMSPORTS_REQUEST_TIMEOUT_SECONDS", &v, 1)?;
        }
        if let Some(v) = get("CAMSPORTS_POLL_INTERVAL_SECONDS") {
            config.poll_interval = parse_seconds("CAMSPORTS_POLL_INTERVAL_SECONDS", &v, 1)?;
        }
        if let Some(v) = get("CAMSPORTS_STORE") {
            config.store = match v.to_ascii_lowercase().as_str() {
                "file" => StoreBackend::File,
                "keyring" => StoreBackend::Keyring,
                _ => return Err(invalid("CAMSPORTS_STORE", &v)),
            };
        }
        if let Some(path) = get("CAMSPORTS_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        config.email = get("CAMSPORTS_EMAIL");
        config.password = lookup("CAMSPORTS_PASSWORD").filter(|p| !p.is_empty());
        config.team_id = get("CAMSPORTS_TEAM_ID");
        if let Some(v) = get("CAMSPORTS_LOG_JSON") {
            config.log_json = parse_flag("CAMSPORTS_LOG_JSON", &v)?;
        }

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
