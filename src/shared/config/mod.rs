//! Application configuration module
//!
//! Provides the configuration types for the sync engine. Values come from a
//! builder (tests, embedding applications) or from environment variables
//! (`AppConfig::from_env`, used by the binary).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";
/// Default probe endpoint path
pub const DEFAULT_PROBE_PATH: &str = "/api/health";
/// Periodic sync interval
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);
/// Active connectivity probe interval
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);
/// Timeout applied to every remote call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Autosave quiet period
pub const DEFAULT_AUTOSAVE_QUIET_PERIOD: Duration = Duration::from_secs(2);
/// Failures after which a queue item becomes terminal
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Days a terminal queue item is kept before the retention sweep removes it
pub const DEFAULT_RETENTION_DAYS: i64 = 7;
/// Upper bound accepted for the retention window
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the system of record
    pub server_url: String,
    /// Bearer token sent with every remote call
    pub api_token: Option<String>,
    /// SQLite database file
    pub database_path: PathBuf,
    pub sync_interval: Duration,
    pub probe_interval: Duration,
    pub probe_path: String,
    pub request_timeout: Duration,
    pub autosave_quiet_period: Duration,
    pub max_retries: u32,
    pub retention_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_token: None,
            database_path: default_database_path(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            autosave_quiet_period: DEFAULT_AUTOSAVE_QUIET_PERIOD,
            max_retries: DEFAULT_MAX_RETRIES,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load configuration from `FIELDSYNC_*` environment variables
    ///
    /// Unset variables fall back to their defaults. A `.env` file in the
    /// working directory is honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut builder = Self::builder();
        if let Ok(url) = std::env::var("FIELDSYNC_SERVER_URL") {
            builder = builder.server_url(url);
        }
        if let Ok(token) = std::env::var("FIELDSYNC_API_TOKEN") {
            builder = builder.api_token(token);
        }
        if let Ok(path) = std::env::var("FIELDSYNC_DB_PATH") {
            builder = builder.database_path(path);
        }
        if let Ok(path) = std::env::var("FIELDSYNC_PROBE_PATH") {
            builder = builder.probe_path(path);
        }
        if let Some(ms) = env_number("FIELDSYNC_SYNC_INTERVAL_MS")? {
            builder = builder.sync_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = env_number("FIELDSYNC_PROBE_INTERVAL_MS")? {
            builder = builder.probe_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = env_number("FIELDSYNC_REQUEST_TIMEOUT_MS")? {
            builder = builder.request_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = env_number("FIELDSYNC_AUTOSAVE_MS")? {
            builder = builder.autosave_quiet_period(Duration::from_millis(ms));
        }
        if let Some(retries) = env_number::<u32>("FIELDSYNC_MAX_RETRIES")? {
            builder = builder.max_retries(retries);
        }
        if let Some(days) = env_number::<i64>("FIELDSYNC_RETENTION_DAYS")? {
            builder = builder.retention_days(days);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::InvalidValue("sync_interval"));
        }
        if self.probe_interval.is_zero() {
            return Err(ConfigError::InvalidValue("probe_interval"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("request_timeout"));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue("max_retries"));
        }
        if !(0..=MAX_RETENTION_DAYS).contains(&self.retention_days) {
            return Err(ConfigError::InvalidValue("retention_days"));
        }
        Ok(())
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    api_token: Option<String>,
    database_path: Option<PathBuf>,
    sync_interval: Option<Duration>,
    probe_interval: Option<Duration>,
    probe_path: Option<String>,
    request_timeout: Option<Duration>,
    autosave_quiet_period: Option<Duration>,
    max_retries: Option<u32>,
    retention_days: Option<i64>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = Some(interval);
        self
    }

    pub fn probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = Some(path.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn autosave_quiet_period(mut self, period: Duration) -> Self {
        self.autosave_quiet_period = Some(period);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retention_days(mut self, days: i64) -> Self {
        self.retention_days = Some(days);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            server_url: self.server_url.unwrap_or(defaults.server_url),
            api_token: self.api_token.or(defaults.api_token),
            database_path: self.database_path.unwrap_or(defaults.database_path),
            sync_interval: self.sync_interval.unwrap_or(defaults.sync_interval),
            probe_interval: self.probe_interval.unwrap_or(defaults.probe_interval),
            probe_path: self.probe_path.unwrap_or(defaults.probe_path),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            autosave_quiet_period: self
                .autosave_quiet_period
                .unwrap_or(defaults.autosave_quiet_period),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retention_days: self.retention_days.unwrap_or(defaults.retention_days),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
    #[error("invalid number in {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Platform data directory location of the local database
fn default_database_path() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    path.push("fieldsync");
    path.push("local.db");
    path
}

fn env_number<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => parse_number(name, value).map(Some),
        Err(_) => Ok(None),
    }
}

/// Parse into the target width; out-of-range values are rejected, not truncated
fn parse_number<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber { name, value })
}
