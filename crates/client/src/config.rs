//! Client configuration (environment driven).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const API_URL_VAR: &str = "BACKOFFICE_API_URL";
pub const SESSION_FILE_VAR: &str = "BACKOFFICE_SESSION_FILE";
pub const CACHE_TTL_VAR: &str = "BACKOFFICE_PERMISSION_CACHE_TTL_SECS";
pub const REQUEST_TIMEOUT_VAR: &str = "BACKOFFICE_REQUEST_TIMEOUT_SECS";

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_PERMISSION_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the REST backend, without trailing slash.
    pub api_url: String,
    /// Where the session snapshot is persisted. `None` uses the OS data dir.
    pub session_file: Option<PathBuf>,
    pub permission_cache_ttl: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got '{value}'")]
    InvalidSeconds { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_file: None,
            permission_cache_ttl: DEFAULT_PERMISSION_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (unset variables keep defaults).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_VAR) {
            let url = url.trim().trim_end_matches('/');
            if url.is_empty() {
                return Err(ConfigError::Empty { var: API_URL_VAR });
            }
            config.api_url = url.to_string();
        }

        if let Some(path) = lookup(SESSION_FILE_VAR).filter(|p| !p.trim().is_empty()) {
            config.session_file = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup(CACHE_TTL_VAR) {
            config.permission_cache_ttl = parse_seconds(CACHE_TTL_VAR, &value)?;
        }

        if let Some(value) = lookup(REQUEST_TIMEOUT_VAR) {
            config.request_timeout = parse_seconds(REQUEST_TIMEOUT_VAR, &value)?;
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

fn parse_seconds(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidSeconds {
            var,
            value: value.to_string(),
        })
}
