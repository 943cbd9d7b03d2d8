//! Runtime configuration for the extraction client.
//!
//! Values are read once at startup (`.env` first, then the process
//! environment) and never change afterwards. The resulting [`ApiConfig`]
//! is handed to [`crate::client::ExtractClient`] and the harvester jobs.
//!
//! ## Environment Variables
//!
//! - `ZYTE_API_KEY`: API key used as the basic-auth username (required)
//! - `ZYTE_API_ENDPOINT`: extraction endpoint (default `https://api.zyte.com/v1/extract`)
//! - `RESULTS_DIR`: directory for result files (default `responses`)
//! - `MAX_ATTEMPTS`: retry bound for each API call (default 3)

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://api.zyte.com/v1/extract";
pub const DEFAULT_RESULTS_DIR: &str = "responses";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ZYTE_API_KEY is not set; add it to .env or export it")]
    MissingApiKey,
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Immutable settings shared by the transport and the jobs.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub endpoint: String,
    pub results_dir: PathBuf,
    pub max_attempts: u32,
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Loads `.env` (if present) and builds the config from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ZYTE_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut config = Self::new(api_key);

        if let Some(endpoint) = lookup("ZYTE_API_ENDPOINT").filter(|v| !v.is_empty()) {
            config.endpoint = endpoint;
        }
        if let Some(dir) = lookup("RESULTS_DIR").filter(|v| !v.is_empty()) {
            config.results_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("MAX_ATTEMPTS").filter(|v| !v.trim().is_empty()) {
            config.max_attempts = match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "MAX_ATTEMPTS",
                        value: raw,
                    });
                }
            };
        }

        Ok(config)
    }
}
