//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `STOCKWATCH_API_URL` - API base URL (default: `http://localhost:5000`)
//! - `STOCKWATCH_CREDENTIAL_KEY` - Credential slot key (default: `accessToken`)
//! - `STOCKWATCH_DATA_DIR` - Directory for the persistent credential store (default: `.stockwatch`)
//! - `STOCKWATCH_REQUEST_TIMEOUT_SECS` - Timeout for unauthenticated calls (default: 8)
//! - `STOCKWATCH_AUTH_TIMEOUT_SECS` - Timeout for authenticated calls (default: 60)
//! - `STOCKWATCH_LOW_STOCK_THRESHOLD` - Inclusive low-stock threshold (default: 5)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_CREDENTIAL_KEY: &str = "accessToken";
const DEFAULT_DATA_DIR: &str = ".stockwatch";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Stockwatch client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, always ending in `/`
    pub api_url: Url,
    /// Key of the credential slot
    pub credential_key: String,
    /// Directory holding the persistent credential store
    pub data_dir: PathBuf,
    /// Timeout for login, register, validate, logout and reissue
    pub request_timeout: Duration,
    /// Timeout for authenticated calls
    pub auth_timeout: Duration,
    /// Quantity at or below which a product counts as low stock
    pub low_stock_threshold: u32,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(
            &lookup("STOCKWATCH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;

        let credential_key = lookup("STOCKWATCH_CREDENTIAL_KEY")
            .unwrap_or_else(|| DEFAULT_CREDENTIAL_KEY.to_string());
        if credential_key.is_empty()
            || credential_key.contains(['/', '\\'])
            || credential_key.starts_with('.')
        {
            return Err(ConfigError::InvalidEnvVar(
                "STOCKWATCH_CREDENTIAL_KEY".to_string(),
                "must be a plain, non-empty file name".to_string(),
            ));
        }

        let data_dir = lookup("STOCKWATCH_DATA_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);

        let request_timeout = parse_timeout(
            "STOCKWATCH_REQUEST_TIMEOUT_SECS",
            lookup("STOCKWATCH_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let auth_timeout = parse_timeout(
            "STOCKWATCH_AUTH_TIMEOUT_SECS",
            lookup("STOCKWATCH_AUTH_TIMEOUT_SECS"),
            DEFAULT_AUTH_TIMEOUT_SECS,
        )?;

        let low_stock_threshold = match lookup("STOCKWATCH_LOW_STOCK_THRESHOLD") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "STOCKWATCH_LOW_STOCK_THRESHOLD".to_string(),
                    e.to_string(),
                )
            })?,
            None => DEFAULT_LOW_STOCK_THRESHOLD,
        };

        Ok(Self {
            api_url,
            credential_key,
            data_dir,
            request_timeout,
            auth_timeout,
            low_stock_threshold,
        })
    }

    /// Configuration pointing at `api_url` with every other setting defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `api_url` is not an http(s) URL.
    pub fn for_api_url(api_url: &str) -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|_| None)?;
        config.api_url = parse_api_url(api_url)?;
        Ok(config)
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid =
        |reason: String| ConfigError::InvalidEnvVar("STOCKWATCH_API_URL".to_string(), reason);

    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    // Relative joins only extend the base when its path ends in a slash
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_timeout(key: &str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs = match raw {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?,
        None => default,
    };
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "timeout must be at least one second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}
