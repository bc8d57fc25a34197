//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CARTWHEEL_API_BASE_URL` - Base URL of the cart endpoint (e.g.,
//!   <https://public-api.example.com/rest/v1>)
//! - `CARTWHEEL_API_TOKEN` - Bearer token for the cart endpoint
//!
//! ## Optional
//! - `CARTWHEEL_DEBOUNCE_MS` - Delay between a mutation and the revalidation
//!   round trip (default: 50)
//! - `CARTWHEEL_REQUEST_TIMEOUT_SECS` - Per-request HTTP timeout (default: 30)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_DEBOUNCE_MS: u64 = 50;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart synchronization engine configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct CartSyncConfig {
    /// Base URL of the cart endpoint.
    pub api_base_url: Url,
    /// Bearer token for the cart endpoint.
    pub api_token: SecretString,
    /// Delay between a mutation and the revalidation round trip.
    pub revalidation_debounce: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for CartSyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSyncConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("api_token", &"[REDACTED]")
            .field("revalidation_debounce", &self.revalidation_debounce)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl CartSyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_base_url(&require_env("CARTWHEEL_API_BASE_URL")?)?;
        let api_token = SecretString::from(require_env("CARTWHEEL_API_TOKEN")?);
        let revalidation_debounce = Duration::from_millis(parse_optional_env(
            "CARTWHEEL_DEBOUNCE_MS",
            DEFAULT_DEBOUNCE_MS,
        )?);
        let request_timeout = Duration::from_secs(parse_optional_env(
            "CARTWHEEL_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);

        Ok(Self {
            api_base_url,
            api_token,
            revalidation_debounce,
            request_timeout,
        })
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_optional_env(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidEnvVar(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("CARTWHEEL_API_BASE_URL".to_string(), e.to_string())
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "CARTWHEEL_API_BASE_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}
