//! Deployment configuration.
//!
//! Loads client configuration from environment variables with sensible
//! defaults for local development.
//!
//! ## Environment Variables
//! - `CAMPUS_API_BASE_URL`: API origin including any path prefix
//!   (e.g., `https://api.campus.example/v1`)
//! - `CAMPUS_API_TIMEOUT_SECS`: per-request timeout in seconds
//! - `CAMPUS_API_RETRY_ATTEMPTS`: total attempts for rate-limited calls

use std::time::Duration;

use campus_common::resilience::RetryConfig;
use tracing::{debug, info};

use crate::api::ApiError;

/// Configuration for the API fetch client.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for the API. Paths passed to the client are appended to
    /// this value; callers must not double-prefix it.
    pub base_url: String,
    /// Timeout for API requests.
    pub timeout: Duration,
    /// Retry policy for rate-limited (429) responses.
    pub retry: RetryConfig,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.campus.example/v1".to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

impl ApiClientConfig {
    /// Load configuration, preferring environment variables and falling
    /// back to defaults for anything unset.
    pub fn load() -> Result<Self, ApiError> {
        match Self::from_env() {
            Ok(config) => {
                info!("API configuration loaded from environment variables");
                Ok(config)
            }
            Err(e) => {
                debug!(error = ?e, "incomplete environment, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `CAMPUS_API_BASE_URL` is required; the remaining variables fall back
    /// to defaults when unset.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the base URL is missing or a numeric
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ApiError> {
        let base_url = std::env::var("CAMPUS_API_BASE_URL")
            .map_err(|_| ApiError::Config("CAMPUS_API_BASE_URL not set".to_string()))?;

        let defaults = Self::default();

        let timeout = match std::env::var("CAMPUS_API_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|e| {
                ApiError::Config(format!("Invalid CAMPUS_API_TIMEOUT_SECS: {e}"))
            })?),
            Err(_) => defaults.timeout,
        };

        let retry = match std::env::var("CAMPUS_API_RETRY_ATTEMPTS") {
            Ok(raw) => {
                let attempts = raw.parse::<u32>().map_err(|e| {
                    ApiError::Config(format!("Invalid CAMPUS_API_RETRY_ATTEMPTS: {e}"))
                })?;
                RetryConfig::builder()
                    .max_attempts(attempts)
                    .build()
                    .map_err(|e| ApiError::Config(e.to_string()))?
            }
            Err(_) => defaults.retry,
        };

        Ok(Self { base_url, timeout, retry })
    }
}
