//! API-specific error types.
//!
//! Classifies API failures and maps them to the fixed user-facing strings
//! the UI layer branches on.

use thiserror::Error;

/// Message surfaced for transport-level failures (network unreachable, DNS
/// failure, abort before any response).
pub const CONNECTION_ERROR: &str = "connection error";

/// Message surfaced when the backend rejects the session credential (401).
pub const SESSION_EXPIRED: &str = "session expired";

/// Fallback when an error response carries no usable message.
const GENERIC_FAILURE: &str = "request failed";

/// Categories of API errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401) - terminal, session is torn down
    Authentication,
    /// Rate limiting errors (429) - retried with backoff
    RateLimit,
    /// Server errors (5xx) - surfaced without retry
    Server,
    /// Client errors (4xx except auth/rate-limit) - surfaced without retry
    Client,
    /// Network/connection errors - surfaced without retry
    Network,
    /// Configuration errors - non-retryable
    Config,
}

/// API operation errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Get the error category for this error.
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::RateLimit(_) => ApiErrorCategory::RateLimit,
            Self::Server(_) => ApiErrorCategory::Server,
            Self::Client(_) => ApiErrorCategory::Client,
            Self::Network(_) => ApiErrorCategory::Network,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// Whether this error qualifies for an automatic retry.
    ///
    /// Only rate limiting is transient from the client's point of view:
    /// transport failures and 401s are terminal, other statuses surface on
    /// the first attempt.
    pub fn should_retry(&self) -> bool {
        self.category() == ApiErrorCategory::RateLimit
    }

    /// The string handed to UI code through the envelope.
    ///
    /// Transport failures and expired sessions map to fixed strings the
    /// caller matches on; everything else carries the normalized server
    /// message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => CONNECTION_ERROR.to_string(),
            Self::Auth(_) => SESSION_EXPIRED.to_string(),
            Self::RateLimit(msg)
            | Self::Server(msg)
            | Self::Client(msg)
            | Self::Config(msg) => msg.clone(),
        }
    }
}

/// Extract a human-readable message from a server error body.
///
/// The backend is duck-typed about its error shape, so normalization uses a
/// fixed precedence: `error` field, then `message` field, then a generic
/// fallback. Non-JSON or non-string fields fall through to the fallback.
pub(crate) fn server_message(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return GENERIC_FAILURE.to_string();
    };

    for key in ["error", "message"] {
        if let Some(message) = value.get(key).and_then(serde_json::Value::as_str) {
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }

    GENERIC_FAILURE.to_string()
}
