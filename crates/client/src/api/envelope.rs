//! Uniform result envelope.
//!
//! Every fetch resolves to an [`Envelope`]: `data` on success, `error` on
//! any failure, `loading` false once the call completed. UI code branches on
//! the fields instead of handling exceptions.

use super::errors::ApiError;

/// Uniform `{data, error, loading}` return shape from the fetch client.
///
/// Invariant: a completed envelope carries exactly one of `data`/`error`,
/// never both, and `loading` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub loading: bool,
}

impl<T> Envelope<T> {
    /// Completed envelope carrying a payload.
    pub fn success(data: T) -> Self {
        Self { data: Some(data), error: None, loading: false }
    }

    /// Completed envelope carrying an error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self { data: None, error: Some(message.into()), loading: false }
    }

    /// True when the call completed with a payload.
    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }

    /// Bridge to `Result` for callers that prefer `?`-style handling.
    pub fn into_result(self) -> Result<T, String> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(String::from("request produced no result")),
        }
    }
}

impl<T> From<Result<T, ApiError>> for Envelope<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::failure(err.user_message()),
        }
    }
}
