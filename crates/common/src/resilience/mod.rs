//! Resilience primitives for transient-failure handling.
//!
//! Provides backoff strategies and retry configuration. The pieces here are
//! deliberately generic: the *caller* decides which failures are retryable,
//! this module only answers "how many attempts" and "how long to wait
//! between them".

pub mod backoff;
pub mod retry;

pub use backoff::BackoffStrategy;
pub use retry::{RetryConfig, RetryConfigBuilder, RetryConfigError};
