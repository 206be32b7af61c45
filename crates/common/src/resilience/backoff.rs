//! Backoff strategies for spacing retry attempts.

use std::time::Duration;

/// Strategy for calculating the delay before a retry attempt.
///
/// Every strategy is monotonically non-decreasing in the attempt number, so
/// a later retry never waits less than an earlier one.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Linear backoff: initial_delay + (attempt * increment)
    Linear {
        initial_delay: Duration,
        increment: Duration,
    },
    /// Exponential backoff: initial_delay * base^attempt, capped at max_delay
    Exponential {
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate the delay before the retry following `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Linear { initial_delay, increment } => {
                *initial_delay + increment.saturating_mul(attempt)
            }
            Self::Exponential { initial_delay, base, max_delay } => {
                let delay = initial_delay.as_millis() as f64 * base.powi(attempt as i32);
                let delay_ms = delay.min(max_delay.as_millis() as f64) as u64;
                Duration::from_millis(delay_ms)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay: Duration::from_millis(300),
            base: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}
