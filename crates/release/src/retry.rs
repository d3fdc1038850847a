//! Retry logic with exponential backoff for outbound provider calls.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder, backoff::Backoff};
use std::future::Future;
use std::time::Duration;

const MAX_DELAY: Duration = Duration::from_secs(300);

const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const TRANSIENT_PATTERNS: [&str; 7] = [
    "rate limit",
    "throttl",
    "timeout",
    "timed out",
    "econnreset",
    "connection reset",
    "socket hang up",
];

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Deterministic doubling schedule starting at `base_delay`.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_randomization_factor(0.0)
            .with_multiplier(2.0)
            .with_max_interval(MAX_DELAY)
            .with_max_elapsed_time(None) // bounded by max_retries
            .build()
    }
}

/// Whether an error is worth retrying.
#[must_use]
pub fn is_transient(error: &Error) -> bool {
    match error.root_cause() {
        Error::Http {
            status: Some(status),
            ..
        } if TRANSIENT_STATUSES.contains(status) => true,
        other => {
            let message = other.to_string().to_lowercase();
            TRANSIENT_PATTERNS.iter().any(|p| message.contains(p))
        }
    }
}

/// Execute an operation with retry logic
///
/// # Errors
///
/// Returns the first non-transient error, or the last error once the retry
/// budget is spent.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = policy.backoff();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= policy.max_retries || !is_transient(&e) => return Err(e),
            Err(e) => {
                let Some(delay) = backoff.next_backoff() else {
                    return Err(e);
                };
                attempt += 1;
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Transient failure; retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
