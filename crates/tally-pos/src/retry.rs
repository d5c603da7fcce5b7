//! # Retry Helper
//!
//! Exponential backoff for idempotent reads.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt 1 ──✗ transient──► sleep ~base ──► attempt 2 ──✗──► sleep ~2×  │
//! │      │                                          │                       │
//! │      ✓ / permanent error → return               ✓ → return              │
//! │                                                                         │
//! │  Gives up after `max_attempts`, returning the last error.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only wrap reads. A retried checkout or receiving call could record a
//! second sale or a second audit.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::warn;

use crate::config::RetrySettings;
use crate::error::{PosError, PosResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        RetryPolicy {
            max_attempts: settings.attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// Errors for which [`PosError::is_retryable`] is false are returned at once.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> PosResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PosResult<T>>,
{
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.base_delay)
        .with_max_interval(policy.max_delay)
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 0u32;

    backoff::future::retry(backoff, || {
        attempt += 1;
        let current = attempt;
        let fut = op();

        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(err) if err.is_retryable() && current < policy.max_attempts => {
                    warn!(attempt = current, error = %err, "Transient failure, retrying");
                    Err(backoff::Error::transient(err))
                }
                Err(err) => Err(backoff::Error::<PosError>::permanent(err)),
            }
        }
    })
    .await
}
