//! Bounded retries with a per-attempt timeout and linear backoff.
//!
//! ```text
//! attempt 1 ── fail ── wait 1 × step ──▶ attempt 2 ── fail ── wait 2 × step ──▶ attempt 3
//! ```
//!
//! Only errors for which [`ClientError::is_retryable`] holds are retried.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Each attempt is abandoned after this long.
    pub attempt_timeout: Duration,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, attempt_timeout: Duration, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            attempt_timeout,
            backoff_step,
        }
    }

    /// Wait after a failed attempt (1-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy runs out.
/// `op` receives the 1-indexed attempt number.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let result = match timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(policy.attempt_timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= policy.max_attempts => {
                warn!("Giving up after {} attempts: {}", attempt, e);
                return Err(e);
            }
            Err(e) => {
                let wait = policy.backoff(attempt);
                debug!("Attempt {} failed ({}), retrying in {:?}", attempt, e, wait);
                sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
