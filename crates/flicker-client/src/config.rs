use std::time::Duration;

use crate::retry::RetryPolicy;

/// Timing and sizing knobs for [`crate::SyncEngine`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// A feed older than this is refetched.
    pub staleness: Duration,
    /// How often the background ticker checks for staleness.
    pub staleness_check: Duration,
    pub fetch_timeout: Duration,
    /// Stories kept in the persisted feed cache.
    pub cache_limit: usize,
    pub publish_attempts: u32,
    pub publish_timeout: Duration,
    pub flush_attempts: u32,
    /// Linear backoff: the wait after attempt `n` is `n * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::from_secs(45),
            staleness_check: Duration::from_secs(5),
            fetch_timeout: Duration::from_millis(4_500),
            cache_limit: 30,
            publish_attempts: 3,
            publish_timeout: Duration::from_secs(15),
            flush_attempts: 2,
            backoff_step: Duration::from_millis(1_500),
        }
    }
}

impl SyncConfig {
    pub fn publish_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.publish_attempts, self.publish_timeout, self.backoff_step)
    }

    pub fn flush_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.flush_attempts, self.publish_timeout, self.backoff_step)
    }
}
