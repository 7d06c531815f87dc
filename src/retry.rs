//! Exponential backoff with jitter for transient Discord API failures.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::discord::{DiscordError, NetworkErrorKind};
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), before jitter.
    /// Doubles per attempt and is clamped to `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// Adds uniform jitter in `[0, delay / 2]`.
    pub fn with_jitter(&self, delay: Duration) -> Duration {
        let max_jitter = (delay / 2).as_millis() as u64;
        if max_jitter == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=max_jitter);
        delay + Duration::from_millis(jitter)
    }
}

/// Transient iff rate-limited, a server error, or a network timeout/temporary failure.
pub fn is_transient(err: &DiscordError) -> bool {
    match err {
        DiscordError::Status { status, .. } => *status == 429 || *status >= 500,
        DiscordError::Network { kind, .. } => {
            matches!(kind, NetworkErrorKind::Timeout | NetworkErrorKind::Temporary)
        }
        DiscordError::InvalidId { .. } | DiscordError::Other { .. } => false,
    }
}

/// Runs `op` until it succeeds, fails terminally, exhausts the policy, or
/// shutdown is triggered. Cancellation abandons the call without retrying.
pub async fn retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    shutdown: &Shutdown,
    operation: &str,
    mut op: F,
    classify: C,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !classify(&err) {
                    debug!(operation, attempt, "Terminal failure: {}", err);
                    return Err(err);
                }
                if attempt >= policy.max_attempts {
                    warn!(operation, attempt, "Giving up after transient failures: {}", err);
                    return Err(err);
                }
                if shutdown.is_triggered() {
                    debug!(operation, "Shutdown in progress, not retrying");
                    return Err(err);
                }

                let delay = policy.with_jitter(policy.backoff(attempt));
                debug!(operation, attempt, ?delay, "Transient failure, retrying: {}", err);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => {
                        debug!(operation, "Shutdown during backoff, abandoning");
                        return Err(err);
                    }
                }
                attempt += 1;
            }
        }
    }
}
