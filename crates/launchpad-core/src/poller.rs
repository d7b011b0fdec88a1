//! Bounded fixed-interval polling.
//!
//! [`poll_until`] calls a probe until it yields a terminal value or the
//! attempt budget runs out. Running out is reported as
//! [`LaunchError::Timeout`]; probe errors abort immediately.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{LaunchError, Result};

/// Attempts made before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Delay between two attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Attempt budget and delay for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        PollPolicy {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on time spent sleeping
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Poll `probe` until it returns `Ok(Some(_))`.
///
/// A terminal value at attempt N costs N probe calls and N-1 sleeps. With no
/// terminal value the probe is called exactly `max_attempts` times and no
/// sleep follows the last call.
pub async fn poll_until<T, F, Fut>(policy: &PollPolicy, operation: &str, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    debug!(
        operation,
        max_attempts = policy.max_attempts,
        ceiling_secs = policy.ceiling().as_secs(),
        "Polling"
    );
    for attempt in 1..=policy.max_attempts {
        if let Some(value) = probe().await? {
            debug!(operation, attempt, "Polling reached a terminal value");
            return Ok(value);
        }

        debug!(operation, attempt, max_attempts = policy.max_attempts, "Not finished yet");
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(LaunchError::Timeout {
        operation: operation.to_string(),
        attempts: policy.max_attempts,
    })
}
