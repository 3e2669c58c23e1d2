//! Retry with linear backoff for file operations.
//!
//! Contention comes from other processes holding package files open, so
//! the policy is short and linear: attempt `n` that fails waits
//! `backoff_step * n` before the next one. Sleeping goes through a
//! [`Sleeper`] so the policy can be tested without real timing.

use crate::config::FileOpsConfig;
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget and backoff step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: FileOpsConfig::MAX_ATTEMPTS,
            backoff_step: FileOpsConfig::BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    /// Delay after failed attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Source of backoff sleeps.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Statistics about a retried operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
    pub success: bool,
    pub last_error: Option<String>,
}

/// Errors worth another attempt: locks, sharing violations and other
/// transient IO. A missing file or a bad argument will not get better.
pub fn is_transient(err: &io::Error) -> bool {
    !matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput
    )
}

/// Run a blocking filesystem call under the retry policy.
pub async fn retry_io<T, F>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    what: &str,
    mut operation: F,
) -> (io::Result<T>, RetryStats)
where
    F: FnMut() -> io::Result<T>,
{
    let mut stats = RetryStats::default();
    let mut attempt = 1;

    loop {
        stats.attempts = attempt;
        match operation() {
            Ok(value) => {
                stats.success = true;
                if attempt > 1 {
                    debug!("{} succeeded after {} attempts", what, attempt);
                }
                return (Ok(value), stats);
            }
            Err(e) => {
                stats.last_error = Some(e.to_string());
                if !is_transient(&e) {
                    debug!("{} failed permanently: {}", what, e);
                    return (Err(e), stats);
                }
                if attempt >= policy.max_attempts {
                    warn!(
                        "{}: all {} attempts exhausted. Last error: {}",
                        what, policy.max_attempts, e
                    );
                    return (Err(e), stats);
                }

                let delay = policy.delay_for(attempt);
                stats.total_delay += delay;
                warn!(
                    "{}: attempt {}/{} failed: {}. Retrying in {:?}",
                    what, attempt, policy.max_attempts, e, delay
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSleeper;
    use super::*;

    fn locked() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "file in use")
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(4), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let (result, stats) = retry_io(&RetryPolicy::default(), &sleeper, "rename", || {
            calls += 1;
            if calls < 3 {
                Err(locked())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(stats.attempts, 3);
        assert!(stats.success);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let sleeper = RecordingSleeper::default();
        let (result, stats) =
            retry_io::<(), _>(&RetryPolicy::default(), &sleeper, "delete", || Err(locked())).await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 5);
        assert_eq!(stats.total_delay, Duration::from_millis(500));
        assert_eq!(sleeper.recorded().len(), 4);
        assert_eq!(stats.last_error.as_deref(), Some("file in use"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let sleeper = RecordingSleeper::default();
        let (result, stats) = retry_io::<(), _>(&RetryPolicy::default(), &sleeper, "delete", || {
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 1);
        assert!(sleeper.recorded().is_empty());
    }
}
