//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::traits::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, never less than one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            attempt_timeout: None,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay after `failed_attempts` failures: `base * 2^failed_attempts`
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(failed_attempts))
    }
}

/// How a retry sequence ended without success
#[derive(Debug)]
pub enum RetryFailure {
    /// A non-retryable error stopped the loop early
    Aborted(ExtractError),
    /// Every attempt failed; carries the last error
    Exhausted { attempts: u32, last_error: ExtractError },
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget runs out. `op` receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ExtractError>>,
{
    let mut failed = 0u32;

    loop {
        let attempt = failed + 1;
        let outcome = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, op(attempt)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ExtractError::Timeout(limit.as_secs())),
            },
            None => op(attempt).await,
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Attempt succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => return Err(RetryFailure::Aborted(err)),
            Err(err) => err,
        };

        failed += 1;
        if failed >= policy.max_attempts {
            warn!(attempts = failed, error = %err, "Giving up after retries");
            return Err(RetryFailure::Exhausted {
                attempts: failed,
                last_error: err,
            });
        }

        let delay = policy.delay_for(failed);
        warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "Attempt failed, retrying");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = retry(fast(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(ExtractError::Tool("flaky".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(fast(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractError::Tool("down".into())) }
        })
        .await;

        match result {
            Err(RetryFailure::Exhausted { attempts, last_error }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.to_string().contains("down"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsupported_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(fast(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractError::Unsupported("nope".into())) }
        })
        .await;

        assert!(matches!(result, Err(RetryFailure::Aborted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout_counts_as_failure() {
        let policy = fast(2).with_attempt_timeout(Some(Duration::from_millis(10)));
        let result: Result<(), _> = retry(policy, |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(RetryFailure::Exhausted { attempts, last_error }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(last_error, ExtractError::Timeout(_)));
            }
            other => panic!("expected timeout exhaustion, got {other:?}"),
        }
    }
}
