//! Retry utilities with exponential backoff
//!
//! Used around calls to the language model, where a transient network error or
//! a 5xx should not cost the user their reply.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

const LOG_TARGET: &str = "util::retry";

/// Configuration for retry behavior
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// No new attempt is started once this much time has elapsed
    pub deadline: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(2),
            deadline: None,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            ..Default::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay after the given (1-based) failed attempt.
    pub(crate) fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let delay = Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64);
        delay.min(self.max_delay)
    }
}

/// Retry `f` with exponential backoff while `is_retryable` accepts the error.
///
/// `min_attempt_time` is how long one more attempt needs to be worthwhile; it
/// is checked against the configured deadline before sleeping.
pub async fn retry_with_backoff<F, T, E, Fut>(
    config: &RetryConfig,
    min_attempt_time: Duration,
    mut f: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match f().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(target: LOG_TARGET, attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if attempt >= max_attempts || !is_retryable(&err) {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt);
        if let Some(deadline) = config.deadline {
            if started.elapsed() + delay + min_attempt_time > deadline {
                warn!(
                    target: LOG_TARGET,
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "deadline reached, giving up"
                );
                return Err(err);
            }
        }

        warn!(
            target: LOG_TARGET,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "operation failed, retrying"
        );
        sleep(delay).await;
        attempt += 1;
    }
}

/// Check if an HTTP status is worth retrying
pub fn is_http_retryable(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_config_delay_calculation() {
        let config = RetryConfig::new(5, Duration::from_millis(100));

        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn test_retry_config_max_delay() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 10.0,
            max_delay: Duration::from_secs(1),
            deadline: None,
        };

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(1));
    }

    #[test]
    fn test_is_http_retryable() {
        assert!(is_http_retryable(500));
        assert!(is_http_retryable(503));
        assert!(is_http_retryable(429));
        assert!(is_http_retryable(408));
        assert!(!is_http_retryable(400));
        assert!(!is_http_retryable(401));
        assert!(!is_http_retryable(404));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(3, Duration::from_millis(10));
        let result: Result<u32, &str> = retry_with_backoff(
            &config,
            Duration::ZERO,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("flaky")
                    } else {
                        Ok(n)
                    }
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(5, Duration::from_millis(10));
        let result: Result<(), &str> = retry_with_backoff(
            &config,
            Duration::ZERO,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("unauthorized") }
            },
            |_| false,
        )
        .await;
        assert_eq!(result, Err("unauthorized"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_retries_short() {
        let calls = AtomicU32::new(0);
        let config =
            RetryConfig::new(10, Duration::from_millis(400)).with_deadline(Duration::from_secs(1));
        let result: Result<(), &str> = retry_with_backoff(
            &config,
            Duration::from_millis(300),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("timeout") }
            },
            |_| true,
        )
        .await;
        assert!(result.is_err());
        // 0ms: attempt 1, +400ms: attempt 2, next would need 800ms + 300ms > 1s
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
