//! Retry with exponential backoff.
//!
//! Used for every API call and every asset fetch. `RetryConfig::attempts`
//! counts total attempts, so `attempts = 3` means one try and two retries.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::Error;

/// Errors that can tell whether another attempt might succeed.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        Error::is_retryable(self)
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
///
/// Returns the last error when every attempt failed.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let attempts = config.attempts.max(1);
    let mut attempt = 1;
    let mut delay = config.initial_delay();

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempts = attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                let wait = if config.jitter { add_jitter(delay) } else { delay };
                let wait = wait.min(config.max_delay());
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = wait.as_millis() as u64,
                    "Attempt failed, retrying"
                );

                tokio::time::sleep(wait).await;

                attempt += 1;
                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::debug!(error = %e, attempts = attempt, "Retries exhausted");
                }
                return Err(e);
            }
        }
    }
}

/// Clamped in `f64` so huge or non-finite products never reach `Duration`.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    let max = config.max_delay();
    let next = delay.as_secs_f64() * config.multiplier;
    if next.is_finite() && next < max.as_secs_f64() {
        Duration::from_secs_f64(next.max(0.0))
    } else {
        max
    }
}

/// Stretch `delay` by a random 0..100%.
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient"),
                TestError::Permanent => write!(f, "permanent"),
            }
        }
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
            jitter: false,
        }
    }

    async fn fail_times(config: &RetryConfig, failures: u32) -> (Result<u32, TestError>, u32) {
        let calls = Arc::new(AtomicU32::new(0));
        let result = with_retry(config, || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(TestError::Transient)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_succeeds_on_last_attempt() {
        let (result, calls) = fail_times(&fast(3), 2).await;
        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_attempts_is_total_cap() {
        let (result, calls) = fail_times(&fast(3), 3).await;
        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = with_retry(&fast(5), || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Permanent)
            }
        })
        .await;
        assert!(matches!(result, Err(TestError::Permanent)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 3000,
            multiplier: 4.0,
            ..Default::default()
        };
        let second = next_delay(config.initial_delay(), &config);
        assert_eq!(second, Duration::from_millis(3000));
    }

    #[test]
    fn test_huge_multiplier_hits_cap() {
        for multiplier in [1e20, f64::INFINITY, f64::NAN] {
            let config = RetryConfig {
                initial_delay_ms: 1000,
                max_delay_ms: 10_000,
                multiplier,
                ..Default::default()
            };
            let second = next_delay(config.initial_delay(), &config);
            assert_eq!(second, Duration::from_millis(10_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_multiplier_retries_without_panic() {
        let config = RetryConfig {
            attempts: 4,
            initial_delay_ms: 10,
            max_delay_ms: 50,
            multiplier: 1e20,
            jitter: true,
        };
        let start = tokio::time::Instant::now();
        let (result, calls) = fail_times(&config, 3).await;
        assert!(result.is_ok());
        assert_eq!(calls, 4);
        // 10ms then two capped waits; jitter never pushes past the cap.
        assert!(start.elapsed() <= Duration::from_millis(10 * 2 + 50 + 50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_never_exceeds_cap() {
        let config = RetryConfig {
            attempts: 6,
            initial_delay_ms: 100,
            max_delay_ms: 100,
            multiplier: 2.0,
            jitter: true,
        };
        let start = tokio::time::Instant::now();
        let (result, _) = fail_times(&config, 5).await;
        assert!(result.is_ok());
        assert!(start.elapsed() <= Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(100);
        for _ in 0..50 {
            let d = add_jitter(base);
            assert!(d >= base && d <= base * 2);
        }
    }
}
