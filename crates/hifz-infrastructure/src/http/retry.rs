use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// HTTP retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds (default: 1000ms)
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds (default: 10000ms)
    pub max_backoff_ms: u64,
    /// Backoff multiplier (default: 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn next_backoff(&self, backoff_ms: u64) -> u64 {
        ((backoff_ms as f64 * self.backoff_multiplier) as u64).min(self.max_backoff_ms)
    }
}

/// Run `request_fn` until it succeeds, fails with a non-retryable error, or
/// the attempt ceiling is reached. The last error is returned as is.
pub async fn execute_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut request_fn: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    let mut backoff_ms = config.initial_backoff_ms;

    loop {
        attempt += 1;

        match request_fn().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded after {} attempts", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                let should_retry = attempt <= config.max_retries && is_retryable(&e);

                if !should_retry {
                    if attempt > config.max_retries && config.max_retries > 0 {
                        warn!("{} failed after {} attempts: {}", operation_name, attempt, e);
                    }
                    return Err(e);
                }

                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {}ms...",
                    operation_name,
                    attempt,
                    config.max_retries + 1,
                    e,
                    backoff_ms
                );
                sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = config.next_backoff(backoff_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn retryable(e: &TestError) -> bool {
        matches!(e, TestError::Transient)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.next_backoff(1000), 2000);
        assert_eq!(config.next_backoff(8000), 10000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, TestError> = execute_with_retry(
            &RetryConfig::default(),
            "flaky",
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(TestError::Transient)
                } else {
                    Ok(n)
                }
            },
            retryable,
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_ceiling() {
        let calls = AtomicU32::new(0);

        let result: Result<(), TestError> = execute_with_retry(
            &RetryConfig::default(),
            "down",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Transient)
            },
            retryable,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_does_not_retry_fatal_errors() {
        let calls = AtomicU32::new(0);

        let result: Result<(), TestError> = execute_with_retry(
            &RetryConfig::default(),
            "rejected",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Fatal)
            },
            retryable,
        )
        .await;

        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
