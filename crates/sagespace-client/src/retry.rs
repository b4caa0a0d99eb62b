/*
[INPUT]:  Fallible async operation and retry options
[OUTPUT]: Operation result after exponential-backoff retries
[POS]:    Utility layer - transient failure handling shared by client and queries
[UPDATE]: When changing backoff formula or retry classification
*/

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Retry budget and base delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for every following retry.
    pub retry_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryOptions {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Delay before retry `k` (0-indexed): `retry_delay * 2^k`.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_index).unwrap_or(u32::MAX);
        self.retry_delay.saturating_mul(factor)
    }
}

/// Classifies an error as transient (worth retrying) or permanent.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Status rule shared by every classifier: 5xx and 429 are transient.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

impl Retryable for reqwest::Error {
    fn is_retryable(&self) -> bool {
        if self.is_timeout() || self.is_connect() || self.is_request() {
            return true;
        }
        self.status()
            .map(|status| is_retryable_status(status.as_u16()))
            .unwrap_or(false)
    }
}

/// Run `operation` with the default classification of its error type.
pub async fn retry<T, E, F, Fut>(operation: F, options: RetryOptions) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with(operation, options, |err: &E| err.is_retryable()).await
}

/// Run `operation` until it succeeds, fails permanently, or the budget runs out.
///
/// A non-retryable error is returned immediately. Otherwise the operation
/// runs at most `max_retries + 1` times and the last error is returned.
pub async fn retry_with<T, E, F, Fut, C>(
    mut operation: F,
    options: RetryOptions,
    retryable: C,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !retryable(&err) {
                    debug!(error = %err, "non-retryable error, giving up");
                    return Err(err);
                }
                if attempt >= options.max_retries {
                    warn!(
                        error = %err,
                        attempts = attempt + 1,
                        "retry budget exhausted"
                    );
                    return Err(err);
                }

                let delay = options.delay_for(attempt);
                warn!(
                    error = %err,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "retryable error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Network,
        Status(u16),
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Network => write!(f, "NetworkError"),
                TestError::Status(code) => write!(f, "HTTP {code}"),
            }
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            match self {
                TestError::Network => true,
                TestError::Status(code) => is_retryable_status(*code),
            }
        }
    }

    fn failing_then_ok(
        failures: u32,
        error: TestError,
    ) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<&'static str, TestError>>)
    {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let op = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                std::future::ready(Err(error.clone()))
            } else {
                std::future::ready(Ok("ok"))
            }
        };
        (calls, op)
    }

    #[test]
    fn test_delay_doubles_per_retry() {
        let options = RetryOptions::new(3, Duration::from_millis(10));
        assert_eq!(options.delay_for(0), Duration::from_millis(10));
        assert_eq!(options.delay_for(1), Duration::from_millis(20));
        assert_eq!(options.delay_for(2), Duration::from_millis(40));
    }

    #[test]
    fn test_default_options() {
        let options = RetryOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_status_classification() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }

    #[tokio::test]
    async fn test_network_errors_then_success() {
        let (calls, op) = failing_then_ok(2, TestError::Network);
        let started = Instant::now();

        let result = retry(op, RetryOptions::new(2, Duration::from_millis(10))).await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let (calls, op) = failing_then_ok(5, TestError::Status(400));

        let result = retry(op, RetryOptions::new(3, Duration::from_millis(1))).await;

        assert_eq!(result, Err(TestError::Status(400)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_retryable_failure_uses_full_budget() {
        for max_retries in 0..4 {
            let (calls, op) = failing_then_ok(u32::MAX, TestError::Status(503));

            let result = retry(op, RetryOptions::new(max_retries, Duration::from_millis(1))).await;

            assert_eq!(result, Err(TestError::Status(503)));
            assert_eq!(calls.load(Ordering::SeqCst), max_retries + 1);
        }
    }

    #[tokio::test]
    async fn test_custom_classifier_overrides_default() {
        let (calls, op) = failing_then_ok(1, TestError::Status(404));

        let result = retry_with(
            op,
            RetryOptions::new(2, Duration::from_millis(1)),
            |err: &TestError| matches!(err, TestError::Status(404)),
        )
        .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
