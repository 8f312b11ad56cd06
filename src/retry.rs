use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one); 0 is treated as 1
    pub max_attempts: u32,
    /// Initial delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles the delay each time)
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// Set the maximum delay between retries
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Preset: package index fetch (3 attempts)
    /// Delays: 1s, 2s = 3s total wait time
    pub fn index_fetch() -> Self {
        Self::new(3, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(2.0)
    }

    /// Preset: package artifact download (3 attempts, longer pauses)
    /// Delays: 2s, 4s = 6s total wait time
    pub fn download() -> Self {
        Self::new(3, Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(10))
            .with_backoff_multiplier(2.0)
    }

    /// Preset: a single attempt, no retries
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Calculate the delay for a given attempt number (0-indexed)
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::index_fetch()
    }
}

/// Execute an async operation with retries, using a predicate to determine if retry is appropriate
///
/// Errors the predicate rejects (like 4xx client errors) are returned immediately.
/// When every attempt fails, the last error is returned.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.attempts();
    let mut attempt = 0;

    loop {
        // Wait before retry (except for first attempt)
        let delay = config.delay_for_attempt(attempt);
        if !delay.is_zero() {
            debug!(
                "{}: Retry attempt {}/{} after {:?}",
                operation_name,
                attempt + 1,
                max_attempts,
                delay
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        "{}: Succeeded on attempt {}/{}",
                        operation_name,
                        attempt + 1,
                        max_attempts
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    debug!(
                        "{}: Error is not retryable, failing immediately: {}",
                        operation_name, e
                    );
                    return Err(e);
                }

                let remaining = max_attempts - attempt - 1;
                if remaining == 0 {
                    warn!(
                        "{}: All {} attempts failed. Last error: {}",
                        operation_name, max_attempts, e
                    );
                    return Err(e);
                }

                warn!(
                    "{}: Attempt {}/{} failed ({}), {} retries remaining",
                    operation_name,
                    attempt + 1,
                    max_attempts,
                    e,
                    remaining
                );
                attempt += 1;
            }
        }
    }
}

/// Non-success HTTP status returned by a remote endpoint
#[derive(Debug, thiserror::Error)]
#[error("{url} returned {status}")]
pub struct UnexpectedStatus {
    pub url: String,
    pub status: reqwest::StatusCode,
}

/// Retry 429 and 5xx responses plus transport failures; other 4xx fail fast
pub fn is_retryable_http_error(error: &anyhow::Error) -> bool {
    if let Some(status) = error.downcast_ref::<UnexpectedStatus>() {
        return status.status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status.status.is_server_error();
    }

    // Malformed bodies will not fix themselves
    if error.downcast_ref::<serde_json::Error>().is_some() {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_retry_config_download() {
        let config = RetryConfig::download();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(2));
        assert_eq!(config.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_retry_config_once() {
        let config = RetryConfig::once();
        assert_eq!(config.attempts(), 1);
    }

    #[test]
    fn test_zero_attempts_treated_as_one() {
        let config = RetryConfig::new(0, Duration::from_millis(1));
        assert_eq!(config.attempts(), 1);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::new(4, Duration::from_secs(1)).with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_respects_max() {
        let config = RetryConfig::new(10, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(3))
            .with_backoff_multiplier(2.0);

        // Attempt 4 would be 8 seconds, but max is 3
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(3));
    }

    // ==================== with_retry_if Tests ====================

    /// Run `with_retry_if` over a scripted series of outcomes, returning the
    /// result and how many attempts were made
    async fn run_script(
        script: Vec<Result<&'static str, anyhow::Error>>,
    ) -> (Result<&'static str, anyhow::Error>, u32) {
        let config = RetryConfig::new(4, Duration::from_millis(1));
        let script = std::sync::Mutex::new(script.into_iter());
        let attempts = AtomicU32::new(0);

        let result = with_retry_if(
            &config,
            "Scripted fetch",
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                let next = script
                    .lock()
                    .unwrap()
                    .next()
                    .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")));
                async move { next }
            },
            is_retryable_http_error,
        )
        .await;

        (result, attempts.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_with_retry_if_first_attempt_wins() {
        let (result, attempts) = run_script(vec![Ok("index")]).await;

        assert_eq!(result.unwrap(), "index");
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_with_retry_if_recovers_from_server_errors() {
        let (result, attempts) = run_script(vec![
            Err(status_error(503)),
            Err(anyhow::anyhow!("connection reset")),
            Ok("index"),
        ])
        .await;

        assert_eq!(result.unwrap(), "index");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_with_retry_if_gives_up_on_missing_package() {
        let (result, attempts) =
            run_script(vec![Err(status_error(404)), Ok("never reached")]).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_with_retry_if_returns_last_error_when_exhausted() {
        let (result, attempts) = run_script(vec![
            Err(status_error(500)),
            Err(status_error(502)),
            Err(status_error(503)),
            Err(status_error(504)),
        ])
        .await;

        assert!(result.unwrap_err().to_string().contains("504"));
        assert_eq!(attempts, 4);
    }

    // ==================== is_retryable_http_error Tests ====================

    fn status_error(status: u16) -> anyhow::Error {
        anyhow::Error::new(UnexpectedStatus {
            url: "http://example.com/index.json".to_string(),
            status: reqwest::StatusCode::from_u16(status).unwrap(),
        })
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_http_error(&status_error(500)));
        assert!(is_retryable_http_error(&status_error(503)));
        assert!(is_retryable_http_error(&status_error(429)));
    }

    #[test]
    fn test_client_errors_not_retryable() {
        assert!(!is_retryable_http_error(&status_error(400)));
        assert!(!is_retryable_http_error(&status_error(404)));
    }

    #[test]
    fn test_status_error_with_context_still_detected() {
        let err = status_error(404).context("Failed to fetch package index");
        assert!(!is_retryable_http_error(&err));
    }

    #[test]
    fn test_parse_errors_not_retryable() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(!is_retryable_http_error(&anyhow::Error::new(parse)));
    }

    #[test]
    fn test_other_errors_retryable() {
        assert!(is_retryable_http_error(&anyhow::anyhow!("connection reset")));
    }
}
