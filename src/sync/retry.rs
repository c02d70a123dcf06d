//! Retry manager for handling transient failures with exponential backoff
//!
//! This module provides a retry mechanism with full-jitter exponential
//! backoff, `Retry-After` overrides and an observability hook invoked before
//! each sleep.

use crate::config::RetryConfig;
use crate::error::{RetryError, RetryableError};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Immutable backoff policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff before the first retry
    pub base_delay: Duration,
    /// Upper bound on computed backoff
    pub max_delay: Duration,
    /// Growth factor per attempt
    pub backoff_multiplier: f64,
    /// Draw the delay uniformly from `[0, backoff]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

/// Backoff for a zero-based `attempt`: `min(base * mult^attempt, max)`,
/// drawn uniformly from `[0, that]` when jitter is enabled
pub fn calculate_backoff_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let base_ms = policy.base_delay.as_secs_f64() * 1000.0;
    let max_ms = policy.max_delay.as_secs_f64() * 1000.0;
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);

    let mut capped = (base_ms * policy.backoff_multiplier.powi(exponent)).min(max_ms);
    if !capped.is_finite() || capped < 0.0 {
        capped = max_ms;
    }

    let delay_ms = if policy.jitter && capped > 0.0 {
        rand::thread_rng().gen_range(0.0..=capped)
    } else {
        capped
    };

    Duration::from_micros((delay_ms * 1000.0).round() as u64)
}

/// Parse a `Retry-After` header value (delta-seconds or HTTP-date)
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Hook invoked as `(attempt, error, delay)` before each backoff sleep
pub type OnRetry = Arc<dyn Fn(u32, &dyn Display, Duration) + Send + Sync>;

/// Retry manager with exponential backoff support
#[derive(Clone)]
pub struct RetryManager {
    policy: RetryPolicy,
    on_retry: Option<OnRetry>,
}

impl std::fmt::Debug for RetryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryManager")
            .field("policy", &self.policy)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryManager {
    /// Create a new RetryManager with the given configuration
    pub fn new(config: &RetryConfig) -> Self {
        Self::with_policy(RetryPolicy::from(config))
    }

    /// Create a RetryManager from an explicit policy
    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self {
            policy,
            on_retry: None,
        }
    }

    /// Create a RetryManager with default configuration
    pub fn with_defaults() -> Self {
        Self::with_policy(RetryPolicy::default())
    }

    /// Install a hook called before each backoff sleep
    ///
    /// A panicking hook is logged and otherwise ignored.
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(u32, &dyn Display, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Execute an async operation with retry logic
    ///
    /// Errors are classified with [`RetryableError`]; a server-provided
    /// `retry_after` replaces the computed backoff.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Display,
    {
        self.run(operation, E::is_retryable, E::retry_after).await
    }

    /// Execute with a caller-supplied retryability predicate
    pub async fn execute_with<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        self.run(operation, is_retryable, |_: &E| None).await
    }

    async fn run<F, Fut, T, E, P, R>(
        &self,
        operation: F,
        is_retryable: P,
        retry_after: R,
    ) -> Result<T, RetryError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
        R: Fn(&E) -> Option<Duration>,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !is_retryable(&err) {
                        return Err(RetryError::NonRetryable(err));
                    }
                    if attempt >= self.policy.max_retries {
                        warn!(
                            attempts = attempt + 1,
                            max_retries = self.policy.max_retries,
                            error = %err,
                            "Max retries exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            attempts: attempt + 1,
                            last_error: err,
                        });
                    }

                    let backoff = retry_after(&err).unwrap_or_else(|| self.calculate_backoff(attempt));
                    debug!(
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retrying after transient error"
                    );
                    self.notify(attempt + 1, &err, backoff);

                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    fn notify(&self, attempt: u32, err: &dyn Display, delay: Duration) {
        if let Some(hook) = &self.on_retry {
            if catch_unwind(AssertUnwindSafe(|| hook(attempt, err, delay))).is_err() {
                warn!(attempt, "on_retry hook panicked");
            }
        }
    }

    /// Calculate backoff duration for a given zero-based attempt number
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        calculate_backoff_delay(attempt, &self.policy)
    }

    /// Get the retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn policy(max_retries: u32, base_ms: u64, max_ms: u64, jitter: bool) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            backoff_multiplier: 2.0,
            jitter,
        }
    }

    // Test 1: Success on first attempt returns immediately
    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let manager = RetryManager::with_policy(policy(3, 0, 0, false));

        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let result: Result<&str, RetryError<SyncError>> = manager
            .execute(|| {
                let count = call_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok("success")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    // Test 2: Retries on transient error and eventually succeeds
    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failure() {
        let manager = RetryManager::with_policy(policy(3, 100, 1000, false));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<&str, RetryError<SyncError>> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst);
                    if current < 2 {
                        Err(SyncError::NetworkTimeout) // First 2 attempts fail
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    // Test 3: Gives up after max_retries + 1 attempts with the last error
    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let manager = RetryManager::with_policy(policy(2, 10, 100, false));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), RetryError<SyncError>> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(SyncError::NetworkTimeout)
                }
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            RetryError::Exhausted {
                attempts: 3,
                last_error: SyncError::NetworkTimeout,
            }
        );
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    // Test 4: Non-retryable error returns immediately
    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let manager = RetryManager::with_policy(policy(5, 0, 0, false));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), RetryError<SyncError>> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(SyncError::NotFound {
                        endpoint: "/v3/bill".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(RetryError::NonRetryable(SyncError::NotFound { .. }))
        ));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    // Test 5: Exponential backoff without jitter follows the formula exactly
    #[test]
    fn test_exponential_backoff_calculation() {
        let policy = policy(5, 1000, 30_000, false);

        for attempt in 0..10u32 {
            let expected = (1000.0 * 2f64.powi(attempt as i32)).min(30_000.0);
            assert_eq!(
                calculate_backoff_delay(attempt, &policy),
                Duration::from_millis(expected as u64),
                "attempt {}",
                attempt
            );
        }
        assert_eq!(calculate_backoff_delay(4, &policy), Duration::from_secs(16));
        assert_eq!(calculate_backoff_delay(5, &policy), Duration::from_secs(30));
    }

    // Test 6: Huge attempt numbers stay capped
    #[test]
    fn test_backoff_capped_at_max() {
        let policy = policy(10, 10, 60_000, false);
        assert_eq!(calculate_backoff_delay(1_000, &policy), Duration::from_secs(60));
        assert_eq!(
            calculate_backoff_delay(u32::MAX, &policy),
            Duration::from_secs(60)
        );
    }

    // Test 7: Full jitter stays within [0, capped backoff]
    #[test]
    fn test_full_jitter_within_range() {
        let policy = policy(3, 1000, 5000, true);

        let mut below_half = false;
        for _ in 0..500 {
            let backoff = calculate_backoff_delay(2, &policy);
            assert!(backoff <= Duration::from_millis(4000), "{:?}", backoff);
            if backoff < Duration::from_millis(2000) {
                below_half = true;
            }
        }
        // Full jitter reaches below half of the cap, unlike equal jitter
        assert!(below_half);
    }

    // Test 8: Retry-After from the error overrides computed backoff
    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff() {
        let manager = RetryManager::with_policy(policy(2, 1, 1, false));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();
        let start = tokio::time::Instant::now();

        let result: Result<&str, RetryError<SyncError>> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    if count.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(SyncError::RateLimited(5))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    // Test 9: on_retry is called before each sleep with attempt and delay
    #[tokio::test(start_paused = true)]
    async fn test_on_retry_hook_called() {
        let seen: Arc<Mutex<Vec<(u32, String, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let manager = RetryManager::with_policy(policy(2, 100, 1000, false)).on_retry(
            move |attempt, err, delay| {
                seen_clone
                    .lock()
                    .unwrap()
                    .push((attempt, err.to_string(), delay));
            },
        );

        let result: Result<(), RetryError<SyncError>> = manager
            .execute(|| async { Err(SyncError::ConnectionRefused) })
            .await;

        assert_eq!(result.unwrap_err().attempts(), 3);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (1, "Connection refused".to_string(), Duration::from_millis(100)));
        assert_eq!(seen[1].2, Duration::from_millis(200));
    }

    // Test 10: A panicking hook does not change control flow
    #[tokio::test(start_paused = true)]
    async fn test_panicking_hook_is_ignored() {
        let manager = RetryManager::with_policy(policy(1, 10, 10, false))
            .on_retry(|_, _, _| panic!("hook failure"));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<&str, RetryError<SyncError>> = manager
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    if count.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(SyncError::NetworkTimeout)
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
    }

    // Test 11: Caller-supplied predicate decides retryability
    #[tokio::test(start_paused = true)]
    async fn test_execute_with_custom_predicate() {
        let manager = RetryManager::with_policy(policy(4, 10, 100, false));

        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), RetryError<String>> = manager
            .execute_with(
                || {
                    let count = attempt_count_clone.clone();
                    async move {
                        let n = count.fetch_add(1, Ordering::SeqCst);
                        if n < 2 {
                            Err("flaky".to_string())
                        } else {
                            Err("fatal".to_string())
                        }
                    }
                },
                |err: &String| err == "flaky",
            )
            .await;

        assert_eq!(result.unwrap_err(), RetryError::NonRetryable("fatal".to_string()));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    // Test 12: Retry-After parsing for delta-seconds and HTTP dates
    #[test]
    fn test_parse_retry_after() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();

        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("", now), None);
        assert_eq!(parse_retry_after("-5", now), None);
    }

    // Test 13: Policy built from configuration
    #[test]
    fn test_policy_from_config() {
        let manager = RetryManager::new(&RetryConfig::default());
        let policy = manager.policy();

        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert!((policy.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert!(policy.jitter);
    }
}
