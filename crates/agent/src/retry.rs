//! Per-call timeout and bounded retry with jittered exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use steward_core::error::{GatewayError, ImageError, KnowledgeError, ProviderError};
use tracing::{debug, warn};

/// Errors the retry loop can classify and synthesize.
pub trait Retriable: Display {
    /// Whether another attempt could plausibly succeed.
    fn is_retriable(&self) -> bool;

    /// The error reported when a single attempt exceeds its timeout.
    fn timed_out(operation: &str, after: Duration) -> Self;

    /// A wait the remote side asked for before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retriable for ProviderError {
    fn is_retriable(&self) -> bool {
        ProviderError::is_retriable(self)
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        Self::Timeout(format!("{operation} after {}ms", after.as_millis()))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }
}

impl Retriable for KnowledgeError {
    fn is_retriable(&self) -> bool {
        KnowledgeError::is_retriable(self)
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        Self::Timeout(format!("{operation} after {}ms", after.as_millis()))
    }
}

impl Retriable for GatewayError {
    fn is_retriable(&self) -> bool {
        GatewayError::is_retriable(self)
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        Self::Timeout(format!("{operation} after {}ms", after.as_millis()))
    }
}

impl Retriable for ImageError {
    fn is_retriable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Transport { .. } => true,
            Self::Empty(_) => false,
        }
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        Self::Transport {
            url: operation.to_string(),
            reason: format!("timed out after {}ms", after.as_millis()),
        }
    }
}

/// How one kind of external call is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least one.
    pub max_attempts: u32,
    /// Timeout for a single attempt.
    pub call_timeout: Option<Duration>,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay: Duration,
    /// Upper bound of the random delay added to every backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            call_timeout: None,
            base_delay: Duration::from_millis(500),
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self.base_delay.saturating_mul(1u32 << exponent);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        E: Retriable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match self.call_timeout {
                Some(limit) => match tokio::time::timeout(limit, call()).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(E::timed_out(operation, limit)),
                },
                None => call().await,
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retriable() => {
                    warn!(operation, attempt, error = %e, "Call failed permanently");
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(operation, attempts = attempt, error = %e, "Call failed, attempts exhausted");
                    return Err(e);
                }
                Err(e) => {
                    // A server-requested wait overrides a shorter backoff.
                    let backoff = self.backoff(attempt);
                    let delay = e.retry_after().map_or(backoff, |hint| hint.max(backoff));
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_without_jitter() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let policy =
            RetryPolicy::new(3, Duration::from_millis(100)).with_jitter(Duration::from_millis(50));
        for _ in 0..50 {
            let delay = policy.backoff(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let counter = calls.clone();
        let result: Result<&str, ProviderError> = policy
            .run("gate", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProviderError::Network("reset".into()))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_for_retry_after() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = tokio::time::Instant::now();
        let result: Result<&str, ProviderError> = RetryPolicy::new(2, Duration::from_millis(10))
            .run("generate", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ProviderError::RateLimited { retry_after_secs: 30 })
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let limited = ProviderError::RateLimited { retry_after_secs: 4 };
        assert_eq!(Retriable::retry_after(&limited), Some(Duration::from_secs(4)));
        assert_eq!(Retriable::retry_after(&ProviderError::Network("x".into())), None);
        assert_eq!(Retriable::retry_after(&KnowledgeError::Timeout("x".into())), None);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), ProviderError> = RetryPolicy::new(5, Duration::from_millis(10))
            .run("select", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Schema("missing field".into()))
                }
            })
            .await;
        assert!(matches!(result, Err(ProviderError::Schema(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out_and_exhaust() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let policy = RetryPolicy::new(2, Duration::from_millis(10))
            .with_call_timeout(Duration::from_secs(1));
        let result: Result<(), KnowledgeError> = policy
            .run("load", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            })
            .await;
        assert!(matches!(result, Err(KnowledgeError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn image_errors_classified() {
        let server = ImageError::Status {
            url: "u".into(),
            status: 503,
        };
        let missing = ImageError::Status {
            url: "u".into(),
            status: 404,
        };
        assert!(Retriable::is_retriable(&server));
        assert!(!Retriable::is_retriable(&missing));
        assert!(!Retriable::is_retriable(&ImageError::Empty("u".into())));
    }
}
