// src/provider/retry.rs — Retry with exponential backoff for oracle calls
//
// Wraps any Oracle with automatic retry on transient failures.
// Retries: rate limits (429), server errors (5xx), timeouts, connection resets.
// Does NOT retry: bad request, auth errors, malformed response bodies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionRequest, Oracle};
use crate::infra::errors::RedraftError;

const MAX_RETRIES: u32 = 8;
const INITIAL_DELAY_MS: u64 = 2_000;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.2;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

/// An oracle wrapper that adds retry with exponential backoff.
pub struct RetryOracle {
    inner: Arc<dyn Oracle>,
    config: RetryConfig,
}

impl RetryOracle {
    pub fn new(inner: Arc<dyn Oracle>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn Oracle>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Calculate the delay for a given retry attempt (0-indexed).
    fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        // If the server told us how long to wait, use that (with a small buffer).
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay + Duration::from_millis(100);
        }

        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.config.jitter_fraction);
        let final_ms = (capped_ms * jitter).max(100.0);

        Duration::from_millis(final_ms as u64)
    }
}

/// Extract rate-limit retry delay from the error, if available.
fn rate_limit_delay(error: &RedraftError) -> Option<Duration> {
    match error {
        RedraftError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in tests.
/// Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64; // 0.0..1.0
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[async_trait]
impl Oracle for RetryOracle {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, RedraftError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.inner.complete(request.clone()).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if !e.is_retriable() || attempt == self.config.max_retries {
                        return Err(e);
                    }

                    let rl_delay = rate_limit_delay(&e);
                    let delay = self.delay_for_attempt(attempt, rl_delay);

                    tracing::warn!(
                        provider = self.inner.id(),
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {}",
                        e
                    );

                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(RedraftError::Provider {
            provider: self.inner.id().to_string(),
            message: "All retries exhausted".into(),
            retriable: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retriable_rate_limited() {
        let err = RedraftError::RateLimited {
            provider: "test".into(),
            retry_after_ms: 5000,
        };
        assert!(err.is_retriable());
    }

    #[test]
    fn test_is_retriable_provider_flag() {
        let retriable = RedraftError::Provider {
            provider: "test".into(),
            message: "HTTP 500".into(),
            retriable: true,
        };
        let terminal = RedraftError::Provider {
            provider: "test".into(),
            message: "HTTP 400 bad request".into(),
            retriable: false,
        };
        assert!(retriable.is_retriable());
        assert!(!terminal.is_retriable());
    }

    #[test]
    fn test_rate_limit_delay_extraction() {
        let err = RedraftError::RateLimited {
            provider: "test".into(),
            retry_after_ms: 3000,
        };
        assert_eq!(rate_limit_delay(&err), Some(Duration::from_millis(3000)));
    }

    #[test]
    fn test_rate_limit_delay_zero() {
        let err = RedraftError::RateLimited {
            provider: "test".into(),
            retry_after_ms: 0,
        };
        assert!(rate_limit_delay(&err).is_none());
    }

    #[test]
    fn test_delay_for_attempt_exponential() {
        let oracle = RetryOracle::new(Arc::new(DummyOracle));
        let d0 = oracle.delay_for_attempt(0, None);
        let d1 = oracle.delay_for_attempt(1, None);
        let d2 = oracle.delay_for_attempt(2, None);

        // d0 ≈ 2000ms, d1 ≈ 4000ms, d2 ≈ 8000ms, within jitter bounds
        assert!(d0.as_millis() >= 1500 && d0.as_millis() <= 2500);
        assert!(d1.as_millis() >= 3000 && d1.as_millis() <= 5000);
        assert!(d2.as_millis() >= 6000 && d2.as_millis() <= 10000);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let oracle = RetryOracle::new(Arc::new(DummyOracle));
        let d = oracle.delay_for_attempt(10, None);
        assert!(d.as_millis() <= 36_000); // max + jitter margin
    }

    #[test]
    fn test_delay_uses_rate_limit_hint() {
        let oracle = RetryOracle::new(Arc::new(DummyOracle));
        let d = oracle.delay_for_attempt(0, Some(Duration::from_millis(10_000)));
        assert_eq!(d.as_millis(), 10_100);
    }

    #[test]
    fn test_deterministic_jitter_range() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!((0.8..=1.2).contains(&j), "jitter {j} out of range for attempt {attempt}");
        }
    }

    struct DummyOracle;

    #[async_trait]
    impl Oracle for DummyOracle {
        fn id(&self) -> &str {
            "dummy"
        }
        async fn complete(&self, _req: CompletionRequest) -> Result<String, RedraftError> {
            Err(RedraftError::NoProvider)
        }
    }
}
