//! Bounded retry as a recoverer.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::{CourierError, Exception, HeaderKey, Middleware, Recoverer, TransportError};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Status codes that should trigger a retry.
    pub retry_status_codes: Vec<u16>,
    /// Whether to retry on connection errors.
    pub retry_on_connection_error: bool,
    /// Whether to retry on timeout errors.
    pub retry_on_timeout: bool,
    /// Whether a `Retry-After` header on the failed response overrides the backoff.
    pub respect_retry_after: bool,
    /// Upper bound applied to `Retry-After` delays.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(10),
                multiplier: 2.0,
            },
            retry_status_codes: vec![408, 429, 500, 502, 503, 504],
            retry_on_connection_error: true,
            retry_on_timeout: true,
            respect_retry_after: true,
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with exponential backoff.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Exponential {
                initial: initial_delay,
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
            ..Default::default()
        }
    }

    /// Create a retry config with linear backoff.
    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Linear {
                delay,
                max: Duration::from_secs(30),
            },
            ..Default::default()
        }
    }

    /// Create a retry config with constant delay.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Constant(delay),
            ..Default::default()
        }
    }

    /// Create a retry config with no delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::None,
            ..Default::default()
        }
    }

    /// Replace the status codes to retry on.
    pub fn with_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retry_status_codes = codes;
        self
    }

    /// Disable retry on connection errors.
    pub fn no_retry_on_connection(mut self) -> Self {
        self.retry_on_connection_error = false;
        self
    }

    /// Disable retry on timeout errors.
    pub fn no_retry_on_timeout(mut self) -> Self {
        self.retry_on_timeout = false;
        self
    }

    /// Ignore `Retry-After` headers.
    pub fn ignore_retry_after(mut self) -> Self {
        self.respect_retry_after = false;
        self
    }

    /// Turn this config into a middleware.
    pub fn into_middleware(self) -> Middleware {
        Middleware::named("retry").add_recoverer(Recoverer::retry(self))
    }

    fn retry_after(&self, error: &Exception) -> Option<Duration> {
        if !self.respect_retry_after {
            return None;
        }
        let seconds = error
            .response()?
            .headers
            .get_key(&HeaderKey::RETRY_AFTER)?
            .trim()
            .parse::<u64>()
            .ok()?;
        Some(Duration::from_secs(seconds).min(self.max_retry_after))
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(Duration),
    /// Linear backoff: delay increases by a fixed amount.
    Linear {
        /// Delay increment per attempt.
        delay: Duration,
        /// Maximum delay.
        max: Duration,
    },
    /// Exponential backoff: delay doubles each attempt.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given retry (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Linear { delay, max } => {
                let total = delay.saturating_mul(attempt.saturating_add(1));
                total.min(*max)
            }
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                let millis = (initial.as_millis() as f64 * factor).min(max.as_millis() as f64);
                Duration::from_millis(millis as u64).min(*max)
            }
        }
    }
}

/// Retry strategy trait for custom retry logic.
pub trait RetryStrategy: Send + Sync {
    /// Whether to retry after `attempt` (1-based) failed with `error`.
    fn should_retry(&self, attempt: u32, error: &Exception) -> bool;

    /// Delay before the retry that follows `attempt`.
    fn retry_delay(&self, attempt: u32, error: &Exception) -> Duration;
}

impl RetryStrategy for RetryConfig {
    fn should_retry(&self, attempt: u32, error: &Exception) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }

        match error.cause() {
            Some(CourierError::Transport(TransportError::Timeout(_))) => self.retry_on_timeout,
            Some(CourierError::Transport(TransportError::Connection(_))) => {
                self.retry_on_connection_error
            }
            Some(CourierError::Status(status)) => self.retry_status_codes.contains(&status.code()),
            _ => false,
        }
    }

    fn retry_delay(&self, attempt: u32, error: &Exception) -> Duration {
        self.retry_after(error)
            .unwrap_or_else(|| self.backoff.delay_for_attempt(attempt.saturating_sub(1)))
    }
}

/// Returned by a retry recoverer that declines an error.
#[derive(Debug, Error)]
#[error("Retry declined after attempt {attempt}")]
pub struct RetryDeclined {
    /// The attempt that failed.
    pub attempt: u32,
}

impl Recoverer {
    /// A recoverer that waits and accepts while `strategy` allows.
    pub fn retry<S: RetryStrategy + 'static>(strategy: S) -> Self {
        let strategy = Arc::new(strategy);
        Self::new(move |ctx, error| {
            let attempt = ctx.attempt;
            let decision = strategy
                .should_retry(attempt, error)
                .then(|| strategy.retry_delay(attempt, error));
            let url = ctx.url.clone();

            async move {
                let Some(delay) = decision else {
                    return Err(RetryDeclined { attempt }.into());
                };
                debug!(attempt, url = %url, delay_ms = delay.as_millis() as u64, "Retrying request");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(())
            }
        })
    }
}

impl Middleware {
    /// Retry with the given configuration.
    pub fn retry(config: RetryConfig) -> Self {
        config.into_middleware()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CallSite, Headers, HttpMethod, HttpStatusError, OperationContext, OperationKind,
        ResponseInfo,
    };

    fn server_error(code: u16) -> Exception {
        Exception::wrap(HttpStatusError::Server { code }, CallSite::labeled("test"))
    }

    fn ctx(attempt: u32) -> OperationContext {
        OperationContext::new("https://example.com", HttpMethod::Get, OperationKind::Read)
            .with_attempt(attempt)
    }

    #[test]
    fn test_exponential_backoff() {
        let strategy = BackoffStrategy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
            multiplier: 2.0,
        };

        assert_eq!(strategy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(strategy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(strategy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(strategy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(strategy.delay_for_attempt(200), Duration::from_secs(10));
    }

    #[test]
    fn test_linear_backoff() {
        let strategy = BackoffStrategy::Linear {
            delay: Duration::from_millis(100),
            max: Duration::from_secs(1),
        };

        assert_eq!(strategy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(strategy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(strategy.delay_for_attempt(9), Duration::from_secs(1));
    }

    #[test]
    fn test_constant_backoff() {
        let strategy = BackoffStrategy::Constant(Duration::from_millis(500));

        assert_eq!(strategy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(strategy.delay_for_attempt(5), Duration::from_millis(500));
    }

    #[test]
    fn test_should_retry_respects_attempt_limit() {
        let config = RetryConfig::immediate(3);
        let error = server_error(503);

        assert!(config.should_retry(1, &error));
        assert!(config.should_retry(2, &error));
        assert!(!config.should_retry(3, &error));
    }

    #[test]
    fn test_should_retry_by_error_kind() {
        let config = RetryConfig::immediate(5);
        let site = CallSite::labeled("test");

        assert!(!config.should_retry(
            1,
            &Exception::wrap(HttpStatusError::Client { code: 404 }, site.clone())
        ));
        assert!(config.should_retry(
            1,
            &Exception::wrap(HttpStatusError::Client { code: 429 }, site.clone())
        ));
        assert!(config.should_retry(
            1,
            &Exception::wrap(TransportError::Connection("refused".into()), site.clone())
        ));
        assert!(!config.clone().no_retry_on_timeout().should_retry(
            1,
            &Exception::wrap(TransportError::Timeout(Duration::from_secs(1)), site.clone())
        ));
        assert!(!config.should_retry(1, &Exception::wrap(CourierError::Cancelled, site)));
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let config = RetryConfig::constant(3, Duration::from_millis(10));
        let error = server_error(503).with_response(ResponseInfo {
            status: 503,
            headers: Headers::from_pairs([("retry-after", "2")]),
        });

        assert_eq!(config.retry_delay(1, &error), Duration::from_secs(2));
        assert_eq!(
            config.clone().ignore_retry_after().retry_delay(1, &error),
            Duration::from_millis(10)
        );
        assert_eq!(
            config.retry_delay(1, &server_error(503)),
            Duration::from_millis(10)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recoverer_waits_then_accepts() {
        let recoverer = Recoverer::retry(RetryConfig::constant(3, Duration::from_secs(5)));
        let start = tokio::time::Instant::now();

        recoverer.call(&ctx(1), &server_error(500)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_recoverer_declines_when_exhausted() {
        let recoverer = Recoverer::retry(RetryConfig::immediate(2));
        let err = recoverer.call(&ctx(2), &server_error(500)).await.unwrap_err();
        assert!(err.to_string().contains("attempt 2"));
    }
}
