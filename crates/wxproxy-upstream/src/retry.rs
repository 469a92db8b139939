//! Retry utilities for upstream calls with exponential backoff.
//!
//! This module retries transient failures:
//! - Timeouts
//! - 5xx server errors, 408 and 429
//! - Connection errors
//!
//! It does NOT retry:
//! - Other 4xx client errors
//! - Open circuits, unreadable bodies, unknown cities

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

use crate::error::{Dependency, UpstreamError};

/// Default retry configuration
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// Delay before retry number `retry` (0-based): initial_delay * 2^retry, capped
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Should retry the request
    Retry,
    /// Should not retry - permanent failure
    NoRetry,
}

/// Check if a status code is retryable
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    if status.is_server_error() {
        return RetryDecision::Retry;
    }

    // 429 Too Many Requests - retry with backoff
    if status == StatusCode::TOO_MANY_REQUESTS {
        return RetryDecision::Retry;
    }

    if status == StatusCode::REQUEST_TIMEOUT {
        return RetryDecision::Retry;
    }

    RetryDecision::NoRetry
}

/// Run an upstream operation, retrying transient failures.
///
/// Non-transient errors are returned immediately. When every attempt fails
/// transiently, the last error is returned.
///
/// # Example
/// ```ignore
/// let body = with_retry(&config, Dependency::Forecast, || async {
///     client.fetch_once().await
/// }).await?;
/// ```
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    dependency: Dependency,
    mut operation: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(%dependency, attempt, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => {
                tracing::debug!(%dependency, error = %e, "non-retryable error");
                return Err(e);
            }
            Err(e) if attempt >= max_attempts => {
                tracing::error!(
                    %dependency,
                    attempts = max_attempts,
                    error = %e,
                    "all retry attempts exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    %dependency,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retryable error, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
