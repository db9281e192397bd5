//! Retry policy with exponential backoff

use std::{
    future::Future,
    time::{Duration, SystemTime},
};

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::{
    error::{ApiError, Result},
    timeout::with_timeout,
};

/// Upper bound for computed backoff delays
pub const MAX_BACKOFF: Duration = Duration::from_secs(32);

/// Default ceiling for any wait between attempts, including server retry hints
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Generic API statuses worth another attempt
const RETRYABLE_STATUSES: [StatusCode; 6] = [
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Check if an error should be retried
pub fn is_retryable(error: &ApiError) -> bool {
    match error {
        ApiError::Network { .. } | ApiError::Timeout(_) | ApiError::RateLimit { .. } => true,
        ApiError::Api { status, .. } => RETRYABLE_STATUSES.contains(status),
        _ => false,
    }
}

/// `base * 2^attempt`, capped at [`MAX_BACKOFF`]
pub fn calculate_backoff(attempt: u32, base: Duration) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

/// Delay before retry number `attempt` (0 = before the second attempt)
///
/// A server-provided retry-after wins over the computed backoff.
pub fn delay_for(attempt: u32, base: Duration, error: &ApiError) -> Duration {
    error
        .retry_after()
        .unwrap_or_else(|| calculate_backoff(attempt, base))
}

/// Parse a `Retry-After` header value
///
/// Accepts delay-seconds or an HTTP date. Absent, unparseable and past values yield zero.
pub fn parse_retry_after(value: Option<&str>) -> Duration {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Duration::ZERO;
    };

    if let Ok(secs) = value.parse::<u64>() {
        return Duration::from_secs(secs);
    }

    httpdate::parse_http_date(value)
        .ok()
        .and_then(|date| date.duration_since(SystemTime::now()).ok())
        .unwrap_or(Duration::ZERO)
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Deadline applied to each attempt
    pub attempt_timeout: Duration,
    /// Longest sleep between attempts; longer `Retry-After` hints are clamped
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            attempt_timeout,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Execute operation with retry logic
    ///
    /// Runs at most `max_retries + 1` attempts, each under `attempt_timeout`. The last
    /// error is returned unchanged once attempts run out or it is not retryable.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match with_timeout(self.attempt_timeout, operation()).await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Request succeeded after {attempt} retries");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        debug!("Non-retryable error: {e}");
                        return Err(e);
                    }

                    if attempt >= self.max_retries {
                        debug!("Giving up after {} attempts: {e}", attempt + 1);
                        return Err(e);
                    }

                    let delay = delay_for(attempt, self.base_delay, &e).min(self.max_delay);
                    warn!(
                        "Request failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
