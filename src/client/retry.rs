//! Bounded retry with exponential backoff.
//!
//! Attempts report an [`Outcome`]; the loop only sleeps and tries again on
//! [`Outcome::RetryableFailure`], and attempts are strictly sequential.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Dispatcher default: two retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Registration default: three retries after the first attempt.
pub const DEFAULT_REGISTER_MAX_RETRIES: u32 = 3;

/// Default first backoff delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Classified result of a single attempt.
#[derive(Debug)]
pub enum Outcome<T, E> {
    Success(T),
    RetryableFailure(E),
    TerminalFailure(E),
}

impl<T, E> Outcome<T, E> {
    /// Classify a plain result with a transience predicate.
    pub fn classify(result: Result<T, E>, is_retryable: impl FnOnce(&E) -> bool) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) if is_retryable(&err) => Self::RetryableFailure(err),
            Err(err) => Self::TerminalFailure(err),
        }
    }
}

/// Why a retried operation finally failed.
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// The last error observed.
    pub error: E,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// True when the retry budget ran out, false when the error was terminal.
    pub exhausted: bool,
}

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries.
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `attempt` until it succeeds, fails terminally, or the budget is
    /// spent. The closure receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Outcome<T, E>>,
        E: fmt::Display,
    {
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match attempt(attempts).await {
                Outcome::Success(value) => {
                    if attempts > 1 {
                        debug!(operation, attempts, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Outcome::TerminalFailure(error) => {
                    debug!(operation, attempts, error = %error, "Terminal failure, not retrying");
                    return Err(RetryFailure {
                        error,
                        attempts,
                        exhausted: false,
                    });
                }
                Outcome::RetryableFailure(error) => {
                    if attempts >= self.max_attempts() {
                        warn!(
                            operation,
                            attempts,
                            error = %error,
                            "Retry budget exhausted"
                        );
                        return Err(RetryFailure {
                            error,
                            attempts,
                            exhausted: true,
                        });
                    }
                    let delay = self.backoff_for(attempts);
                    warn!(
                        operation,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
