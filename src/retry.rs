//! # Retry Controller
//!
//! Bounded retry loop around keyring and transaction operations. Exactly
//! one failure class is transient: the destination chain's account
//! sequence mismatch, which resolves once the stale nonce clears. Backoff
//! is linear (`base * attempt`: 30s, 60s, 90s with the default base) to
//! give the chain time to commit the competing transaction.
//!
//! Everything else - malformed input, missing binary, chain business
//! errors - is surfaced immediately without a second attempt, since
//! retrying those cannot change the outcome.

use crate::error::{CoreError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Successful outcome annotated with how many attempts it took
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Terminal failure annotated with the attempts consumed
#[derive(Debug)]
pub struct RetryFailure {
    pub error: CoreError,
    pub attempts: u32,
}

/// Wraps operations in the narrow sequence-mismatch retry policy
#[derive(Debug, Clone)]
pub struct RetryController {
    max_attempts: u32,
    backoff_base: Duration,
}

impl RetryController {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    pub fn from_config(delays: &crate::config::DelayConfig) -> Self {
        Self::new(delays.max_retry_attempts, delays.retry_backoff_base())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Execute `operation`, retrying only on sequence mismatch.
    ///
    /// The closure is re-invoked for each attempt; callers must make the
    /// operation safe to repeat (artifact overwrites are expected).
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        mut f: F,
    ) -> std::result::Result<Retried<T>, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            operation = %operation,
                            attempts = attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(Retried {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) if error.is_retryable() && attempt < self.max_attempts => {
                    let wait = self.backoff_base * attempt;
                    warn!(
                        operation = %operation,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        wait_seconds = wait.as_secs(),
                        "🔁 Sequence mismatch, backing off before retry"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(error) if error.is_retryable() => {
                    return Err(RetryFailure {
                        error: CoreError::RetriesExhausted {
                            attempts: attempt,
                            last_error: Box::new(error),
                        },
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    });
                }
            }
        }
    }
}
