//! Bounded retry with exponential backoff for note reads.

use std::path::Path;
use std::time::Duration;

use crate::async_io::read_text_safe_async;
use crate::error::IoError;

/// How often and how patiently a read is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubled after each failure.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Policy with explicit values (at least one attempt).
    #[must_use]
    pub fn new(attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_backoff,
        }
    }

    /// Delay after failed attempt number `attempt` (zero-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Read a note, retrying transient failures per `policy`.
///
/// Only missing or locked files are retried; oversize and binary files fail
/// at once. The read is never cancelled midway: callers that stop watching
/// still let an in-flight retry finish.
///
/// # Errors
/// Non-transient errors as-is; `RetriesExhausted` wrapping the last error
/// when every attempt failed transiently.
pub async fn read_text_with_retry<P: AsRef<Path>>(
    path: P,
    max_bytes: u64,
    policy: &RetryPolicy,
) -> Result<String, IoError> {
    let path = path.as_ref();
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match read_text_safe_async(path, max_bytes).await {
            Ok(text) => {
                if attempt > 0 {
                    tracing::debug!(path = %path.display(), attempt, "read succeeded after retry");
                }
                return Ok(text);
            }
            Err(err) if err.is_transient() && attempt + 1 < attempts => {
                let delay = policy.backoff_for(attempt);
                tracing::debug!(
                    path = %path.display(),
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient read failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(path = %path.display(), attempts, error = %err, "read retries exhausted");
                return Err(IoError::RetriesExhausted {
                    path: path.to_path_buf(),
                    attempts,
                    last: Box::new(err),
                });
            }
            Err(err) => return Err(err),
        }
    }
}
