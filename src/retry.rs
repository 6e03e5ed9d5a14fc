//! Fixed-count, fixed-delay retry for single-item requests
//!
//! The bounded fetcher never retries; retrying is the concern of the
//! per-identifier operation, which wraps its HTTP call in [`with_retry`].
//!
//! # Example
//!
//! ```no_run
//! use catalog_fetch::config::RetryConfig;
//! use catalog_fetch::retry::{IsRetryable, with_retry};
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let policy = RetryConfig::default();
//! with_retry(&policy, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, overloaded upstream) return `true`.
/// Permanent failures (bad request, not found, undecodable body) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Status { status, .. } => matches!(status, 408 | 429 | 502 | 503 | 504),
            // A truncated body is usually a dropped connection
            Error::Body { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::InvalidRequest(_)
            | Error::Decode { .. }
            | Error::Serialization(_)
            | Error::Spreadsheet(_)
            | Error::Cancelled
            | Error::Batch { .. }
            | Error::NotFound(_)
            | Error::InvalidUpload(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Run an async operation, retrying transient failures with a fixed delay
///
/// The operation runs at most `policy.retries + 1` times. Non-retryable errors
/// are returned immediately; the last error is returned once retries run out.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < policy.retries => {
                attempt += 1;

                let delay = if policy.jitter {
                    add_jitter(policy.delay)
                } else {
                    policy.delay
                };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = policy.retries + 1,
                    delay_ms = delay.as_millis(),
                    "Request failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Request failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Request failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Stretch a delay by a uniform factor in `[1.0, 2.0]`
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
