//! Caller-side retry for idempotent storage operations.
//!
//! Uses `backon` for exponential backoff with jitter. The repository never
//! retries internally; callers opt in by wrapping an operation that is safe to
//! repeat (every repository operation keyed by a confirmation number is).

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::storage::{Result, StorageError};

/// Standard backoff for transient storage failures.
///
/// - Min delay: 50ms
/// - Max delay: 2s
/// - Max attempts: 5
/// - Jitter enabled
pub fn storage_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(5)
        .with_jitter()
}

/// Run `operation`, retrying retryable storage errors with [`storage_backoff`].
///
/// `WriteAmbiguous` is retried as well: repeating the same logical write
/// converges the tables.
pub async fn retry_idempotent<T, F, Fut>(name: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with(storage_backoff(), name, operation).await
}

/// Like [`retry_idempotent`] with an explicit backoff.
pub async fn retry_with<T, F, Fut>(backoff: ExponentialBuilder, name: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    operation
        .retry(backoff)
        .when(StorageError::is_retryable)
        .notify(|err: &StorageError, delay: Duration| {
            warn!(operation = name, error = %err, ?delay, "Retrying storage operation");
        })
        .await
}
