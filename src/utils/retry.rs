//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Only lost
//! compare-and-set races and read-only upstream calls are ever retried.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// Backoff for re-evaluating a lost compare-and-set (room version, wallet sequence).
///
/// - Min delay: 5ms
/// - Max delay: 200ms
/// - Max attempts: 8
/// - Jitter enabled
pub fn conflict_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(5))
        .with_max_delay(Duration::from_millis(200))
        .with_max_times(8)
        .with_jitter()
}

/// Backoff for read-only gateway polls.
///
/// - Min delay: 200ms
/// - Max delay: 2s
/// - Max attempts: 3
/// - Jitter enabled
pub fn gateway_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter()
}

/// A storage error is retryable only when a compare-and-set lost a race.
///
/// `Unavailable` is a business outcome and will never succeed on retry.
pub fn is_retryable_storage(err: &StorageError) -> bool {
    err.is_conflict()
}

/// Gateway timeouts and transport failures are retryable for reads; rejections are not.
pub fn is_retryable_gateway(err: &GatewayError) -> bool {
    matches!(err, GatewayError::Timeout(_) | GatewayError::Unavailable(_))
}
