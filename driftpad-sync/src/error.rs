//! Sync engine error types.

use driftpad_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the cache and sync engines.
///
/// Remote apply rejections are deliberately NOT represented here — they are
/// recorded on the queue item and retried on a later drain, never propagated
/// to the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Storage adapter failure, propagated unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The injected success callback failed.
    #[error("success callback failed: {0}")]
    Callback(String),
}
