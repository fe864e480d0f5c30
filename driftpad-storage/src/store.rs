//! The storage adapter contract consumed by the cache and sync engines.

use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftpad_types::{CachedNote, MutationQueueItem, MutationStatus};

/// Pagination filter for note listing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoteFilter {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl NoteFilter {
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}

/// Durable key-value/row storage for cached notes and the mutation queue.
///
/// Implemented per platform; exposes atomic read/write/delete primitives and
/// no business logic. Every method is potentially asynchronous and must be
/// awaited to completion before the caller's next queue-mutating step. The
/// cache engine is the only writer of the note mirror, the sync engine the
/// only writer of the queue; no multi-key transactions are required.
#[async_trait]
pub trait OfflineStore: Send + Sync {
    // ── Note mirror ──────────────────────────────────────────────

    /// Returns cached notes ordered by recency (most recently updated
    /// first). An empty cache yields an empty list, never an error.
    async fn load_notes(&self, filter: NoteFilter) -> StorageResult<Vec<CachedNote>>;

    /// Upserts a note by id.
    async fn save_note(&self, note: &CachedNote) -> StorageResult<()>;

    /// Upserts a batch of notes by id.
    async fn save_notes(&self, notes: &[CachedNote]) -> StorageResult<()>;

    /// Removes a note from the mirror. Deleting an absent id is not an
    /// error.
    async fn delete_note(&self, note_id: &str) -> StorageResult<()>;

    /// Transitions a note to `synced` and stamps the server timestamp.
    /// A timestamp older than the stored one never overwrites it, so the
    /// recency of a synced note is monotonically non-decreasing.
    async fn mark_synced(&self, note_id: &str, updated_at: DateTime<Utc>) -> StorageResult<()>;

    /// Evicts least-recently-updated `synced` notes until total stored
    /// bytes fit the configured budget. `pending` and `conflict` notes are
    /// never evicted. Returns the number of notes removed.
    async fn enforce_limit(&self) -> StorageResult<usize>;

    /// The configured byte budget (read-only, for diagnostics/UI).
    fn cache_limit_bytes(&self) -> u64;

    /// Drops both the note mirror and the queue (sign-out path).
    async fn clear_all(&self) -> StorageResult<()>;

    // ── Mutation queue ───────────────────────────────────────────

    /// Returns the full persisted queue in enqueue order.
    async fn get_queue(&self) -> StorageResult<Vec<MutationQueueItem>>;

    /// Upserts a single queue item by id, preserving its queue position.
    async fn upsert_queue_item(&self, item: &MutationQueueItem) -> StorageResult<()>;

    /// Replaces the entire stored queue. Used exclusively by compaction.
    async fn replace_queue(&self, items: &[MutationQueueItem]) -> StorageResult<()>;

    /// Returns up to `size` items with status `pending`, in queue order.
    /// `failed` items are excluded until compaction re-arms them.
    async fn get_pending_batch(&self, size: usize) -> StorageResult<Vec<MutationQueueItem>>;

    /// Removes the given items after confirmed remote success. Unknown ids
    /// are ignored.
    async fn remove_queue_items(&self, ids: &[String]) -> StorageResult<()>;

    /// Updates a queue item's status in place. Marking an item `failed`
    /// increments its attempt counter and records the error; marking it
    /// `pending` clears the recorded error. Unknown ids are ignored.
    async fn mark_queue_item_status(
        &self,
        id: &str,
        status: MutationStatus,
        error: Option<&str>,
    ) -> StorageResult<()>;
}

/// Serialized-size estimate used by the eviction policy: the JSON length of
/// a note row, mirroring what a browser-embedded store would persist.
pub(crate) fn note_size_bytes(note: &CachedNote) -> StorageResult<u64> {
    Ok(serde_json::to_vec(note)?.len() as u64)
}

/// Serialized-size estimate for a queue item.
pub(crate) fn queue_item_size_bytes(item: &MutationQueueItem) -> StorageResult<u64> {
    Ok(serde_json::to_vec(item)?.len() as u64)
}
