//! Cache engine — the local note mirror.

use crate::engine::SyncSuccess;
use crate::error::SyncResult;
use crate::overlay::apply_note_overlay;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftpad_storage::{NoteFilter, OfflineStore, StorageResult};
use driftpad_types::{CachedNote, MutationOperation, MutationQueueItem};
use std::sync::Arc;

/// Reads and writes the local note mirror through the storage adapter and
/// keeps it under the configured byte budget: every write is followed by an
/// eviction pass, so callers never reason about storage growth.
///
/// Every method propagates storage adapter errors unchanged.
pub struct CacheEngine {
    store: Arc<dyn OfflineStore>,
}

impl CacheEngine {
    pub fn new(store: Arc<dyn OfflineStore>) -> Self {
        Self { store }
    }

    /// Returns cached notes in recency order. An empty cache yields an
    /// empty list.
    pub async fn load_notes(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> StorageResult<Vec<CachedNote>> {
        self.store.load_notes(NoteFilter { limit, offset }).await
    }

    /// Idempotent upsert by id, followed by an eviction pass.
    pub async fn save_note(&self, note: &CachedNote) -> StorageResult<()> {
        self.store.save_note(note).await?;
        self.store.enforce_limit().await?;
        Ok(())
    }

    /// Batch upsert, followed by a single eviction pass.
    pub async fn save_notes(&self, notes: &[CachedNote]) -> StorageResult<()> {
        self.store.save_notes(notes).await?;
        self.store.enforce_limit().await?;
        Ok(())
    }

    /// Removes a note from the mirror; deleting an absent id is not an
    /// error.
    pub async fn delete_note(&self, note_id: &str) -> StorageResult<()> {
        self.store.delete_note(note_id).await
    }

    /// Transitions a note to `synced` with the server timestamp. Used
    /// exclusively by the sync engine after a confirmed remote write.
    pub async fn mark_synced(
        &self,
        note_id: &str,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.store.mark_synced(note_id, updated_at).await
    }

    /// Runs the eviction policy; returns the number of notes evicted.
    pub async fn enforce_limit(&self) -> StorageResult<usize> {
        self.store.enforce_limit().await
    }

    /// The configured byte budget (diagnostics/UI).
    pub fn cache_limit_bytes(&self) -> u64 {
        self.store.cache_limit_bytes()
    }

    /// Overlays the cached offline state on a server result set; see
    /// [`apply_note_overlay`].
    pub async fn overlay_server_notes(
        &self,
        server_notes: Vec<CachedNote>,
    ) -> StorageResult<Vec<CachedNote>> {
        let offline = self.store.load_notes(NoteFilter::default()).await?;
        Ok(apply_note_overlay(server_notes, &offline))
    }
}

/// The default success hook: a confirmed remote delete removes the mirror
/// row; a confirmed create/update stamps the note `synced` at the applied
/// mutation's timestamp.
#[async_trait]
impl SyncSuccess for CacheEngine {
    async fn on_applied(&self, item: &MutationQueueItem) -> SyncResult<()> {
        match item.operation {
            MutationOperation::Delete => self.delete_note(&item.note_id).await?,
            MutationOperation::Create | MutationOperation::Update => {
                self.mark_synced(&item.note_id, item.client_updated_at).await?;
            }
        }
        Ok(())
    }
}
