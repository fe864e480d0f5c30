//! In-memory storage adapter for tests and ephemeral sessions.

use crate::error::StorageResult;
use crate::store::{note_size_bytes, queue_item_size_bytes, NoteFilter, OfflineStore};
use crate::DEFAULT_CACHE_LIMIT_BYTES;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftpad_types::{CachedNote, MutationQueueItem, MutationStatus, NoteSyncStatus};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Inner {
    /// Upsert order; reads sort by recency.
    notes: Vec<CachedNote>,
    /// Enqueue order.
    queue: Vec<MutationQueueItem>,
}

/// Volatile [`OfflineStore`] holding everything in process memory.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    limit_bytes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_CACHE_LIMIT_BYTES)
    }

    pub fn with_limit(limit_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            limit_bytes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn total_size_bytes(inner: &Inner) -> StorageResult<u64> {
    let mut total = 0u64;
    for note in &inner.notes {
        total += note_size_bytes(note)?;
    }
    for item in &inner.queue {
        total += queue_item_size_bytes(item)?;
    }
    Ok(total)
}

#[async_trait]
impl OfflineStore for MemoryStore {
    async fn load_notes(&self, filter: NoteFilter) -> StorageResult<Vec<CachedNote>> {
        let inner = self.inner.lock().await;
        let mut notes = inner.notes.clone();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let offset = filter.offset.unwrap_or(0);
        let notes: Vec<CachedNote> = notes
            .into_iter()
            .skip(offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(notes)
    }

    async fn save_note(&self, note: &CachedNote) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => *existing = note.clone(),
            None => inner.notes.push(note.clone()),
        }
        Ok(())
    }

    async fn save_notes(&self, notes: &[CachedNote]) -> StorageResult<()> {
        for note in notes {
            self.save_note(note).await?;
        }
        Ok(())
    }

    async fn delete_note(&self, note_id: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        inner.notes.retain(|n| n.id != note_id);
        Ok(())
    }

    async fn mark_synced(&self, note_id: &str, updated_at: DateTime<Utc>) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(note) = inner.notes.iter_mut().find(|n| n.id == note_id) {
            note.status = NoteSyncStatus::Synced;
            if updated_at > note.updated_at {
                note.updated_at = updated_at;
            }
        }
        Ok(())
    }

    async fn enforce_limit(&self) -> StorageResult<usize> {
        let mut inner = self.inner.lock().await;
        let mut total = total_size_bytes(&inner)?;
        if total <= self.limit_bytes {
            return Ok(0);
        }

        // Oldest synced notes first; unsynced work is never evicted.
        let mut candidates: Vec<(String, u64, DateTime<Utc>)> = Vec::new();
        for note in &inner.notes {
            if note.status == NoteSyncStatus::Synced {
                candidates.push((note.id.clone(), note_size_bytes(note)?, note.updated_at));
            }
        }
        candidates.sort_by_key(|(_, _, updated_at)| *updated_at);

        let mut evicted = 0usize;
        for (id, size, _) in candidates {
            if total <= self.limit_bytes {
                break;
            }
            inner.notes.retain(|n| n.id != id);
            total = total.saturating_sub(size);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, "evicted synced notes to respect cache budget");
        }
        Ok(evicted)
    }

    fn cache_limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    async fn clear_all(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        inner.notes.clear();
        inner.queue.clear();
        Ok(())
    }

    async fn get_queue(&self) -> StorageResult<Vec<MutationQueueItem>> {
        let inner = self.inner.lock().await;
        Ok(inner.queue.clone())
    }

    async fn upsert_queue_item(&self, item: &MutationQueueItem) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.queue.iter_mut().find(|q| q.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => inner.queue.push(item.clone()),
        }
        Ok(())
    }

    async fn replace_queue(&self, items: &[MutationQueueItem]) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        inner.queue = items.to_vec();
        Ok(())
    }

    async fn get_pending_batch(&self, size: usize) -> StorageResult<Vec<MutationQueueItem>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .queue
            .iter()
            .filter(|q| q.status == MutationStatus::Pending)
            .take(size)
            .cloned()
            .collect())
    }

    async fn remove_queue_items(&self, ids: &[String]) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        inner.queue.retain(|q| !ids.contains(&q.id));
        Ok(())
    }

    async fn mark_queue_item_status(
        &self,
        id: &str,
        status: MutationStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(item) = inner.queue.iter_mut().find(|q| q.id == id) {
            item.status = status;
            match status {
                MutationStatus::Failed => {
                    item.attempts += 1;
                    item.last_error = error.map(|e| e.to_string());
                }
                MutationStatus::Pending => {
                    item.last_error = None;
                }
            }
        }
        Ok(())
    }
}
