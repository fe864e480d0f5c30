//! Shared test infrastructure: an instrumented storage adapter and a
//! scriptable remote apply hook.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftpad_storage::{NoteFilter, OfflineStore, StorageResult};
use driftpad_sync::{RemoteApply, RemoteApplyError, SharedNetworkStatus};
use driftpad_types::{CachedNote, MutationQueueItem, MutationStatus};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Polls a condition until it holds, failing the test after ~2s.
pub async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

pub fn ts(offset_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
}

/// Delegating [`OfflineStore`] that counts every adapter call.
pub struct CountingStore {
    inner: Arc<dyn OfflineStore>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn OfflineStore>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn total_ops(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OfflineStore for CountingStore {
    async fn load_notes(&self, filter: NoteFilter) -> StorageResult<Vec<CachedNote>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_notes(filter).await
    }

    async fn save_note(&self, note: &CachedNote) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save_note(note).await
    }

    async fn save_notes(&self, notes: &[CachedNote]) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save_notes(notes).await
    }

    async fn delete_note(&self, note_id: &str) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_note(note_id).await
    }

    async fn mark_synced(&self, note_id: &str, updated_at: DateTime<Utc>) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_synced(note_id, updated_at).await
    }

    async fn enforce_limit(&self) -> StorageResult<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.enforce_limit().await
    }

    fn cache_limit_bytes(&self) -> u64 {
        self.inner.cache_limit_bytes()
    }

    async fn clear_all(&self) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.clear_all().await
    }

    async fn get_queue(&self) -> StorageResult<Vec<MutationQueueItem>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_queue().await
    }

    async fn upsert_queue_item(&self, item: &MutationQueueItem) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_queue_item(item).await
    }

    async fn replace_queue(&self, items: &[MutationQueueItem]) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.replace_queue(items).await
    }

    async fn get_pending_batch(&self, size: usize) -> StorageResult<Vec<MutationQueueItem>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_pending_batch(size).await
    }

    async fn remove_queue_items(&self, ids: &[String]) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_queue_items(ids).await
    }

    async fn mark_queue_item_status(
        &self,
        id: &str,
        status: MutationStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_queue_item_status(id, status, error).await
    }
}

/// Scriptable [`RemoteApply`]: records invocations, rejects configured
/// notes, and can drop connectivity or park on a gate as a side effect of
/// being called.
#[derive(Default)]
pub struct ScriptedRemote {
    applied: Mutex<Vec<MutationQueueItem>>,
    fail_notes: Mutex<HashSet<String>>,
    knock_offline: Mutex<Option<Arc<SharedNetworkStatus>>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every apply for this note will be rejected.
    pub fn fail_note(&self, note_id: &str) {
        self.fail_notes.lock().unwrap().insert(note_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_notes.lock().unwrap().clear();
    }

    /// The next applies toggle the provider offline, simulating a link that
    /// dies mid-drain.
    pub fn knock_offline_on_apply(&self, network: Arc<SharedNetworkStatus>) {
        *self.knock_offline.lock().unwrap() = Some(network);
    }

    /// Applies park on the semaphore (after recording the invocation) until
    /// the test releases permits.
    pub fn gate_on(&self, gate: Arc<Semaphore>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn applied(&self) -> Vec<MutationQueueItem> {
        self.applied.lock().unwrap().clone()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteApply for ScriptedRemote {
    async fn apply(&self, item: &MutationQueueItem) -> Result<(), RemoteApplyError> {
        self.applied.lock().unwrap().push(item.clone());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let network = self.knock_offline.lock().unwrap().clone();
        if let Some(network) = network {
            network.set_online(false);
        }

        if self.fail_notes.lock().unwrap().contains(&item.note_id) {
            return Err(RemoteApplyError::from(format!(
                "remote rejected mutation for {}",
                item.note_id
            )));
        }
        Ok(())
    }
}
