//! Persistence facade over the queue side of the storage adapter.

use driftpad_storage::{OfflineStore, StorageResult};
use driftpad_types::{MutationQueueItem, MutationStatus, NoteMutation};
use std::sync::Arc;

/// Thin service that materializes queue items from mutations and forwards
/// queue operations to the storage adapter. The sync engine is its only
/// consumer.
pub struct QueueService {
    store: Arc<dyn OfflineStore>,
}

impl QueueService {
    pub fn new(store: Arc<dyn OfflineStore>) -> Self {
        Self { store }
    }

    /// Persists a new queue item for the mutation and returns it.
    pub async fn enqueue(&self, mutation: NoteMutation) -> StorageResult<MutationQueueItem> {
        let item = MutationQueueItem::from_mutation(mutation);
        self.store.upsert_queue_item(&item).await?;
        Ok(item)
    }

    /// Persists queue items for a batch of mutations, one upsert each —
    /// never a queue replace, which would clobber concurrent enqueues.
    pub async fn enqueue_many(
        &self,
        mutations: Vec<NoteMutation>,
    ) -> StorageResult<Vec<MutationQueueItem>> {
        let mut items = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            items.push(self.enqueue(mutation).await?);
        }
        Ok(items)
    }

    pub async fn get_queue(&self) -> StorageResult<Vec<MutationQueueItem>> {
        self.store.get_queue().await
    }

    /// Replaces the stored queue with a compacted one.
    pub async fn replace(&self, items: &[MutationQueueItem]) -> StorageResult<()> {
        self.store.replace_queue(items).await
    }

    pub async fn get_pending_batch(&self, size: usize) -> StorageResult<Vec<MutationQueueItem>> {
        self.store.get_pending_batch(size).await
    }

    pub async fn remove_items(&self, ids: &[String]) -> StorageResult<()> {
        self.store.remove_queue_items(ids).await
    }

    pub async fn mark_status(
        &self,
        id: &str,
        status: MutationStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        self.store.mark_queue_item_status(id, status, error).await
    }
}
