//! Sync engine — owns the mutation queue and the drain state machine.
//!
//! Event-driven: a drain is triggered by `enqueue` while online, by a
//! connectivity transition to online, or explicitly. There is no background
//! retry timer — a failed item stays in the queue and becomes eligible again
//! on the next drain pass (at-least-once, event-triggered delivery).

use crate::compaction::compact_queue;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::network::{NetworkStatusProvider, Subscription};
use crate::queue::QueueService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftpad_storage::OfflineStore;
use driftpad_types::{MutationQueueItem, MutationStatus, NoteMutation, SyncState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure reported by the remote apply hook. The engine treats every
/// rejection identically regardless of cause (network, validation, auth);
/// the message is recorded on the queue item for diagnostics only.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RemoteApplyError(pub String);

impl From<String> for RemoteApplyError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for RemoteApplyError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Applies one queued mutation to the remote store. Injected; delegates to
/// the note CRUD service.
#[async_trait]
pub trait RemoteApply: Send + Sync {
    async fn apply(&self, item: &MutationQueueItem) -> Result<(), RemoteApplyError>;
}

/// Invoked once per successfully-applied item; expected to update the cache
/// engine's durable record. [`crate::CacheEngine`] implements this directly.
#[async_trait]
pub trait SyncSuccess: Send + Sync {
    async fn on_applied(&self, item: &MutationQueueItem) -> SyncResult<()>;
}

/// The sync engine. Single writer of the mutation queue; constructed with
/// all collaborators injected so independent instances can coexist.
pub struct SyncEngine {
    queue: QueueService,
    remote: Arc<dyn RemoteApply>,
    on_success: Arc<dyn SyncSuccess>,
    online: AtomicBool,
    disposed: AtomicBool,
    /// Guards against re-entrant draining; a second caller finding the lock
    /// held coalesces into the pass already in flight.
    drain_lock: tokio::sync::Mutex<()>,
    last_sync_at: Mutex<Option<DateTime<Utc>>>,
    subscription: Mutex<Option<Subscription>>,
    batch_size: usize,
}

impl SyncEngine {
    /// Creates the engine, subscribes it to connectivity transitions, and —
    /// if currently online — schedules a drain so a queue persisted by a
    /// previous process run is picked up immediately.
    ///
    /// Must be called from within a tokio runtime; connectivity callbacks
    /// and fire-and-forget drains are spawned onto it.
    pub fn start(
        store: Arc<dyn OfflineStore>,
        network: Arc<dyn NetworkStatusProvider>,
        remote: Arc<dyn RemoteApply>,
        on_success: Arc<dyn SyncSuccess>,
        config: SyncConfig,
    ) -> Arc<Self> {
        let engine = Arc::new(Self {
            queue: QueueService::new(store),
            remote,
            on_success,
            online: AtomicBool::new(network.is_online()),
            disposed: AtomicBool::new(false),
            drain_lock: tokio::sync::Mutex::new(()),
            last_sync_at: Mutex::new(None),
            subscription: Mutex::new(None),
            batch_size: config.batch_size,
        });

        let handle = tokio::runtime::Handle::current();
        let weak = Arc::downgrade(&engine);
        let subscription = network.subscribe(Box::new(move |is_online| {
            let Some(engine) = weak.upgrade() else {
                return;
            };
            if is_online {
                let engine = Arc::clone(&engine);
                handle.spawn(async move {
                    if let Err(e) = engine.handle_online().await {
                        warn!("drain after reconnect failed: {e}");
                    }
                });
            } else {
                engine.handle_offline();
            }
        }));
        *engine.subscription.lock().unwrap() = Some(subscription);

        if engine.is_online() {
            engine.spawn_drain();
        }
        engine
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn spawn_drain(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.drain_queue().await {
                warn!("queue drain failed: {e}");
            }
        });
    }

    /// Persists the mutation, then — if online — triggers a drain without
    /// blocking the caller. Offline, the item stays durably queued until
    /// connectivity resumes.
    pub async fn enqueue(self: &Arc<Self>, mutation: NoteMutation) -> SyncResult<MutationQueueItem> {
        let item = self.queue.enqueue(mutation).await?;
        if self.is_online() && !self.is_disposed() {
            self.spawn_drain();
        }
        Ok(item)
    }

    /// Batch variant of [`enqueue`](Self::enqueue); triggers at most one
    /// drain for the whole batch.
    pub async fn enqueue_many(
        self: &Arc<Self>,
        mutations: Vec<NoteMutation>,
    ) -> SyncResult<Vec<MutationQueueItem>> {
        let items = self.queue.enqueue_many(mutations).await?;
        if self.is_online() && !self.is_disposed() {
            self.spawn_drain();
        }
        Ok(items)
    }

    /// Drains the persisted queue against the remote store.
    ///
    /// Compacts and re-persists the queue before the first network call,
    /// then works through bounded pending batches. Connectivity is checked
    /// before every item; going offline mid-pass halts the whole drain. A
    /// failed item is marked in place and the pass continues with the next
    /// one. Concurrent invocation coalesces into the pass in flight.
    pub async fn drain_queue(&self) -> SyncResult<()> {
        if !self.is_online() || self.is_disposed() {
            return Ok(());
        }
        let Ok(_guard) = self.drain_lock.try_lock() else {
            debug!("drain already in flight");
            return Ok(());
        };

        let queue = self.queue.get_queue().await?;
        if queue.is_empty() {
            return Ok(());
        }
        let before = queue.len();
        let compacted = compact_queue(queue);
        debug!(before, after = compacted.len(), "compacted mutation queue");
        // The compacted queue must be durable before any network call, so a
        // crash mid-drain cannot replay already-collapsed history.
        self.queue.replace(&compacted).await?;

        let mut synced_any = false;
        'drain: loop {
            if !self.is_online() || self.is_disposed() {
                break;
            }
            let batch = self.queue.get_pending_batch(self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            for item in &batch {
                // Connectivity can drop between items; a stale pass keeps
                // attempting calls destined to fail, so re-check each time.
                if !self.is_online() || self.is_disposed() {
                    debug!("connectivity lost mid-drain, halting");
                    break 'drain;
                }
                match self.remote.apply(item).await {
                    Ok(()) => {
                        self.queue.remove_items(std::slice::from_ref(&item.id)).await?;
                        self.on_success.on_applied(item).await?;
                        synced_any = true;
                    }
                    Err(e) => {
                        warn!(
                            note_id = %item.note_id,
                            operation = %item.operation,
                            "remote apply failed: {e}"
                        );
                        self.queue
                            .mark_status(&item.id, MutationStatus::Failed, Some(&e.to_string()))
                            .await?;
                    }
                }
            }
        }

        if synced_any {
            *self.last_sync_at.lock().unwrap() = Some(Utc::now());
        }
        Ok(())
    }

    /// Connectivity resumed: drain whatever accumulated while offline.
    pub async fn handle_online(&self) -> SyncResult<()> {
        self.online.store(true, Ordering::SeqCst);
        self.drain_queue().await
    }

    /// Connectivity lost: a drain in flight observes this before its next
    /// item and halts.
    pub fn handle_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    /// Diagnostic snapshot for the UI layer.
    pub async fn sync_state(&self) -> SyncResult<SyncState> {
        let queue = self.queue.get_queue().await?;
        let pending = queue
            .iter()
            .filter(|i| i.status == MutationStatus::Pending)
            .count();
        let failed = queue.len() - pending;
        Ok(SyncState {
            last_sync_at: *self.last_sync_at.lock().unwrap(),
            is_online: self.is_online(),
            queue_size: queue.len(),
            pending,
            failed,
        })
    }

    /// Unsubscribes from connectivity events and stops scheduling work. A
    /// drain currently awaiting a remote call finishes that single call but
    /// starts no new one. Called once at shutdown.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        if let Some(subscription) = self.subscription.lock().unwrap().take() {
            subscription.cancel();
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Plain closures work as success hooks.
#[async_trait]
impl<F> SyncSuccess for F
where
    F: Fn(&MutationQueueItem) -> SyncResult<()> + Send + Sync,
{
    async fn on_applied(&self, item: &MutationQueueItem) -> SyncResult<()> {
        self(item)
    }
}

impl SyncError {
    pub fn callback(message: impl Into<String>) -> Self {
        SyncError::Callback(message.into())
    }
}
