//! Offline engine for the Driftpad note clients.
//!
//! Pairs a bounded local note cache with a durable outbound mutation queue:
//!
//! - [`CacheEngine`] mirrors notes locally and enforces a byte-budget
//!   eviction policy through the storage adapter
//! - [`SyncEngine`] owns the mutation queue; it compacts, drains, retries
//!   and reports outcomes, driven by connectivity events
//!
//! The remote call itself is injected ([`RemoteApply`]), as is the success
//! hook that folds confirmed writes back into the cache ([`SyncSuccess`]).
//! Conflict policy is last-writer-wins at the remote store with an
//! optimistic local overlay; ordering is guaranteed per note only.

pub mod cache;
pub mod compaction;
pub mod config;
pub mod engine;
pub mod error;
pub mod network;
pub mod overlay;
pub mod queue;

pub use cache::CacheEngine;
pub use compaction::compact_queue;
pub use config::SyncConfig;
pub use engine::{RemoteApply, RemoteApplyError, SyncEngine, SyncSuccess};
pub use error::{SyncError, SyncResult};
pub use network::{NetworkCallback, NetworkStatusProvider, SharedNetworkStatus, Subscription};
pub use overlay::apply_note_overlay;
pub use queue::QueueService;
