//! Storage layer for the Driftpad offline core.
//!
//! Defines the [`OfflineStore`] adapter contract the cache and sync engines
//! are written against, plus two implementations:
//!
//! - [`SqliteStore`] — durable embedded store (the per-platform database)
//! - [`MemoryStore`] — volatile store for tests and ephemeral sessions
//!
//! Adapters expose atomic single-row/single-collection primitives only; the
//! eviction strategy is the one piece of policy they own, because measuring
//! stored bytes is inherently a storage concern.

mod error;
mod memory;
mod sqlite;
mod store;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{NoteFilter, OfflineStore};

/// Default byte budget for the local mirror plus queue. The clients have no
/// capacity to mirror an unbounded remote dataset; this bound matches the
/// browser client's storage allotment.
pub const DEFAULT_CACHE_LIMIT_BYTES: u64 = 5 * 1024 * 1024;
