//! Sync engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the sync engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Items fetched per drain batch. Bounding the batch bounds memory and
    /// keeps the online check frequent on a flaky link.
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { batch_size: 10 }
    }
}
