//! Shared data model for the Driftpad offline core.
//!
//! These types cross every boundary in the offline subsystem: the storage
//! adapter persists them, the cache engine owns the note mirror, and the
//! sync engine owns the mutation queue. No business logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Synchronization status of a locally cached note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteSyncStatus {
    /// Local copy matches the last confirmed server state.
    Synced,
    /// Local edits exist that have not reached the server yet.
    Pending,
    /// A remote write superseded local edits that were still queued.
    Conflict,
}

impl fmt::Display for NoteSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteSyncStatus::Synced => write!(f, "synced"),
            NoteSyncStatus::Pending => write!(f, "pending"),
            NoteSyncStatus::Conflict => write!(f, "conflict"),
        }
    }
}

impl FromStr for NoteSyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(NoteSyncStatus::Synced),
            "pending" => Ok(NoteSyncStatus::Pending),
            "conflict" => Ok(NoteSyncStatus::Conflict),
            other => Err(format!("unknown note sync status: {other}")),
        }
    }
}

/// Operation carried by a queued mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOperation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationOperation::Create => write!(f, "create"),
            MutationOperation::Update => write!(f, "update"),
            MutationOperation::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for MutationOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(MutationOperation::Create),
            "update" => Ok(MutationOperation::Update),
            "delete" => Ok(MutationOperation::Delete),
            other => Err(format!("unknown mutation operation: {other}")),
        }
    }
}

/// Status of a queued mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    /// Eligible for the next drain pass.
    Pending,
    /// Last remote attempt rejected; re-armed by compaction on the next pass.
    Failed,
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationStatus::Pending => write!(f, "pending"),
            MutationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for MutationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MutationStatus::Pending),
            "failed" => Ok(MutationStatus::Failed),
            other => Err(format!("unknown mutation status: {other}")),
        }
    }
}

/// Local mirror of a note.
///
/// `title`, `body` and `tags` hold the last-known-good server fields and are
/// owned exclusively by the cache engine. The id may be a client-generated
/// placeholder until the first successful remote create.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedNote {
    pub id: String,
    pub status: NoteSyncStatus,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optimistic local delete — hides the note from overlays until the
    /// remote delete is confirmed and the row is removed.
    #[serde(default)]
    pub deleted: bool,
    /// Recency timestamp; for `synced` notes this never decreases across
    /// successive writes from the same source.
    pub updated_at: DateTime<Utc>,
}

impl CachedNote {
    /// A fresh, locally created note with a client-generated placeholder id.
    pub fn new_local(title: Option<String>, body: Option<String>, tags: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: NoteSyncStatus::Pending,
            title,
            body,
            tags,
            deleted: false,
            updated_at: Utc::now(),
        }
    }
}

/// Sparse set of note fields a mutation applies. Opaque to the sync engine;
/// only the remote CRUD service interprets it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl NotePayload {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.tags.is_none()
    }
}

/// A local change as produced by the note-editing layer, before it is
/// assigned a queue identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteMutation {
    pub note_id: String,
    pub operation: MutationOperation,
    pub payload: NotePayload,
    /// Client-side timestamp of the edit; drives per-note ordering.
    pub client_updated_at: DateTime<Utc>,
}

impl NoteMutation {
    /// Stamps the mutation with the current client time.
    pub fn new(note_id: impl Into<String>, operation: MutationOperation, payload: NotePayload) -> Self {
        Self {
            note_id: note_id.into(),
            operation,
            payload,
            client_updated_at: Utc::now(),
        }
    }
}

/// One pending local change awaiting remote application.
///
/// Created on enqueue, mutated in place on failure, removed on confirmed
/// remote success; may be merged away by compaction before ever being
/// attempted. Persisted so it survives process restarts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationQueueItem {
    /// Unique per item, not per note.
    pub id: String,
    pub note_id: String,
    pub operation: MutationOperation,
    pub payload: NotePayload,
    pub client_updated_at: DateTime<Utc>,
    pub status: MutationStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl MutationQueueItem {
    /// Materializes a queue item from a mutation, assigning a fresh id.
    pub fn from_mutation(mutation: NoteMutation) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            note_id: mutation.note_id,
            operation: mutation.operation,
            payload: mutation.payload,
            client_updated_at: mutation.client_updated_at,
            status: MutationStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Diagnostic snapshot of the sync engine for the UI layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub is_online: bool,
    pub queue_size: usize,
    pub pending: usize,
    pub failed: usize,
}
