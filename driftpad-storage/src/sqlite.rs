//! SQLite-backed storage adapter.
//!
//! The durable per-platform store: one `notes` table for the local mirror
//! and one `mutation_queue` table for the outbound queue. Queue order is
//! insertion order (`rowid`); upserts keep an item's row so its position
//! survives in-place status updates. The connection lock is never held
//! across an await — every operation is a short synchronous burst.

use crate::error::{StorageError, StorageResult};
use crate::store::{NoteFilter, OfflineStore};
use crate::DEFAULT_CACHE_LIMIT_BYTES;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use driftpad_types::{CachedNote, MutationQueueItem, MutationStatus, NoteSyncStatus};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Durable [`OfflineStore`] backed by an embedded SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    limit_bytes: u64,
}

impl SqliteStore {
    /// Opens or creates a store at the given path with the default cache
    /// budget.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_limit(path, DEFAULT_CACHE_LIMIT_BYTES)
    }

    /// Opens or creates a store with an explicit cache byte budget.
    pub fn open_with_limit(path: &Path, limit_bytes: u64) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            limit_bytes,
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::open_in_memory_with_limit(DEFAULT_CACHE_LIMIT_BYTES)
    }

    /// Opens an in-memory store with an explicit cache byte budget.
    pub fn open_in_memory_with_limit(limit_bytes: u64) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            limit_bytes,
        })
    }
}

/// Fixed-width UTC timestamps so that lexicographic column order equals
/// chronological order.
fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_from_sql(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

type NoteRow = (String, String, Option<String>, Option<String>, String, bool, String);

fn note_from_row(row: NoteRow) -> StorageResult<CachedNote> {
    let (id, status, title, body, tags, deleted, updated_at) = row;
    Ok(CachedNote {
        id,
        status: status
            .parse::<NoteSyncStatus>()
            .map_err(StorageError::Corrupt)?,
        title,
        body,
        tags: serde_json::from_str(&tags)?,
        deleted,
        updated_at: ts_from_sql(&updated_at)?,
    })
}

type QueueRow = (String, String, String, String, String, String, u32, Option<String>);

fn item_from_row(row: QueueRow) -> StorageResult<MutationQueueItem> {
    let (id, note_id, operation, payload, client_updated_at, status, attempts, last_error) = row;
    Ok(MutationQueueItem {
        id,
        note_id,
        operation: operation.parse().map_err(StorageError::Corrupt)?,
        payload: serde_json::from_str(&payload)?,
        client_updated_at: ts_from_sql(&client_updated_at)?,
        status: status.parse().map_err(StorageError::Corrupt)?,
        attempts,
        last_error,
    })
}

/// Byte estimate of a note row, summed over its text columns. Mirrors what
/// the serialized row costs on disk closely enough for the budget check.
const NOTE_BYTES_EXPR: &str = "LENGTH(id) + LENGTH(status) + COALESCE(LENGTH(title), 0) \
     + COALESCE(LENGTH(body), 0) + LENGTH(tags) + LENGTH(updated_at)";

const QUEUE_BYTES_EXPR: &str = "LENGTH(id) + LENGTH(note_id) + LENGTH(operation) \
     + LENGTH(payload) + LENGTH(client_updated_at) + LENGTH(status) \
     + COALESCE(LENGTH(last_error), 0)";

fn insert_queue_item(conn: &Connection, item: &MutationQueueItem) -> StorageResult<()> {
    conn.execute(
        r#"
        INSERT INTO mutation_queue (
            id, note_id, operation, payload, client_updated_at,
            status, attempts, last_error
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            note_id = excluded.note_id,
            operation = excluded.operation,
            payload = excluded.payload,
            client_updated_at = excluded.client_updated_at,
            status = excluded.status,
            attempts = excluded.attempts,
            last_error = excluded.last_error
        "#,
        params![
            item.id,
            item.note_id,
            item.operation.to_string(),
            serde_json::to_string(&item.payload)?,
            ts_to_sql(item.client_updated_at),
            item.status.to_string(),
            item.attempts,
            item.last_error.as_deref(),
        ],
    )?;
    Ok(())
}

fn save_note_row(conn: &Connection, note: &CachedNote) -> StorageResult<()> {
    conn.execute(
        r#"
        INSERT INTO notes (id, status, title, body, tags, deleted, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            title = excluded.title,
            body = excluded.body,
            tags = excluded.tags,
            deleted = excluded.deleted,
            updated_at = excluded.updated_at
        "#,
        params![
            note.id,
            note.status.to_string(),
            note.title.as_deref(),
            note.body.as_deref(),
            serde_json::to_string(&note.tags)?,
            note.deleted,
            ts_to_sql(note.updated_at),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl OfflineStore for SqliteStore {
    async fn load_notes(&self, filter: NoteFilter) -> StorageResult<Vec<CachedNote>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, status, title, body, tags, deleted, updated_at \
             FROM notes ORDER BY updated_at DESC",
        );
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        } else if filter.offset.is_some() {
            sql.push_str(" LIMIT -1");
        }
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<NoteRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(note_from_row).collect()
    }

    async fn save_note(&self, note: &CachedNote) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        save_note_row(&conn, note)
    }

    async fn save_notes(&self, notes: &[CachedNote]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        for note in notes {
            save_note_row(&conn, note)?;
        }
        Ok(())
    }

    async fn delete_note(&self, note_id: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM notes WHERE id = ?", params![note_id])?;
        Ok(())
    }

    async fn mark_synced(&self, note_id: &str, updated_at: DateTime<Utc>) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let stored: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM notes WHERE id = ?",
                params![note_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let Some(stored) = stored else {
            return Ok(());
        };

        // Never regress the recency of a synced note.
        let stamped = ts_from_sql(&stored)?.max(updated_at);
        conn.execute(
            "UPDATE notes SET status = ?, updated_at = ? WHERE id = ?",
            params![
                NoteSyncStatus::Synced.to_string(),
                ts_to_sql(stamped),
                note_id
            ],
        )?;
        Ok(())
    }

    async fn enforce_limit(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let note_bytes: i64 = conn.query_row(
            &format!("SELECT COALESCE(SUM({NOTE_BYTES_EXPR}), 0) FROM notes"),
            [],
            |row| row.get(0),
        )?;
        let queue_bytes: i64 = conn.query_row(
            &format!("SELECT COALESCE(SUM({QUEUE_BYTES_EXPR}), 0) FROM mutation_queue"),
            [],
            |row| row.get(0),
        )?;

        let mut total = (note_bytes + queue_bytes) as u64;
        if total <= self.limit_bytes {
            return Ok(0);
        }

        // Oldest synced notes first; unsynced work is never evicted.
        let mut stmt = conn.prepare(&format!(
            "SELECT id, {NOTE_BYTES_EXPR} FROM notes \
             WHERE status = 'synced' ORDER BY updated_at ASC"
        ))?;
        let candidates: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let mut evicted = 0usize;
        for (id, size) in candidates {
            if total <= self.limit_bytes {
                break;
            }
            conn.execute("DELETE FROM notes WHERE id = ?", params![id])?;
            total = total.saturating_sub(size as u64);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, limit_bytes = self.limit_bytes, "evicted synced notes");
        }
        Ok(evicted)
    }

    fn cache_limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    async fn clear_all(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DELETE FROM notes; DELETE FROM mutation_queue;")?;
        Ok(())
    }

    async fn get_queue(&self) -> StorageResult<Vec<MutationQueueItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, note_id, operation, payload, client_updated_at, \
                    status, attempts, last_error \
             FROM mutation_queue ORDER BY rowid ASC",
        )?;
        let rows: Vec<QueueRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(item_from_row).collect()
    }

    async fn upsert_queue_item(&self, item: &MutationQueueItem) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        insert_queue_item(&conn, item)
    }

    async fn replace_queue(&self, items: &[MutationQueueItem]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM mutation_queue", [])?;
        for item in items {
            insert_queue_item(&conn, item)?;
        }
        Ok(())
    }

    async fn get_pending_batch(&self, size: usize) -> StorageResult<Vec<MutationQueueItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, note_id, operation, payload, client_updated_at, \
                    status, attempts, last_error \
             FROM mutation_queue WHERE status = 'pending' \
             ORDER BY rowid ASC LIMIT ?",
        )?;
        let rows: Vec<QueueRow> = stmt
            .query_map(params![size as i64], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(item_from_row).collect()
    }

    async fn remove_queue_items(&self, ids: &[String]) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        for id in ids {
            conn.execute("DELETE FROM mutation_queue WHERE id = ?", params![id])?;
        }
        Ok(())
    }

    async fn mark_queue_item_status(
        &self,
        id: &str,
        status: MutationStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        match status {
            MutationStatus::Failed => {
                conn.execute(
                    "UPDATE mutation_queue \
                     SET status = ?, attempts = attempts + 1, last_error = ? \
                     WHERE id = ?",
                    params![status.to_string(), error, id],
                )?;
            }
            MutationStatus::Pending => {
                conn.execute(
                    "UPDATE mutation_queue SET status = ?, last_error = NULL WHERE id = ?",
                    params![status.to_string(), id],
                )?;
            }
        }
        Ok(())
    }
}

fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            title TEXT,
            body TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            deleted INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notes_updated ON notes(updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_notes_status ON notes(status);

        CREATE TABLE IF NOT EXISTS mutation_queue (
            id TEXT PRIMARY KEY,
            note_id TEXT NOT NULL,
            operation TEXT NOT NULL,
            payload TEXT NOT NULL,
            client_updated_at TEXT NOT NULL,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_queue_status ON mutation_queue(status);
        CREATE INDEX IF NOT EXISTS idx_queue_note ON mutation_queue(note_id);
        "#,
    )?;
    Ok(())
}
