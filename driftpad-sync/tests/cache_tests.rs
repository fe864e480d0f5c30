use chrono::{DateTime, Utc};
use driftpad_storage::MemoryStore;
use driftpad_sync::{apply_note_overlay, CacheEngine};
use driftpad_types::{CachedNote, NoteSyncStatus};
use std::sync::Arc;

fn ts(offset_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
}

fn note(id: &str, status: NoteSyncStatus, body: &str, offset_secs: i64) -> CachedNote {
    CachedNote {
        id: id.into(),
        status,
        title: Some(format!("Note {id}")),
        body: Some(body.into()),
        tags: vec![],
        deleted: false,
        updated_at: ts(offset_secs),
    }
}

#[tokio::test]
async fn empty_cache_loads_as_empty_list() {
    let cache = CacheEngine::new(Arc::new(MemoryStore::new()));
    assert!(cache.load_notes(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn load_notes_returns_recency_order_with_pagination() {
    let cache = CacheEngine::new(Arc::new(MemoryStore::new()));
    for (id, offset) in [("a", 10), ("b", 30), ("c", 20)] {
        cache
            .save_note(&note(id, NoteSyncStatus::Synced, "x", offset))
            .await
            .unwrap();
    }

    let all = cache.load_notes(None, None).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);

    let page = cache.load_notes(Some(1), Some(1)).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, "c");
}

#[tokio::test]
async fn every_write_enforces_the_byte_budget() {
    // Budget small enough that two notes cannot coexist.
    let store = Arc::new(MemoryStore::with_limit(300));
    let cache = CacheEngine::new(store);

    cache
        .save_note(&note("old", NoteSyncStatus::Synced, &"x".repeat(150), 0))
        .await
        .unwrap();
    cache
        .save_note(&note("new", NoteSyncStatus::Synced, &"y".repeat(150), 100))
        .await
        .unwrap();

    let notes = cache.load_notes(None, None).await.unwrap();
    let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["new"], "least-recently-updated synced note evicted");
}

#[tokio::test]
async fn eviction_never_removes_unsynced_work() {
    let store = Arc::new(MemoryStore::with_limit(300));
    let cache = CacheEngine::new(store);

    // The pending note is the oldest, the conflict note next; both carry
    // unsynced user work and must survive over-budget pressure.
    cache
        .save_note(&note("pending", NoteSyncStatus::Pending, &"p".repeat(200), 0))
        .await
        .unwrap();
    cache
        .save_note(&note("conflict", NoteSyncStatus::Conflict, &"c".repeat(200), 10))
        .await
        .unwrap();
    cache
        .save_note(&note("synced", NoteSyncStatus::Synced, &"s".repeat(200), 20))
        .await
        .unwrap();

    let notes = cache.load_notes(None, None).await.unwrap();
    let mut ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["conflict", "pending"]);
}

#[tokio::test]
async fn delete_note_is_idempotent() {
    let cache = CacheEngine::new(Arc::new(MemoryStore::new()));
    cache
        .save_note(&note("a", NoteSyncStatus::Synced, "x", 0))
        .await
        .unwrap();

    cache.delete_note("a").await.unwrap();
    cache.delete_note("a").await.unwrap();
    cache.delete_note("never-existed").await.unwrap();

    assert!(cache.load_notes(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn mark_synced_stamps_but_never_regresses() {
    let cache = CacheEngine::new(Arc::new(MemoryStore::new()));
    cache
        .save_note(&note("a", NoteSyncStatus::Pending, "x", 100))
        .await
        .unwrap();

    cache.mark_synced("a", ts(200)).await.unwrap();
    let notes = cache.load_notes(None, None).await.unwrap();
    assert_eq!(notes[0].status, NoteSyncStatus::Synced);
    assert_eq!(notes[0].updated_at, ts(200));

    // An older server timestamp must not move recency backwards.
    cache.mark_synced("a", ts(50)).await.unwrap();
    let notes = cache.load_notes(None, None).await.unwrap();
    assert_eq!(notes[0].updated_at, ts(200));
}

#[tokio::test]
async fn cache_limit_bytes_reports_the_configured_budget() {
    let cache = CacheEngine::new(Arc::new(MemoryStore::with_limit(12_345)));
    assert_eq!(cache.cache_limit_bytes(), 12_345);
}

// ── Overlay ──────────────────────────────────────────────────────

#[test]
fn overlay_shadows_server_rows_with_offline_copies() {
    let server = vec![
        note("a", NoteSyncStatus::Synced, "server-a", 10),
        note("b", NoteSyncStatus::Synced, "server-b", 20),
    ];
    let offline = vec![note("a", NoteSyncStatus::Pending, "local-a", 30)];

    let merged = apply_note_overlay(server, &offline);

    assert_eq!(merged.len(), 2);
    let a = merged.iter().find(|n| n.id == "a").unwrap();
    assert_eq!(a.body.as_deref(), Some("local-a"));
    assert_eq!(a.status, NoteSyncStatus::Pending);
}

#[test]
fn overlay_hides_optimistically_deleted_notes() {
    let server = vec![note("a", NoteSyncStatus::Synced, "server-a", 10)];
    let mut tombstone = note("a", NoteSyncStatus::Pending, "gone", 20);
    tombstone.deleted = true;

    let merged = apply_note_overlay(server, &[tombstone]);
    assert!(merged.is_empty());
}

#[test]
fn overlay_fills_missing_fields_from_the_server_copy() {
    let server = vec![note("a", NoteSyncStatus::Synced, "server-body", 10)];
    let offline = vec![CachedNote {
        id: "a".into(),
        status: NoteSyncStatus::Pending,
        title: Some("local title".into()),
        body: None,
        tags: vec![],
        deleted: false,
        updated_at: ts(20),
    }];

    let merged = apply_note_overlay(server, &offline);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].title.as_deref(), Some("local title"));
    assert_eq!(merged[0].body.as_deref(), Some("server-body"));
}

#[test]
fn overlay_sorts_newest_first() {
    let server = vec![note("old", NoteSyncStatus::Synced, "x", 10)];
    let offline = vec![note("fresh", NoteSyncStatus::Pending, "y", 99)];

    let merged = apply_note_overlay(server, &offline);

    let ids: Vec<&str> = merged.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["fresh", "old"]);
}
