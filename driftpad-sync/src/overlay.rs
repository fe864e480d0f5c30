//! Note overlay — offline state shadows server results.

use driftpad_types::CachedNote;
use std::collections::{HashMap, HashSet};

/// Merges cached offline notes over a freshly fetched server result set.
///
/// Offline copies shadow server rows of the same id; notes flagged as
/// optimistically deleted are hidden entirely until the remote delete is
/// confirmed. `title`/`body` fall back to the server value when the offline
/// copy has none. Output is sorted by recency, newest first, so offline
/// edits surface at the top alongside fresh server data.
pub fn apply_note_overlay(
    server_notes: Vec<CachedNote>,
    offline_notes: &[CachedNote],
) -> Vec<CachedNote> {
    let deleted: HashSet<&str> = offline_notes
        .iter()
        .filter(|note| note.deleted)
        .map(|note| note.id.as_str())
        .collect();

    let mut merged: HashMap<String, CachedNote> = HashMap::new();
    for note in server_notes {
        if !deleted.contains(note.id.as_str()) {
            merged.insert(note.id.clone(), note);
        }
    }

    for offline in offline_notes {
        if offline.deleted {
            continue;
        }
        let mut note = offline.clone();
        if let Some(server) = merged.get(&offline.id) {
            if note.title.is_none() {
                note.title = server.title.clone();
            }
            if note.body.is_none() {
                note.body = server.body.clone();
            }
        }
        merged.insert(note.id.clone(), note);
    }

    let mut notes: Vec<CachedNote> = merged.into_values().collect();
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    notes
}
