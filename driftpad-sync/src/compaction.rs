//! Mutation queue compaction.
//!
//! Before a drain touches the network, the persisted queue is collapsed so
//! that each note carries at most one item:
//!
//! - a `create` followed by any number of `update`s (and no `delete`)
//!   collapses to one `create` carrying the most recent payload;
//! - a group ending in `delete` collapses to a single `delete`, regardless
//!   of preceding operations;
//! - otherwise same-operation runs collapse to the last payload.
//!
//! The surviving item is the group's latest one with the operation tag
//! replaced per the precedence above and its status reset to `pending`,
//! which also re-arms items that failed on an earlier pass. Compaction never
//! crosses note boundaries and is idempotent.

use driftpad_types::{MutationOperation, MutationQueueItem, MutationStatus};
use std::collections::HashMap;

pub fn compact_queue(items: Vec<MutationQueueItem>) -> Vec<MutationQueueItem> {
    let mut groups: HashMap<String, Vec<MutationQueueItem>> = HashMap::new();
    for item in items {
        groups.entry(item.note_id.clone()).or_default().push(item);
    }

    let mut result = Vec::with_capacity(groups.len());
    for (_, mut group) in groups {
        // Stable sort: equal timestamps keep enqueue order.
        group.sort_by_key(|item| item.client_updated_at);
        let has_create = group
            .iter()
            .any(|item| item.operation == MutationOperation::Create);
        let Some(mut survivor) = group.pop() else {
            continue;
        };

        if survivor.operation != MutationOperation::Delete && has_create {
            survivor.operation = MutationOperation::Create;
        }
        survivor.status = MutationStatus::Pending;
        survivor.last_error = None;
        result.push(survivor);
    }

    // Global client-timestamp order; effects across notes are never
    // reordered relative to their enqueue times.
    result.sort_by(|a, b| {
        a.client_updated_at
            .cmp(&b.client_updated_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    result
}
