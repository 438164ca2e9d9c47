//! Queue coalescing
//!
//! Collapses pending operations on the same resource so that at most one
//! mutation per key is retried. Superseded operations are dropped without
//! invoking their callbacks.
//!
//! Input is in queue order, which is enqueue order. Position decides which
//! operation is newest; `enqueued_at` stamps are never compared, since the
//! wall clock may step backwards between two submissions.

use std::collections::HashSet;

use resync_domain::OperationKind;

use super::operation::Operation;

/// Keep only the last queued operation for every unique key, regardless of
/// kind. Survivors keep their queue order.
pub fn coalesce(operations: Vec<Operation>) -> Vec<Operation> {
    let mut seen = HashSet::with_capacity(operations.len());
    let mut kept: Vec<Operation> = operations
        .into_iter()
        .rev()
        .filter(|op| seen.insert(op.unique_key()))
        .collect();
    kept.reverse();
    kept
}

/// Like [`coalesce`] for item-level keys. A group-level operation (empty
/// item key) is dropped only when a newer group-level Delete exists for the
/// same group; other group-level operations are all kept.
pub fn coalesce_groups(operations: Vec<Operation>) -> Vec<Operation> {
    let mut seen_items = HashSet::new();
    let mut deleted_groups = HashSet::new();
    let mut kept = Vec::with_capacity(operations.len());

    for op in operations.into_iter().rev() {
        if !op.is_group_level() {
            if seen_items.insert(op.unique_key()) {
                kept.push(op);
            }
            continue;
        }

        if deleted_groups.contains(&op.group_key) {
            continue;
        }
        if op.kind == OperationKind::Delete {
            deleted_groups.insert(op.group_key.clone());
        }
        kept.push(op);
    }

    kept.reverse();
    kept
}
