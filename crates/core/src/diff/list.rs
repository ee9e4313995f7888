//! Sequence differ over identity-keyed entity lists.

use std::collections::BTreeSet;

use tracing::debug;

use super::DiffResult;
use crate::models::{Entity, EntityList};

/// Identity-level diff: names only in `candidate` are added, names only in
/// `base` are removed. Entities present in both are left alone.
pub fn list_diff<T: Entity>(base: &EntityList<T>, candidate: &EntityList<T>) -> DiffResult {
    let added = candidate
        .names()
        .filter(|name| !base.contains(name))
        .map(str::to_string)
        .collect();
    let removed = base
        .names()
        .filter(|name| !candidate.contains(name))
        .map(str::to_string)
        .collect();
    DiffResult {
        added,
        removed,
        modified: BTreeSet::new(),
    }
}

/// Names present on both sides whose entities are not structurally equal.
pub fn content_changes<T: Entity + PartialEq>(
    base: &EntityList<T>,
    candidate: &EntityList<T>,
) -> BTreeSet<String> {
    candidate
        .iter()
        .filter(|item| base.get(item.name()).is_some_and(|old| old != *item))
        .map(|item| item.name().to_string())
        .collect()
}

/// Identity diff plus content modifications.
pub fn entity_diff<T: Entity + PartialEq>(
    base: &EntityList<T>,
    candidate: &EntityList<T>,
) -> DiffResult {
    let diff = list_diff(base, candidate).with_modified(content_changes(base, candidate));
    debug!(
        kind = T::KIND,
        added = diff.added.len(),
        removed = diff.removed.len(),
        modified = diff.modified.len(),
        "entity list diff"
    );
    diff
}
