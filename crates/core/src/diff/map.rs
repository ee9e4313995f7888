//! Map differ over string-keyed mappings.
//!
//! Nested maps (language → translations) are compared with the same
//! function: the outer call reports a language as modified, and the
//! orchestrator re-diffs the inner maps of that language on their own.

use std::collections::BTreeMap;

use super::DiffResult;

/// Keys only in `candidate` are added, keys only in `base` are removed and
/// keys on both sides with unequal values are modified.
pub fn map_diff<V: PartialEq>(
    base: &BTreeMap<String, V>,
    candidate: &BTreeMap<String, V>,
) -> DiffResult {
    let mut diff = DiffResult::default();
    for (key, value) in candidate {
        match base.get(key) {
            None => {
                diff.added.insert(key.clone());
            }
            Some(old) if old != value => {
                diff.modified.insert(key.clone());
            }
            Some(_) => {}
        }
    }
    for key in base.keys() {
        if !candidate.contains_key(key) {
            diff.removed.insert(key.clone());
        }
    }
    diff
}
