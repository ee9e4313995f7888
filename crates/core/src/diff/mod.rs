//! Semantic differs for identity-keyed collections and key/value maps.
//!
//! Both differs produce a [`DiffResult`] describing one candidate against
//! the common ancestor. Running them twice (local vs base, remote vs base)
//! yields the pair of diffs the conflict detector compares.

pub mod list;
pub mod map;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::ChangeType;

pub use list::{content_changes, entity_diff, list_diff};
pub use map::map_diff;

/// Identities added, removed and modified by one candidate.
///
/// `added` and `removed` are disjoint. `modified` holds identities present
/// on both sides whose content differs; it is only populated by content
/// aware diffs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub modified: BTreeSet<String>,
}

impl DiffResult {
    /// Attach content-level modifications to an identity-level diff.
    pub fn with_modified(mut self, modified: BTreeSet<String>) -> Self {
        self.modified = modified;
        self
    }

    /// Classification of `key` in this diff.
    pub fn change_of(&self, key: &str) -> ChangeType {
        if self.added.contains(key) {
            ChangeType::Add
        } else if self.removed.contains(key) {
            ChangeType::Delete
        } else if self.modified.contains(key) {
            ChangeType::Modify
        } else {
            ChangeType::None
        }
    }

    /// Every identity this diff touches.
    pub fn changed_keys(&self) -> BTreeSet<&str> {
        self.added
            .iter()
            .chain(&self.removed)
            .chain(&self.modified)
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}
