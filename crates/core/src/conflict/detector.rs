//! Conflict detection logic.
//!
//! Given the local-vs-base and remote-vs-base diffs of one collection, the
//! detector finds identities that both sides changed since the common
//! ancestor.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::handle::MergeHandle;
use crate::diff::DiffResult;
use crate::models::ChangeType;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An identity touched by both sides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Overlap {
    pub key: String,
    pub local_change: ChangeType,
    pub remote_change: ChangeType,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Stateless conflict detector that compares two diffs against the same base.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Identities changed on both sides, in key order.
    ///
    /// An add on one side and a delete on the other is still an overlap.
    pub fn detect(local: &DiffResult, remote: &DiffResult) -> Vec<Overlap> {
        let mut keys = local.changed_keys();
        keys.extend(remote.changed_keys());

        keys.into_iter()
            .filter_map(|key| {
                let local_change = local.change_of(key);
                let remote_change = remote.change_of(key);
                (local_change.is_change() && remote_change.is_change()).then(|| Overlap {
                    key: key.to_string(),
                    local_change,
                    remote_change,
                })
            })
            .collect()
    }

    /// Build merge handles for the overlaps that cannot be merged
    /// mechanically.
    ///
    /// `local_of` and `remote_of` look up each side's candidate by key. An
    /// overlap where both sides made the same change with the same result is
    /// trivially reconcilable and yields no handle.
    pub fn find_conflicts<T, L, R>(
        local: &DiffResult,
        remote: &DiffResult,
        mut local_of: L,
        mut remote_of: R,
    ) -> Vec<MergeHandle<T>>
    where
        T: PartialEq,
        L: FnMut(&str) -> Option<T>,
        R: FnMut(&str) -> Option<T>,
    {
        let overlaps = Self::detect(local, remote);
        let mut handles = Vec::new();

        for overlap in overlaps {
            let local_candidate = local_of(&overlap.key);
            let remote_candidate = remote_of(&overlap.key);
            if overlap.local_change == overlap.remote_change && local_candidate == remote_candidate
            {
                debug!(key = %overlap.key, change = %overlap.local_change, "same change on both sides");
                continue;
            }
            debug!(
                key = %overlap.key,
                local_change = %overlap.local_change,
                remote_change = %overlap.remote_change,
                "conflict detected"
            );
            handles.push(MergeHandle::new(
                overlap.key,
                local_candidate,
                remote_candidate,
                overlap.local_change,
                overlap.remote_change,
            ));
        }

        if !handles.is_empty() {
            info!(count = handles.len(), "conflicts detected");
        }
        handles
    }
}
