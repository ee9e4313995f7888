//! Property tests for structured diff and the workspace merge.
//!
//! Workspaces are generated as plain `name -> value` maps of variables so
//! the expected three-way result of every key can be computed directly.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use worksync_core::conflict::{ConflictDetector, WorkspaceMergeHandles};
use worksync_core::diff::map_diff;
use worksync_core::generator::ArtifactGenerator;
use worksync_core::merge::{RecursiveFolderMerger, WorkspaceMerger};
use worksync_core::models::{ModElement, Snapshot, VariableElement, WorkspaceSettings};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Values = BTreeMap<String, String>;

struct NullGenerator;

impl ArtifactGenerator for NullGenerator {
    fn owner_of(&self, _path: &str, _snapshot: &Snapshot) -> Option<String> {
        None
    }

    fn regenerate_element(&mut self, _element: &ModElement) {}

    fn regenerate_base(&mut self) {}
}

fn snapshot(values: &Values) -> Snapshot {
    let mut snapshot = Snapshot::new(WorkspaceSettings::default());
    for (name, value) in values {
        snapshot.variables.upsert(VariableElement {
            name: name.clone(),
            var_type: "string".into(),
            scope: "global_map".into(),
            value: value.clone(),
        });
    }
    snapshot
}

fn values(snapshot: &Snapshot) -> Values {
    snapshot
        .variables
        .iter()
        .map(|v| (v.name.clone(), v.value.clone()))
        .collect()
}

/// Merge into a copy of `base`, returning the merged values and the keys
/// left as conflicts.
fn merge(base: &Values, local: &Values, remote: &Values) -> (Values, BTreeSet<String>) {
    let mut working = snapshot(base);
    let mut handles = WorkspaceMergeHandles::default();
    let mut generator = NullGenerator;
    let tree_merger = RecursiveFolderMerger;
    WorkspaceMerger::new(&mut generator, &tree_merger, false).merge(
        &mut working,
        &snapshot(local),
        &snapshot(remote),
        &mut handles,
    );
    let conflicts = handles
        .variables
        .iter()
        .map(|h| h.key().to_string())
        .collect();
    (values(&working), conflicts)
}

fn arb_values(keys: &'static str) -> impl Strategy<Value = Values> {
    prop::collection::btree_map(keys, "[0-2]", 0..6)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Diff sets are disjoint and describe exactly how the maps differ.
    #[test]
    fn prop_map_diff_partitions_keys(base in arb_values("[a-f]"), candidate in arb_values("[a-f]")) {
        let diff = map_diff(&base, &candidate);
        prop_assert!(diff.added.is_disjoint(&diff.removed));
        prop_assert!(diff.added.is_disjoint(&diff.modified));
        prop_assert!(diff.removed.is_disjoint(&diff.modified));

        let mut keys: BTreeSet<&String> = base.keys().collect();
        keys.extend(candidate.keys());
        for key in keys {
            let changed = base.get(key) != candidate.get(key);
            prop_assert_eq!(changed, diff.changed_keys().contains(key.as_str()));
        }

        let mut identities: BTreeSet<String> = base.keys().cloned().collect();
        identities.retain(|key| !diff.removed.contains(key));
        identities.extend(diff.added.iter().cloned());
        prop_assert_eq!(identities, candidate.keys().cloned().collect::<BTreeSet<_>>());
    }

    /// Overlap detection does not depend on which side is called local.
    #[test]
    fn prop_detection_is_symmetric(
        base in arb_values("[a-f]"),
        local in arb_values("[a-f]"),
        remote in arb_values("[a-f]"),
    ) {
        let local_diff = map_diff(&base, &local);
        let remote_diff = map_diff(&base, &remote);
        let forward = ConflictDetector::detect(&local_diff, &remote_diff);
        let backward = ConflictDetector::detect(&remote_diff, &local_diff);

        prop_assert_eq!(forward.len(), backward.len());
        for (f, b) in forward.iter().zip(&backward) {
            prop_assert_eq!(&f.key, &b.key);
            prop_assert_eq!(f.local_change, b.remote_change);
            prop_assert_eq!(f.remote_change, b.local_change);
        }
    }

    /// Every key ends up with the side that changed it, and only keys both
    /// sides changed differently are left as conflicts (still at base).
    #[test]
    fn prop_merge_takes_each_sides_changes(
        base in arb_values("[a-f]"),
        local in arb_values("[a-f]"),
        remote in arb_values("[a-f]"),
    ) {
        let (merged, conflicts) = merge(&base, &local, &remote);

        let mut keys: BTreeSet<&String> = base.keys().collect();
        keys.extend(local.keys());
        keys.extend(remote.keys());
        for key in keys {
            let (b, l, r) = (base.get(key), local.get(key), remote.get(key));
            let conflicting = l != b && r != b && l != r;
            prop_assert_eq!(conflicting, conflicts.contains(key.as_str()), "key {}", key);

            let expected = if conflicting {
                b
            } else if l == b {
                r
            } else {
                l
            };
            prop_assert_eq!(merged.get(key), expected, "key {}", key);
        }

        let (again, conflicts) = merge(&merged, &merged, &merged);
        prop_assert!(conflicts.is_empty());
        prop_assert_eq!(again, merged);
    }

    /// Changes to disjoint keys always merge cleanly into their union.
    #[test]
    fn prop_disjoint_changes_merge_cleanly(
        shared in arb_values("s[a-c]"),
        base_low in arb_values("l[a-c]"),
        base_high in arb_values("h[a-c]"),
        local_low in arb_values("l[a-c]"),
        remote_high in arb_values("h[a-c]"),
    ) {
        let union = |parts: &[&Values]| -> Values {
            parts.iter().flat_map(|p| p.iter()).map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let base = union(&[&shared, &base_low, &base_high]);
        let local = union(&[&shared, &local_low, &base_high]);
        let remote = union(&[&shared, &base_low, &remote_high]);

        let (merged, conflicts) = merge(&base, &local, &remote);
        prop_assert!(conflicts.is_empty());
        prop_assert_eq!(merged, union(&[&shared, &local_low, &remote_high]));
    }

    /// Merging a side with itself yields that side.
    #[test]
    fn prop_identical_sides_merge_to_that_side(
        base in arb_values("[a-f]"),
        side in arb_values("[a-f]"),
    ) {
        let (merged, conflicts) = merge(&base, &side, &side);
        prop_assert!(conflicts.is_empty());
        prop_assert_eq!(merged, side);
    }

    /// An unchanged side contributes nothing.
    #[test]
    fn prop_unchanged_side_is_neutral(
        base in arb_values("[a-f]"),
        side in arb_values("[a-f]"),
    ) {
        let (merged, conflicts) = merge(&base, &base, &side);
        prop_assert!(conflicts.is_empty());
        prop_assert_eq!(&merged, &side);

        let (merged, conflicts) = merge(&base, &side, &base);
        prop_assert!(conflicts.is_empty());
        prop_assert_eq!(merged, side);
    }
}
