//! File-level change records handed over by the version-control layer.

use crate::conflict::MergeHandle;
use crate::models::{ChangeType, ResultSide};

/// One path touched by a merge, with its three versions.
///
/// `local_change` and `remote_change` describe how each side changed the
/// file relative to the common ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSyncHandle {
    /// Path relative to the project root, `/`-separated.
    pub path: String,
    base: Option<Vec<u8>>,
    local: Option<Vec<u8>>,
    remote: Option<Vec<u8>>,
    /// The transport could not merge this file textually.
    pub unmerged: bool,
    pub local_change: ChangeType,
    pub remote_change: ChangeType,
}

impl FileSyncHandle {
    /// Build a record from the three optional contents, classifying each
    /// side against the base.
    pub fn new(
        path: impl Into<String>,
        base: Option<Vec<u8>>,
        local: Option<Vec<u8>>,
        remote: Option<Vec<u8>>,
        unmerged: bool,
    ) -> Self {
        let local_change = classify(base.as_deref(), local.as_deref());
        let remote_change = classify(base.as_deref(), remote.as_deref());
        Self {
            path: path.into(),
            base,
            local,
            remote,
            unmerged,
            local_change,
            remote_change,
        }
    }

    pub fn bytes(&self, side: ResultSide) -> Option<&[u8]> {
        match side {
            ResultSide::Base => self.base.as_deref(),
            ResultSide::Local => self.local.as_deref(),
            ResultSide::Remote => self.remote.as_deref(),
        }
    }

    pub fn change_relative_to(&self, side: ResultSide) -> ChangeType {
        match side {
            ResultSide::Base => ChangeType::None,
            ResultSide::Local => self.local_change,
            ResultSide::Remote => self.remote_change,
        }
    }

    /// Escalation handle for a file nobody could classify.
    pub fn to_path_merge_handle(&self) -> MergeHandle<FileSyncHandle> {
        MergeHandle::new(
            self.path.clone(),
            Some(self.clone()),
            Some(self.clone()),
            self.local_change,
            self.remote_change,
        )
    }
}

fn classify(base: Option<&[u8]>, side: Option<&[u8]>) -> ChangeType {
    match (base, side) {
        (None, Some(_)) => ChangeType::Add,
        (Some(_), None) => ChangeType::Delete,
        (Some(b), Some(s)) if b != s => ChangeType::Modify,
        _ => ChangeType::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_per_side() {
        let handle = FileSyncHandle::new(
            "elements/Ruby.mod.json",
            Some(b"base".to_vec()),
            None,
            Some(b"remote".to_vec()),
            true,
        );
        assert_eq!(handle.change_relative_to(ResultSide::Local), ChangeType::Delete);
        assert_eq!(handle.change_relative_to(ResultSide::Remote), ChangeType::Modify);
        assert_eq!(handle.bytes(ResultSide::Remote), Some(&b"remote"[..]));
        assert_eq!(handle.bytes(ResultSide::Local), None);

        let added = FileSyncHandle::new("new.txt", None, Some(b"x".to_vec()), None, false);
        assert_eq!(added.local_change, ChangeType::Add);
        assert_eq!(added.remote_change, ChangeType::None);
    }

    #[test]
    fn test_path_merge_handle_carries_both_changes() {
        let handle = FileSyncHandle::new(
            "README.md",
            Some(b"a".to_vec()),
            Some(b"b".to_vec()),
            Some(b"c".to_vec()),
            true,
        );
        let merge = handle.to_path_merge_handle();
        assert_eq!(merge.key(), "README.md");
        assert_eq!(merge.local_change(), ChangeType::Modify);
        assert_eq!(merge.remote_change(), ChangeType::Modify);
        assert!(!merge.is_resolved());
    }
}
