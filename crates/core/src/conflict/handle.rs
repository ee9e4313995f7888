//! Merge handles: one conflicting entity or key with both candidates and a
//! single-assignment selected side.

use std::cell::OnceCell;

use tracing::debug;

use crate::errors::MergeError;
use crate::models::{ChangeType, ResultSide};

/// A pending or resolved conflict over one identity.
///
/// A candidate is `None` when that side deleted the identity. The selected
/// side can be set exactly once; a second assignment is rejected.
#[derive(Debug, Clone)]
pub struct MergeHandle<T> {
    key: String,
    local: Option<T>,
    remote: Option<T>,
    local_change: ChangeType,
    remote_change: ChangeType,
    selected: OnceCell<ResultSide>,
}

impl<T> MergeHandle<T> {
    pub fn new(
        key: impl Into<String>,
        local: Option<T>,
        remote: Option<T>,
        local_change: ChangeType,
        remote_change: ChangeType,
    ) -> Self {
        Self {
            key: key.into(),
            local,
            remote,
            local_change,
            remote_change,
            selected: OnceCell::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn local(&self) -> Option<&T> {
        self.local.as_ref()
    }

    pub fn remote(&self) -> Option<&T> {
        self.remote.as_ref()
    }

    pub fn local_change(&self) -> ChangeType {
        self.local_change
    }

    pub fn remote_change(&self) -> ChangeType {
        self.remote_change
    }

    pub fn candidate(&self, side: ResultSide) -> Option<&T> {
        match side {
            ResultSide::Base => None,
            ResultSide::Local => self.local.as_ref(),
            ResultSide::Remote => self.remote.as_ref(),
        }
    }

    pub fn change_relative_to(&self, side: ResultSide) -> ChangeType {
        match side {
            ResultSide::Base => ChangeType::None,
            ResultSide::Local => self.local_change,
            ResultSide::Remote => self.remote_change,
        }
    }

    pub fn selected_side(&self) -> Option<ResultSide> {
        self.selected.get().copied()
    }

    pub fn is_resolved(&self) -> bool {
        self.selected.get().is_some()
    }

    /// Record the chosen side. Only local or remote can be chosen, once.
    pub fn select(&self, side: ResultSide) -> Result<(), MergeError> {
        if side == ResultSide::Base {
            return Err(MergeError::InvalidSide {
                key: self.key.clone(),
                side: side.to_string(),
            });
        }
        self.selected
            .set(side)
            .map_err(|_| MergeError::AlreadyResolved {
                key: self.key.clone(),
            })?;
        debug!(key = %self.key, side = %side, "merge handle resolved");
        Ok(())
    }

    /// Candidate of the selected side. `None` while unresolved or when the
    /// selected side deleted the identity.
    pub fn selected_result(&self) -> Option<&T> {
        self.candidate(self.selected_side()?)
    }

    /// Change classification of the selected side, once resolved.
    pub fn selected_change(&self) -> Option<ChangeType> {
        self.selected_side().map(|side| self.change_relative_to(side))
    }
}

// ---------------------------------------------------------------------------
// Type-erased view
// ---------------------------------------------------------------------------

/// Object-safe view of any merge handle, used by resolution collaborators.
pub trait Resolvable {
    fn key(&self) -> &str;
    fn local_change(&self) -> ChangeType;
    fn remote_change(&self) -> ChangeType;
    fn selected_side(&self) -> Option<ResultSide>;
    fn select(&self, side: ResultSide) -> Result<(), MergeError>;

    fn is_resolved(&self) -> bool {
        self.selected_side().is_some()
    }
}

impl<T> Resolvable for MergeHandle<T> {
    fn key(&self) -> &str {
        MergeHandle::key(self)
    }

    fn local_change(&self) -> ChangeType {
        self.local_change
    }

    fn remote_change(&self) -> ChangeType {
        self.remote_change
    }

    fn selected_side(&self) -> Option<ResultSide> {
        MergeHandle::selected_side(self)
    }

    fn select(&self, side: ResultSide) -> Result<(), MergeError> {
        MergeHandle::select(self, side)
    }
}
