//! Conflict resolution collaborators.
//!
//! A [`ConflictResolver`] receives the handles a merge could not settle and
//! returns once it has selected a side for each of them. The sync driver
//! checks afterwards that nothing was left unresolved.

use tracing::info;

use super::handle::{MergeHandle, Resolvable};
use super::workspace::WorkspaceMergeHandles;
use crate::errors::MergeError;
use crate::file_sync::FileSyncHandle;
use crate::models::ResultSide;

/// Resolution collaborator (interactive prompt, policy, GUI bridge, ...).
pub trait ConflictResolver {
    /// Select a side for every workspace-level handle.
    fn resolve_workspace(&mut self, handles: &WorkspaceMergeHandles) -> Result<(), MergeError>;

    /// Select a side for every file that could not be classified.
    fn resolve_files(&mut self, handles: &[MergeHandle<FileSyncHandle>]) -> Result<(), MergeError>;
}

/// Resolves every conflict toward one fixed side.
#[derive(Debug, Clone, Copy)]
pub struct PreferSideResolver {
    side: ResultSide,
}

impl PreferSideResolver {
    pub fn new(side: ResultSide) -> Self {
        Self { side }
    }

    pub fn local() -> Self {
        Self::new(ResultSide::Local)
    }

    pub fn remote() -> Self {
        Self::new(ResultSide::Remote)
    }

    fn select_all<'a>(
        &self,
        handles: impl IntoIterator<Item = &'a dyn Resolvable>,
    ) -> Result<usize, MergeError> {
        let mut resolved = 0;
        for handle in handles {
            if !handle.is_resolved() {
                handle.select(self.side)?;
                resolved += 1;
            }
        }
        Ok(resolved)
    }
}

impl ConflictResolver for PreferSideResolver {
    fn resolve_workspace(&mut self, handles: &WorkspaceMergeHandles) -> Result<(), MergeError> {
        let entries = handles.entries();
        let resolved = self.select_all(entries.iter().map(|e| e.handle))?;
        info!(side = %self.side, resolved, "workspace conflicts resolved by preference");
        Ok(())
    }

    fn resolve_files(&mut self, handles: &[MergeHandle<FileSyncHandle>]) -> Result<(), MergeError> {
        let resolved = self.select_all(handles.iter().map(|h| h as &dyn Resolvable))?;
        info!(side = %self.side, resolved, "file conflicts resolved by preference");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeType, Translations};

    #[test]
    fn test_prefer_side_resolves_everything() {
        let mut handles = WorkspaceMergeHandles::default();
        handles.languages.push(MergeHandle::new(
            "de",
            Some(Translations::new()),
            None,
            ChangeType::Add,
            ChangeType::None,
        ));
        handles.translations.insert(
            "en".into(),
            vec![MergeHandle::new(
                "farewell",
                Some("bye".to_string()),
                Some("see ya".to_string()),
                ChangeType::Add,
                ChangeType::Add,
            )],
        );

        PreferSideResolver::remote()
            .resolve_workspace(&handles)
            .unwrap();
        assert_eq!(handles.unresolved(), 0);
        assert_eq!(
            handles.translations["en"][0].selected_result().map(String::as_str),
            Some("see ya")
        );
    }

    #[test]
    fn test_prefer_side_skips_resolved_handles() {
        let file = FileSyncHandle::new(
            "README.md",
            Some(b"a".to_vec()),
            Some(b"b".to_vec()),
            Some(b"c".to_vec()),
            true,
        );
        let handles = vec![file.to_path_merge_handle()];
        handles[0].select(ResultSide::Remote).unwrap();

        PreferSideResolver::local().resolve_files(&handles).unwrap();
        assert_eq!(handles[0].selected_side(), Some(ResultSide::Remote));
    }
}
