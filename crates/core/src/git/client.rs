//! Local Git repository operations via `git2`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use git2::{ErrorCode, IndexAddOption, IndexEntry, Repository, Tree};
use tracing::{debug, info, instrument};

use super::Transport;
use crate::errors::GitError;
use crate::file_sync::FileSyncHandle;

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Whether a merge is in progress (`MERGE_HEAD` exists).
    pub fn is_merging(&self) -> bool {
        self.repo.find_reference("MERGE_HEAD").is_ok()
    }

    /// Change records of the merge in progress.
    ///
    /// Index conflicts are reported as unmerged, with the ancestor, ours and
    /// theirs stages as base, local and remote. Every other path the merged
    /// branch changed since the merge base is reported as merged.
    #[instrument(skip(self), fields(path = %self.repo_path.display()))]
    pub fn changed_files(&self) -> Result<Vec<FileSyncHandle>, GitError> {
        let theirs = self
            .repo
            .find_reference("MERGE_HEAD")
            .map_err(|_| GitError::NotMerging(self.repo_path.display().to_string()))?
            .peel_to_commit()?;
        let ours = self.repo.head()?.peel_to_commit()?;
        let base_oid = self.repo.merge_base(ours.id(), theirs.id())?;
        let base_tree = self.repo.find_commit(base_oid)?.tree()?;
        let our_tree = ours.tree()?;
        let their_tree = theirs.tree()?;

        let mut handles = Vec::new();
        let mut seen = BTreeSet::new();

        let index = self.repo.index()?;
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let Some(path) = [&conflict.our, &conflict.their, &conflict.ancestor]
                .into_iter()
                .flatten()
                .next()
                .map(entry_path)
            else {
                continue;
            };
            let base = self.stage_bytes(conflict.ancestor.as_ref())?;
            let local = self.stage_bytes(conflict.our.as_ref())?;
            let remote = self.stage_bytes(conflict.their.as_ref())?;
            debug!(path = %path, "unmerged path");
            seen.insert(path.clone());
            handles.push(FileSyncHandle::new(path, base, local, remote, true));
        }

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&their_tree), None)?;
        for delta in diff.deltas() {
            let Some(path) = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
            else {
                continue;
            };
            if !seen.insert(path.clone()) {
                continue;
            }
            let base = self.tree_bytes(&base_tree, &path)?;
            let local = self.tree_bytes(&our_tree, &path)?;
            let remote = self.tree_bytes(&their_tree, &path)?;
            handles.push(FileSyncHandle::new(path, base, local, remote, false));
        }

        info!(
            total = handles.len(),
            unmerged = handles.iter().filter(|h| h.unmerged).count(),
            "collected merge change records"
        );
        Ok(handles)
    }

    fn stage_bytes(&self, entry: Option<&IndexEntry>) -> Result<Option<Vec<u8>>, GitError> {
        let Some(entry) = entry else {
            return Ok(None);
        };
        Ok(Some(self.repo.find_blob(entry.id)?.content().to_vec()))
    }

    fn tree_bytes(&self, tree: &Tree<'_>, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        match tree.get_path(Path::new(path)) {
            Ok(entry) => Ok(Some(self.repo.find_blob(entry.id())?.content().to_vec())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn entry_path(entry: &IndexEntry) -> String {
    String::from_utf8_lossy(&entry.path).into_owned()
}

impl Transport for GitClient {
    /// Stage the whole working tree, which clears every index conflict.
    fn mark_all_resolved(&mut self) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        index.update_all(["*"].iter(), None)?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        info!("all paths marked resolved");
        Ok(())
    }
}
