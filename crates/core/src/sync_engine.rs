//! Workspace sync driver.
//!
//! The [`SyncHandler`] takes the file-level change records of a merge in
//! progress and runs one sync:
//!
//! 1. Classify records: the workspace definition, element definition files,
//!    generated files owned by an element, language files, base templates
//!    and everything else.
//! 2. Reconstruct base and remote workspaces when the workspace definition
//!    conflicts, rejecting workspaces too new to understand.
//! 3. Auto-merge every collection and collect the remaining conflicts.
//! 4. Hand conflicts to the resolution collaborator and apply its choices.
//! 5. Store the merged workspace, regenerate the mod base and tell the
//!    transport every path is resolved.
//!
//! In dry-run mode only steps 1 to 3 run, without touching anything, and the
//! outcome reports whether user action would be required.

use std::collections::btree_map;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::conflict::{
    ConflictKind, ConflictResolver, ElementConflict, MergeHandle, WorkspaceMergeHandles,
};
use crate::errors::{MergeError, SyncError};
use crate::file_sync::FileSyncHandle;
use crate::generator::ArtifactGenerator;
use crate::git::Transport;
use crate::merge::apply::{apply_resolved, write_file_side};
use crate::merge::{MergeStats, TreeMerger, WorkspaceMerger};
use crate::models::{ChangeType, ResultSide, Snapshot};
use crate::store::{reconstruct_snapshot, FileStore, SnapshotStore};

// ---------------------------------------------------------------------------
// Sync state machine
// ---------------------------------------------------------------------------

/// States of a sync run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Init,
    Classifying,
    AutoMerging,
    Escalated,
    AutoResolved,
    Applying,
    RequiresUserAction,
    Done,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Classifying => write!(f, "classifying"),
            Self::AutoMerging => write!(f, "auto_merging"),
            Self::Escalated => write!(f, "escalated"),
            Self::AutoResolved => write!(f, "auto_resolved"),
            Self::Applying => write!(f, "applying"),
            Self::RequiresUserAction => write!(f, "requires_user_action"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// One conflict as reported to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictSummary {
    pub kind: ConflictKind,
    pub label: String,
    pub local_change: ChangeType,
    pub remote_change: ChangeType,
    /// Side chosen by the resolution collaborator, if any.
    pub resolution: Option<ResultSide>,
}

/// Result of one sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub run_id: String,
    /// Whether external or manual action was (or would be) required.
    pub user_action_required: bool,
    pub phase: SyncPhase,
    pub conflicts: Vec<ConflictSummary>,
    /// Files no merge step could classify.
    pub unmerged_paths: Vec<String>,
    pub stats: MergeStats,
    pub started_at: String,
    pub completed_at: String,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// External collaborators of a sync run.
pub struct SyncServices<'a> {
    pub generator: &'a mut dyn ArtifactGenerator,
    pub store: &'a mut dyn SnapshotStore,
    pub files: &'a mut dyn FileStore,
    pub resolver: &'a mut dyn ConflictResolver,
    pub transport: &'a mut dyn Transport,
    pub tree_merger: &'a dyn TreeMerger,
}

/// Drives one workspace sync over a set of change records.
pub struct SyncHandler<'a> {
    config: AppConfig,
    services: SyncServices<'a>,
}

impl<'a> SyncHandler<'a> {
    pub fn new(config: AppConfig, services: SyncServices<'a>) -> Self {
        Self { config, services }
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Main entry point
    // -----------------------------------------------------------------------

    /// Run one sync of `local` against the change records in `handles`.
    ///
    /// Version and deserialization failures abort the run before anything is
    /// changed. With `dry_run` set, neither `local` nor any project file is
    /// touched and no conflict is handed to the resolver.
    pub fn handle_sync(
        &mut self,
        local: &mut Snapshot,
        handles: &[FileSyncHandle],
        dry_run: bool,
    ) -> Result<SyncOutcome, SyncError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("sync", run_id = %run_id);
        let _enter = span.enter();
        let started_at = Utc::now().to_rfc3339();
        info!(records = handles.len(), dry_run, "starting workspace sync");

        let mut phase = SyncPhase::Init;
        let mut processed = vec![false; handles.len()];

        advance(&mut phase, SyncPhase::Classifying);
        let mut workspaces = self.classify_workspace(local, handles, &mut processed)?;
        let mut conflicts = self.classify_element_files(local, handles, &mut processed);

        advance(&mut phase, SyncPhase::AutoMerging);
        let mut stats = MergeStats::default();
        if let Some((base, remote)) = workspaces.as_mut() {
            stats = WorkspaceMerger::new(
                &mut *self.services.generator,
                self.services.tree_merger,
                dry_run,
            )
            .merge(base, local, remote, &mut conflicts);
        }

        let workspace_action = !conflicts.is_empty();
        if workspace_action {
            advance(&mut phase, SyncPhase::Escalated);
            info!(conflicts = conflicts.len(), "workspace conflicts need resolution");
        } else {
            advance(&mut phase, SyncPhase::AutoResolved);
        }

        if !dry_run {
            advance(&mut phase, SyncPhase::Applying);
            if workspace_action {
                self.services.resolver.resolve_workspace(&conflicts)?;
                ensure_resolved(conflicts.unresolved())?;
                let target = match workspaces.as_mut() {
                    Some((base, _)) => base,
                    None => &mut *local,
                };
                apply_resolved(
                    target,
                    &conflicts,
                    &mut *self.services.generator,
                    &mut *self.services.files,
                )?;
            }
            if let Some((base, _)) = &workspaces {
                self.store_merged(local, base)?;
            }
        }

        self.process_base_templates(handles, &mut processed, dry_run)?;
        if !dry_run && local.generator_cache.mark_base() {
            self.services.generator.regenerate_base();
        }

        for (index, handle) in handles.iter().enumerate() {
            if !handle.unmerged {
                processed[index] = true;
            }
        }
        let unprocessed: Vec<&FileSyncHandle> = handles
            .iter()
            .zip(&processed)
            .filter(|(_, done)| !**done)
            .map(|(handle, _)| handle)
            .collect();
        let user_action_required = workspace_action || !unprocessed.is_empty();

        let mut file_handles = Vec::new();
        if !unprocessed.is_empty() {
            info!(count = unprocessed.len(), "unclassified unmerged files");
            file_handles = unprocessed
                .iter()
                .map(|handle| handle.to_path_merge_handle())
                .collect();
            if !dry_run {
                self.resolve_files(&file_handles)?;
            }
        }

        if !dry_run {
            self.services.transport.mark_all_resolved()?;
        }

        advance(
            &mut phase,
            if user_action_required {
                SyncPhase::RequiresUserAction
            } else {
                SyncPhase::Done
            },
        );
        info!(
            user_action_required,
            conflicts = conflicts.len(),
            unmerged = unprocessed.len(),
            "workspace sync complete"
        );

        Ok(SyncOutcome {
            run_id,
            user_action_required,
            phase,
            conflicts: summarize(&conflicts, &file_handles),
            unmerged_paths: unprocessed.iter().map(|h| h.path.clone()).collect(),
            stats,
            started_at,
            completed_at: Utc::now().to_rfc3339(),
        })
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    /// Base and remote workspaces, when the workspace definition conflicts.
    ///
    /// The remote definition is version-checked whenever the remote side did
    /// not delete it, even if the transport merged it cleanly. A conflicting
    /// definition deleted on one side is left unprocessed, so it is escalated
    /// as a file.
    fn classify_workspace(
        &self,
        local: &Snapshot,
        handles: &[FileSyncHandle],
        processed: &mut [bool],
    ) -> Result<Option<(Snapshot, Snapshot)>, SyncError> {
        let workspace_file = &self.config.project.workspace_file;
        let Some(index) = handles.iter().position(|h| &h.path == workspace_file) else {
            return Ok(None);
        };
        let handle = &handles[index];

        if handle.remote_change == ChangeType::Delete {
            if handle.unmerged {
                info!("workspace definition deleted remotely and changed locally");
                return Ok(None);
            }
            debug!("workspace definition deleted remotely");
            processed[index] = true;
            return Ok(None);
        }
        let remote = self.reconstruct(handle, ResultSide::Remote, local)?;
        self.check_version(&remote)?;

        if !handle.unmerged {
            debug!("workspace definition merged by transport");
            processed[index] = true;
            return Ok(None);
        }
        if handle.local_change == ChangeType::Delete {
            info!("workspace definition deleted locally and changed remotely");
            return Ok(None);
        }
        let base = self.reconstruct(handle, ResultSide::Base, local)?;
        processed[index] = true;
        info!("workspace definition conflicts");
        Ok(Some((base, remote)))
    }

    fn reconstruct(
        &self,
        handle: &FileSyncHandle,
        side: ResultSide,
        sibling: &Snapshot,
    ) -> Result<Snapshot, SyncError> {
        let bytes = handle.bytes(side).ok_or_else(|| SyncError::MissingContent {
            path: handle.path.clone(),
            side: side.to_string(),
        })?;
        reconstruct_snapshot(&*self.services.store, bytes, sibling).map_err(|source| {
            SyncError::Deserialization {
                side: side.to_string(),
                source,
            }
        })
    }

    fn check_version(&self, remote: &Snapshot) -> Result<(), SyncError> {
        let found = remote.format_version;
        if self.config.merge.accepts(found) {
            return Ok(());
        }
        warn!(found = %found, supported = %self.config.merge.supported_format_version, "remote workspace too new");
        Err(SyncError::VersionIncompatible {
            found,
            supported: self.config.merge.supported_format_version,
        })
    }

    /// Element handles for unmerged element definition files and generated
    /// files owned by a known element. Language files are skipped.
    fn classify_element_files(
        &self,
        local: &Snapshot,
        handles: &[FileSyncHandle],
        processed: &mut [bool],
    ) -> WorkspaceMergeHandles {
        let project = &self.config.project;
        let mut conflicts = WorkspaceMergeHandles::default();

        for (index, handle) in handles.iter().enumerate() {
            if !handle.unmerged || processed[index] || handle.path == project.workspace_file {
                continue;
            }
            if project.is_language_file(&handle.path) {
                debug!(path = %handle.path, "language file will be regenerated");
                processed[index] = true;
                continue;
            }

            let owner = project
                .element_name_of(&handle.path)
                .filter(|name| local.mod_elements.contains(name))
                .map(str::to_string)
                .or_else(|| self.services.generator.owner_of(&handle.path, local));
            let Some(element) = owner.and_then(|name| local.mod_elements.get(&name)) else {
                continue;
            };

            debug!(path = %handle.path, element = %element.name, "element file conflicts");
            let conflict = match conflicts.mod_elements.entry(element.name.clone()) {
                btree_map::Entry::Occupied(slot) => slot.into_mut(),
                btree_map::Entry::Vacant(slot) => slot.insert(ElementConflict {
                    handle: MergeHandle::new(
                        element.name.clone(),
                        Some(element.clone()),
                        Some(element.clone()),
                        handle.local_change,
                        handle.remote_change,
                    ),
                    files: Vec::new(),
                    in_workspace_definition: false,
                }),
            };
            conflict.files.push(handle.clone());
            processed[index] = true;
        }
        conflicts
    }

    // -----------------------------------------------------------------------
    // Application
    // -----------------------------------------------------------------------

    /// Load the merged workspace into `local`, store it and read it back.
    fn store_merged(&mut self, local: &mut Snapshot, merged: &Snapshot) -> Result<(), SyncError> {
        local.load_stored_data_from(merged);
        local.generator_cache = merged.generator_cache.clone();
        self.services.store.save(local)?;
        let reloaded = self.services.store.reload()?;
        local.load_stored_data_from(&reloaded);
        local.clear_dirty();
        info!("merged workspace stored");
        Ok(())
    }

    fn process_base_templates(
        &mut self,
        handles: &[FileSyncHandle],
        processed: &mut [bool],
        dry_run: bool,
    ) -> Result<(), SyncError> {
        for (index, handle) in handles.iter().enumerate() {
            if !self.config.project.is_base_template(&handle.path) {
                continue;
            }
            processed[index] = true;
            if !dry_run {
                self.services
                    .files
                    .delete(&handle.path)
                    .map_err(|source| SyncError::FileIo {
                        path: handle.path.clone(),
                        source,
                    })?;
                debug!(path = %handle.path, "base template removed for regeneration");
            }
        }
        Ok(())
    }

    fn resolve_files(&mut self, file_handles: &[MergeHandle<FileSyncHandle>]) -> Result<(), SyncError> {
        self.services.resolver.resolve_files(file_handles)?;
        ensure_resolved(file_handles.iter().filter(|h| !h.is_resolved()).count())?;
        for handle in file_handles {
            if let (Some(side), Some(file)) = (handle.selected_side(), handle.local()) {
                write_file_side(&mut *self.services.files, file, side)?;
            }
        }
        Ok(())
    }
}

fn advance(phase: &mut SyncPhase, next: SyncPhase) {
    debug!(from = %phase, to = %next, "sync phase");
    *phase = next;
}

fn ensure_resolved(unresolved: usize) -> Result<(), MergeError> {
    if unresolved > 0 {
        return Err(MergeError::Unresolved { count: unresolved });
    }
    Ok(())
}

fn summarize(
    conflicts: &WorkspaceMergeHandles,
    files: &[MergeHandle<FileSyncHandle>],
) -> Vec<ConflictSummary> {
    let workspace = conflicts.entries().into_iter().map(|entry| ConflictSummary {
        kind: entry.kind,
        label: entry.label,
        local_change: entry.handle.local_change(),
        remote_change: entry.handle.remote_change(),
        resolution: entry.handle.selected_side(),
    });
    let files = files.iter().map(|handle| ConflictSummary {
        kind: ConflictKind::File,
        label: handle.key().to_string(),
        local_change: handle.local_change(),
        remote_change: handle.remote_change(),
        resolution: handle.selected_side(),
    });
    workspace.chain(files).collect()
}
