//! Entity merge orchestrator.
//!
//! For each collection of the workspace definition, in a fixed order
//! (settings, mod elements, variables, sounds, languages, folders), the
//! [`WorkspaceMerger`] diffs both sides against the base, auto-applies every
//! change only one side made and collects the rest as merge handles.

pub mod apply;
pub mod folders;

use std::collections::{btree_map, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conflict::{ConflictDetector, ElementConflict, MergeHandle, WorkspaceMergeHandles};
use crate::diff::{entity_diff, map_diff, DiffResult};
use crate::generator::ArtifactGenerator;
use crate::models::{ChangeType, FolderElement, ResultSide, Snapshot};

pub use apply::apply_resolved;
pub use folders::{RecursiveFolderMerger, TreeMerger};

/// Counters for one merge pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub conflicts: usize,
}

impl MergeStats {
    fn record(&mut self, change: ChangeType) {
        match change {
            ChangeType::Add => self.added += 1,
            ChangeType::Delete => self.removed += 1,
            ChangeType::Modify => self.modified += 1,
            ChangeType::None => {}
        }
    }

    /// Total auto-applied changes.
    pub fn applied(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

/// One auto-applicable change.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AutoChange {
    key: String,
    change: ChangeType,
    from: ResultSide,
}

/// Non-conflicting changes in application order: removals (local, then
/// remote), additions (local, then remote), then modifications. Keys in
/// `conflicts` are left for resolution; a change both sides made alike is
/// applied once.
fn auto_changes(
    local: &DiffResult,
    remote: &DiffResult,
    conflicts: &BTreeSet<String>,
) -> Vec<AutoChange> {
    let passes = [
        (&local.removed, ChangeType::Delete, ResultSide::Local),
        (&remote.removed, ChangeType::Delete, ResultSide::Remote),
        (&local.added, ChangeType::Add, ResultSide::Local),
        (&remote.added, ChangeType::Add, ResultSide::Remote),
        (&local.modified, ChangeType::Modify, ResultSide::Local),
        (&remote.modified, ChangeType::Modify, ResultSide::Remote),
    ];
    let mut seen = BTreeSet::new();
    let mut changes = Vec::new();
    for (keys, change, from) in passes {
        for key in keys {
            if conflicts.contains(key) || !seen.insert(key.as_str()) {
                continue;
            }
            changes.push(AutoChange {
                key: key.clone(),
                change,
                from,
            });
        }
    }
    changes
}

fn conflict_keys<T>(handles: &[MergeHandle<T>]) -> BTreeSet<String> {
    handles.iter().map(|h| h.key().to_string()).collect()
}

fn pick<'s, T>(from: ResultSide, local: &'s T, remote: &'s T) -> &'s T {
    match from {
        ResultSide::Remote => remote,
        _ => local,
    }
}

/// Drives auto-merge over every collection of a workspace definition.
///
/// When `dry_run` is set, conflicts are detected and counted but the working
/// base snapshot is never touched.
pub struct WorkspaceMerger<'a> {
    generator: &'a mut dyn ArtifactGenerator,
    tree_merger: &'a dyn TreeMerger,
    dry_run: bool,
}

impl<'a> WorkspaceMerger<'a> {
    pub fn new(
        generator: &'a mut dyn ArtifactGenerator,
        tree_merger: &'a dyn TreeMerger,
        dry_run: bool,
    ) -> Self {
        Self {
            generator,
            tree_merger,
            dry_run,
        }
    }

    /// Merge `local` and `remote` into the working `base`, adding every
    /// conflict to `handles`.
    ///
    /// Element handles already in `handles` (from conflicting element files)
    /// keep their files when the element also conflicts here.
    pub fn merge(
        &mut self,
        base: &mut Snapshot,
        local: &Snapshot,
        remote: &Snapshot,
        handles: &mut WorkspaceMergeHandles,
    ) -> MergeStats {
        let before = handles.len();
        let mut stats = MergeStats::default();

        self.merge_settings(base, local, remote, handles, &mut stats);
        self.merge_mod_elements(base, local, remote, handles, &mut stats);
        self.merge_variables(base, local, remote, handles, &mut stats);
        self.merge_sounds(base, local, remote, handles, &mut stats);
        self.merge_languages(base, local, remote, handles, &mut stats);
        self.merge_folders(base, local, remote, handles, &mut stats);

        stats.conflicts = handles.len().saturating_sub(before);
        info!(
            added = stats.added,
            removed = stats.removed,
            modified = stats.modified,
            conflicts = stats.conflicts,
            dry_run = self.dry_run,
            "workspace merge pass complete"
        );
        stats
    }

    fn merge_settings(
        &mut self,
        base: &mut Snapshot,
        local: &Snapshot,
        remote: &Snapshot,
        handles: &mut WorkspaceMergeHandles,
        stats: &mut MergeStats,
    ) {
        let local_changed = local.settings != base.settings;
        let remote_changed = remote.settings != base.settings;
        let chosen = match (local_changed, remote_changed) {
            (true, true) if local.settings != remote.settings => {
                debug!("settings changed on both sides");
                handles.settings = Some(MergeHandle::new(
                    "settings",
                    Some(local.settings.clone()),
                    Some(remote.settings.clone()),
                    ChangeType::Modify,
                    ChangeType::Modify,
                ));
                return;
            }
            (true, _) => &local.settings,
            (false, true) => &remote.settings,
            (false, false) => return,
        };
        stats.record(ChangeType::Modify);
        if !self.dry_run {
            base.settings = chosen.clone();
            base.mark_dirty();
        }
    }

    fn merge_mod_elements(
        &mut self,
        base: &mut Snapshot,
        local: &Snapshot,
        remote: &Snapshot,
        handles: &mut WorkspaceMergeHandles,
        stats: &mut MergeStats,
    ) {
        let local_diff = entity_diff(&base.mod_elements, &local.mod_elements);
        let remote_diff = entity_diff(&base.mod_elements, &remote.mod_elements);
        let conflicts = ConflictDetector::find_conflicts(
            &local_diff,
            &remote_diff,
            |k| local.mod_elements.get(k).cloned(),
            |k| remote.mod_elements.get(k).cloned(),
        );
        let skip = conflict_keys(&conflicts);

        for handle in conflicts {
            match handles.mod_elements.entry(handle.key().to_string()) {
                btree_map::Entry::Occupied(mut existing) => {
                    let existing = existing.get_mut();
                    existing.handle = handle;
                    existing.in_workspace_definition = true;
                }
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(ElementConflict {
                        handle,
                        files: Vec::new(),
                        in_workspace_definition: true,
                    });
                }
            }
        }

        for auto in auto_changes(&local_diff, &remote_diff, &skip) {
            stats.record(auto.change);
            if self.dry_run {
                continue;
            }
            let source = pick(auto.from, &local.mod_elements, &remote.mod_elements);
            if apply::apply_mod_element(base, &auto.key, auto.change, source.get(&auto.key)) {
                apply::regenerate(base, self.generator, &auto.key);
            }
        }
    }

    fn merge_variables(
        &mut self,
        base: &mut Snapshot,
        local: &Snapshot,
        remote: &Snapshot,
        handles: &mut WorkspaceMergeHandles,
        stats: &mut MergeStats,
    ) {
        let local_diff = entity_diff(&base.variables, &local.variables);
        let remote_diff = entity_diff(&base.variables, &remote.variables);
        let conflicts = ConflictDetector::find_conflicts(
            &local_diff,
            &remote_diff,
            |k| local.variables.get(k).cloned(),
            |k| remote.variables.get(k).cloned(),
        );
        let skip = conflict_keys(&conflicts);
        handles.variables.extend(conflicts);

        for auto in auto_changes(&local_diff, &remote_diff, &skip) {
            stats.record(auto.change);
            if !self.dry_run {
                let source = pick(auto.from, &local.variables, &remote.variables);
                apply::apply_entity(&mut base.variables, &auto.key, auto.change, source.get(&auto.key));
                base.mark_dirty();
            }
        }
    }

    fn merge_sounds(
        &mut self,
        base: &mut Snapshot,
        local: &Snapshot,
        remote: &Snapshot,
        handles: &mut WorkspaceMergeHandles,
        stats: &mut MergeStats,
    ) {
        let local_diff = entity_diff(&base.sounds, &local.sounds);
        let remote_diff = entity_diff(&base.sounds, &remote.sounds);
        let conflicts = ConflictDetector::find_conflicts(
            &local_diff,
            &remote_diff,
            |k| local.sounds.get(k).cloned(),
            |k| remote.sounds.get(k).cloned(),
        );
        let skip = conflict_keys(&conflicts);
        handles.sounds.extend(conflicts);

        for auto in auto_changes(&local_diff, &remote_diff, &skip) {
            stats.record(auto.change);
            if !self.dry_run {
                let source = pick(auto.from, &local.sounds, &remote.sounds);
                apply::apply_entity(&mut base.sounds, &auto.key, auto.change, source.get(&auto.key));
                base.mark_dirty();
            }
        }
    }

    /// Languages both sides modified are re-diffed entry by entry; only the
    /// conflicting entries are escalated.
    fn merge_languages(
        &mut self,
        base: &mut Snapshot,
        local: &Snapshot,
        remote: &Snapshot,
        handles: &mut WorkspaceMergeHandles,
        stats: &mut MergeStats,
    ) {
        let local_diff = map_diff(&base.language_map, &local.language_map);
        let remote_diff = map_diff(&base.language_map, &remote.language_map);
        let conflicts = ConflictDetector::find_conflicts(
            &local_diff,
            &remote_diff,
            |k| local.language_map.get(k).cloned(),
            |k| remote.language_map.get(k).cloned(),
        );
        let skip = conflict_keys(&conflicts);

        for auto in auto_changes(&local_diff, &remote_diff, &skip) {
            stats.record(auto.change);
            if !self.dry_run {
                let source = pick(auto.from, &local.language_map, &remote.language_map);
                apply::apply_language(&mut base.language_map, &auto.key, auto.change, source.get(&auto.key));
                base.mark_dirty();
            }
        }

        for handle in conflicts {
            let nested = match (handle.local_change(), handle.remote_change(), handle.local(), handle.remote()) {
                (ChangeType::Modify, ChangeType::Modify, Some(local_entries), Some(remote_entries)) => {
                    Some((local_entries, remote_entries))
                }
                _ => None,
            };
            let Some((local_entries, remote_entries)) = nested else {
                handles.languages.push(handle);
                continue;
            };

            let language = handle.key();
            let base_entries = base.language_map.get(language).cloned().unwrap_or_default();
            let nested_local = map_diff(&base_entries, local_entries);
            let nested_remote = map_diff(&base_entries, remote_entries);
            let entry_conflicts = ConflictDetector::find_conflicts(
                &nested_local,
                &nested_remote,
                |k| local_entries.get(k).cloned(),
                |k| remote_entries.get(k).cloned(),
            );
            let entry_skip = conflict_keys(&entry_conflicts);

            for auto in auto_changes(&nested_local, &nested_remote, &entry_skip) {
                stats.record(auto.change);
                if !self.dry_run {
                    let source = pick(auto.from, local_entries, remote_entries);
                    apply::apply_translation(
                        &mut base.language_map,
                        language,
                        &auto.key,
                        auto.change,
                        source.get(&auto.key),
                    );
                    base.mark_dirty();
                }
            }

            if entry_conflicts.is_empty() {
                debug!(language, "language merged entry by entry");
            } else {
                debug!(language, conflicts = entry_conflicts.len(), "translation entries conflict");
                handles
                    .translations
                    .entry(language.to_string())
                    .or_default()
                    .extend(entry_conflicts);
            }
        }
    }

    /// An unmergeable folder tree becomes a single root handle.
    fn merge_folders(
        &mut self,
        base: &mut Snapshot,
        local: &Snapshot,
        remote: &Snapshot,
        handles: &mut WorkspaceMergeHandles,
        stats: &mut MergeStats,
    ) {
        match self.tree_merger.merge(&base.folders, &local.folders, &remote.folders) {
            Ok(merged) => {
                if merged != base.folders {
                    stats.record(ChangeType::Modify);
                    if !self.dry_run {
                        base.folders = merged;
                        base.mark_dirty();
                    }
                }
            }
            Err(err) => {
                warn!(path = %err.path, detail = %err.detail, "folder tree needs manual merge");
                handles.folders = Some(MergeHandle::new(
                    FolderElement::ROOT_NAME,
                    Some(local.folders.clone()),
                    Some(remote.folders.clone()),
                    ChangeType::Modify,
                    ChangeType::Modify,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::generator::QueueingGenerator;
    use crate::models::{
        EntityList, ModElement, SoundElement, Translations, VariableElement, WorkspaceSettings,
    };

    fn variable(name: &str, value: &str) -> VariableElement {
        VariableElement {
            name: name.into(),
            var_type: "number".into(),
            scope: "global".into(),
            value: value.into(),
        }
    }

    fn translations(entries: &[(&str, &str)]) -> Translations {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(WorkspaceSettings {
            mod_id: "gems".into(),
            ..Default::default()
        })
    }

    fn run(
        base: &mut Snapshot,
        local: &Snapshot,
        remote: &Snapshot,
        dry_run: bool,
    ) -> (WorkspaceMergeHandles, MergeStats, QueueingGenerator) {
        let mut generator = QueueingGenerator::default();
        let mut handles = WorkspaceMergeHandles::default();
        let stats = WorkspaceMerger::new(&mut generator, &RecursiveFolderMerger, dry_run)
            .merge(base, local, remote, &mut handles);
        (handles, stats, generator)
    }

    #[test]
    fn test_auto_changes_order() {
        let mut local = DiffResult::default();
        local.added.insert("la".into());
        local.removed.insert("lr".into());
        local.modified.insert("lm".into());
        let mut remote = DiffResult::default();
        remote.added.insert("ra".into());
        remote.removed.insert("rr".into());
        remote.added.insert("c".into());
        let skip = BTreeSet::from(["c".to_string()]);

        let order: Vec<String> = auto_changes(&local, &remote, &skip)
            .into_iter()
            .map(|c| c.key)
            .collect();
        assert_eq!(order, vec!["lr", "rr", "la", "ra", "lm"]);
    }

    #[test]
    fn test_disjoint_changes_merge_without_conflicts() {
        let mut base = snapshot();
        base.variables = EntityList::new(vec![variable("a", "1"), variable("b", "2")]).unwrap();
        let mut local = base.clone();
        local.variables.remove("a");
        local.mod_elements.upsert(ModElement::new("Ruby", "item"));
        let mut remote = base.clone();
        remote.variables.upsert(variable("b", "20"));
        remote.sounds.upsert(SoundElement {
            name: "chime".into(),
            files: vec!["chime.ogg".into()],
            category: "block".into(),
            subtitle: None,
        });

        let (handles, stats, generator) = run(&mut base, &local, &remote, false);
        assert!(handles.is_empty());
        assert_eq!(stats.applied(), 4);
        assert!(!base.variables.contains("a"));
        assert_eq!(base.variables.get("b").unwrap().value, "20");
        assert!(base.mod_elements.contains("Ruby"));
        assert!(base.sounds.contains("chime"));
        assert_eq!(generator.queue().elements, vec!["Ruby".to_string()]);
    }

    #[test]
    fn test_delete_versus_modify_is_escalated() {
        let mut base = snapshot();
        base.mod_elements = EntityList::new(vec![ModElement::new("X", "item")]).unwrap();
        let mut local = base.clone();
        local.mod_elements.remove("X");
        let mut remote = base.clone();
        remote.mod_elements.get_mut("X").unwrap().sort_id = 9;

        let (handles, stats, _) = run(&mut base, &local, &remote, false);
        let conflict = &handles.mod_elements["X"];
        assert_eq!(conflict.handle.local_change(), ChangeType::Delete);
        assert_eq!(conflict.handle.remote_change(), ChangeType::Modify);
        assert!(conflict.in_workspace_definition);
        assert!(base.mod_elements.contains("X"));
        assert_eq!(base.mod_elements.get("X").unwrap().sort_id, 0);
        assert_eq!(stats.conflicts, 1);
    }

    #[test]
    fn test_nested_translations_narrow_conflict() {
        let mut base = snapshot();
        base.language_map
            .insert("en".into(), translations(&[("greeting", "hi")]));
        let mut local = base.clone();
        local.language_map.insert(
            "en".into(),
            translations(&[("greeting", "hi"), ("farewell", "bye")]),
        );
        let mut remote = base.clone();
        remote.language_map.insert(
            "en".into(),
            translations(&[("greeting", "hi"), ("farewell", "see ya")]),
        );

        let (handles, _, _) = run(&mut base, &local, &remote, false);
        assert!(handles.languages.is_empty());
        assert_eq!(handles.len(), 1);
        let entries = &handles.translations["en"];
        assert_eq!(entries[0].key(), "farewell");
        assert_eq!(entries[0].local_change(), ChangeType::Add);
        assert_eq!(entries[0].remote_change(), ChangeType::Add);
    }

    #[test]
    fn test_nested_translations_merge_cleanly() {
        let mut base = snapshot();
        base.language_map
            .insert("en".into(), translations(&[("a", "1"), ("b", "2")]));
        let mut local = base.clone();
        local.language_map.insert("en".into(), translations(&[("a", "10"), ("b", "2")]));
        let mut remote = base.clone();
        remote
            .language_map
            .insert("en".into(), translations(&[("a", "1"), ("c", "3")]));

        let (handles, _, _) = run(&mut base, &local, &remote, false);
        assert!(handles.is_empty());
        assert_eq!(base.language_map["en"], translations(&[("a", "10"), ("c", "3")]));
    }

    #[test]
    fn test_one_sided_settings_change_applied() {
        let mut base = snapshot();
        let mut local = base.clone();
        local.settings.version = "2.0".into();
        let remote = base.clone();

        let (handles, stats, _) = run(&mut base, &local, &remote, false);
        assert!(handles.settings.is_none());
        assert_eq!(stats.modified, 1);
        assert_eq!(base.settings.version, "2.0");
    }

    #[test]
    fn test_settings_changed_on_both_sides() {
        let mut base = snapshot();
        let mut local = base.clone();
        local.settings.version = "2.0".into();
        let mut remote = base.clone();
        remote.settings.version = "3.0".into();

        let (handles, _, _) = run(&mut base, &local, &remote, false);
        let handle = handles.settings.as_ref().unwrap();
        assert_eq!(handle.local().unwrap().version, "2.0");
        assert_eq!(handle.remote().unwrap().version, "3.0");
        assert_eq!(base.settings.version, "");
    }

    #[test]
    fn test_folder_failure_becomes_single_handle() {
        let mut base = snapshot();
        base.folders = FolderElement::root()
            .with_child(FolderElement::new("blocks").with_child(FolderElement::new("ores")));
        let mut local = base.clone();
        local.folders = FolderElement::root().with_child(FolderElement::new("items"));
        let mut remote = base.clone();
        remote.folders = FolderElement::root().with_child(
            FolderElement::new("blocks")
                .with_child(FolderElement::new("ores"))
                .with_child(FolderElement::new("woods")),
        );

        let (handles, _, _) = run(&mut base, &local, &remote, false);
        let handle = handles.folders.as_ref().unwrap();
        assert_eq!(handle.key(), FolderElement::ROOT_NAME);
        assert_eq!(handles.len(), 1);
    }

    #[test]
    fn test_dry_run_leaves_base_untouched() {
        let mut base = snapshot();
        base.variables = EntityList::new(vec![variable("a", "1")]).unwrap();
        let mut local = base.clone();
        local.variables.remove("a");
        local.settings.version = "9".into();
        local.language_map.insert("de".into(), BTreeMap::new());
        let mut remote = base.clone();
        remote.mod_elements.upsert(ModElement::new("Ruby", "item"));
        let before = base.clone();

        let (handles, stats, generator) = run(&mut base, &local, &remote, true);
        assert!(handles.is_empty());
        assert_eq!(stats.applied(), 4);
        assert_eq!(base, before);
        assert!(!base.is_dirty());
        assert!(generator.is_empty());
    }

    #[test]
    fn test_file_conflict_files_survive_list_conflict() {
        let mut base = snapshot();
        base.mod_elements = EntityList::new(vec![ModElement::new("X", "item")]).unwrap();
        let mut local = base.clone();
        local.mod_elements.get_mut("X").unwrap().sort_id = 1;
        let mut remote = base.clone();
        remote.mod_elements.get_mut("X").unwrap().sort_id = 2;

        let mut handles = WorkspaceMergeHandles::default();
        let element = ModElement::new("X", "item");
        handles.mod_elements.insert(
            "X".into(),
            ElementConflict {
                handle: MergeHandle::new(
                    "X",
                    Some(element.clone()),
                    Some(element),
                    ChangeType::Modify,
                    ChangeType::Modify,
                ),
                files: vec![crate::file_sync::FileSyncHandle::new(
                    "elements/X.mod.json",
                    Some(b"a".to_vec()),
                    Some(b"b".to_vec()),
                    Some(b"c".to_vec()),
                    true,
                )],
                in_workspace_definition: false,
            },
        );
        let mut generator = QueueingGenerator::default();
        WorkspaceMerger::new(&mut generator, &RecursiveFolderMerger, false)
            .merge(&mut base, &local, &remote, &mut handles);

        let conflict = &handles.mod_elements["X"];
        assert!(conflict.in_workspace_definition);
        assert_eq!(conflict.files.len(), 1);
        assert_eq!(conflict.handle.local().unwrap().sort_id, 1);
    }
}
