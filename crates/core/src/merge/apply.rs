//! Applying changes to the working base snapshot.
//!
//! The same functions serve auto-merged changes and resolved merge handles:
//! ADD inserts the candidate, DELETE removes the identity and MODIFY
//! replaces the content at that identity.

use tracing::{debug, warn};

use crate::conflict::{MergeHandle, WorkspaceMergeHandles};
use crate::errors::SyncError;
use crate::file_sync::FileSyncHandle;
use crate::generator::{regenerate_once, ArtifactGenerator};
use crate::models::{
    ChangeType, Entity, EntityList, LanguageMap, ModElement, ResultSide, Snapshot, Translations,
};
use crate::store::FileStore;

/// Mod elements are modified in place so the existing object keeps its
/// identity. Returns `true` when the element was added or modified and
/// needs regenerating.
pub(crate) fn apply_mod_element(
    base: &mut Snapshot,
    key: &str,
    change: ChangeType,
    candidate: Option<&ModElement>,
) -> bool {
    let materialized = match (change, candidate) {
        (ChangeType::Delete, _) => {
            base.mod_elements.remove(key);
            false
        }
        (ChangeType::Modify, Some(element)) if base.mod_elements.contains(key) => {
            if let Some(existing) = base.mod_elements.get_mut(key) {
                existing.load_data_from(element);
            }
            true
        }
        (ChangeType::Add | ChangeType::Modify, Some(element)) => {
            base.mod_elements.upsert(element.clone());
            true
        }
        (change, candidate) => {
            if change.is_change() {
                warn!(key, change = %change, has_candidate = candidate.is_some(), "mod element change without candidate");
            }
            return false;
        }
    };
    base.mark_dirty();
    materialized
}

/// Regenerate the element `key` of `base`, if it exists.
pub(crate) fn regenerate(base: &mut Snapshot, generator: &mut dyn ArtifactGenerator, key: &str) {
    if let Some(element) = base.mod_elements.get(key) {
        regenerate_once(generator, &mut base.generator_cache, element);
    }
}

/// Value entities (variables, sounds) are replaced by identity.
pub(crate) fn apply_entity<T: Entity + Clone>(
    list: &mut EntityList<T>,
    key: &str,
    change: ChangeType,
    candidate: Option<&T>,
) {
    match (change, candidate) {
        (ChangeType::Delete, _) => {
            list.remove(key);
        }
        (ChangeType::Add, Some(item)) => list.upsert(item.clone()),
        (ChangeType::Modify, Some(item)) => {
            list.remove(key);
            list.upsert(item.clone());
        }
        _ => {}
    }
}

pub(crate) fn apply_language(
    languages: &mut LanguageMap,
    key: &str,
    change: ChangeType,
    candidate: Option<&Translations>,
) {
    match (change, candidate) {
        (ChangeType::Delete, _) => {
            languages.remove(key);
        }
        (ChangeType::Add | ChangeType::Modify, Some(translations)) => {
            languages.insert(key.to_string(), translations.clone());
        }
        _ => {}
    }
}

/// Entry-level change inside one language. Deleting an entry leaves the
/// same key in other languages untouched.
pub(crate) fn apply_translation(
    languages: &mut LanguageMap,
    language: &str,
    key: &str,
    change: ChangeType,
    candidate: Option<&String>,
) {
    match (change, candidate) {
        (ChangeType::Delete, _) => {
            if let Some(translations) = languages.get_mut(language) {
                translations.remove(key);
            }
        }
        (ChangeType::Add | ChangeType::Modify, Some(text)) => {
            languages
                .entry(language.to_string())
                .or_default()
                .insert(key.to_string(), text.clone());
        }
        _ => {}
    }
}

/// Write the selected side of a conflicting file, or delete it when that
/// side has no content.
pub(crate) fn write_file_side(
    files: &mut dyn FileStore,
    file: &FileSyncHandle,
    side: ResultSide,
) -> Result<(), SyncError> {
    let result = match file.bytes(side) {
        Some(bytes) => files.write(&file.path, bytes),
        None => files.delete(&file.path),
    };
    debug!(path = %file.path, side = %side, "conflicting file written");
    result.map_err(|source| SyncError::FileIo {
        path: file.path.clone(),
        source,
    })
}

fn selected<T>(handle: &MergeHandle<T>) -> Option<(ChangeType, Option<&T>)> {
    let side = handle.selected_side()?;
    Some((handle.change_relative_to(side), handle.candidate(side)))
}

/// Apply every resolved handle to `base`. Unresolved handles are skipped.
pub fn apply_resolved(
    base: &mut Snapshot,
    handles: &WorkspaceMergeHandles,
    generator: &mut dyn ArtifactGenerator,
    files: &mut dyn FileStore,
) -> Result<(), SyncError> {
    if let Some((change, Some(settings))) = handles.settings.as_ref().and_then(selected) {
        if change.is_change() {
            base.settings = settings.clone();
            base.mark_dirty();
        }
    }

    for (name, conflict) in &handles.mod_elements {
        let Some(side) = conflict.handle.selected_side() else {
            continue;
        };
        if conflict.in_workspace_definition {
            apply_mod_element(
                base,
                name,
                conflict.handle.change_relative_to(side),
                conflict.handle.candidate(side),
            );
        }
        for file in &conflict.files {
            write_file_side(files, file, side)?;
        }
        regenerate(base, generator, name);
    }

    for handle in &handles.variables {
        if let Some((change, candidate)) = selected(handle) {
            apply_entity(&mut base.variables, handle.key(), change, candidate);
            base.mark_dirty();
        }
    }
    for handle in &handles.sounds {
        if let Some((change, candidate)) = selected(handle) {
            apply_entity(&mut base.sounds, handle.key(), change, candidate);
            base.mark_dirty();
        }
    }
    for handle in &handles.languages {
        if let Some((change, candidate)) = selected(handle) {
            apply_language(&mut base.language_map, handle.key(), change, candidate);
            base.mark_dirty();
        }
    }
    for (language, entries) in &handles.translations {
        for handle in entries {
            if let Some((change, candidate)) = selected(handle) {
                apply_translation(&mut base.language_map, language, handle.key(), change, candidate);
                base.mark_dirty();
            }
        }
    }
    if let Some((_, Some(folders))) = handles.folders.as_ref().and_then(selected) {
        base.folders = folders.clone();
        base.mark_dirty();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::conflict::ElementConflict;
    use crate::generator::QueueingGenerator;
    use crate::models::{VariableElement, WorkspaceSettings};
    use crate::store::MemoryFileStore;

    fn variable(name: &str, value: &str) -> VariableElement {
        VariableElement {
            name: name.into(),
            var_type: "number".into(),
            scope: "global".into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_modify_in_place_keeps_position() {
        let mut base = Snapshot::new(WorkspaceSettings::default());
        base.mod_elements =
            EntityList::new(vec![ModElement::new("a", "item"), ModElement::new("b", "item")])
                .unwrap();
        let mut changed = ModElement::new("a", "block");
        changed.sort_id = 4;

        assert!(apply_mod_element(&mut base, "a", ChangeType::Modify, Some(&changed)));
        let names: Vec<&str> = base.mod_elements.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(base.mod_elements.get("a").unwrap().element_type, "block");
        assert!(base.is_dirty());
        assert!(!apply_mod_element(&mut base, "b", ChangeType::Delete, None));
        assert!(!base.mod_elements.contains("b"));
    }

    #[test]
    fn test_value_modify_replaces_by_identity() {
        let mut list = EntityList::new(vec![variable("x", "1"), variable("y", "2")]).unwrap();
        apply_entity(&mut list, "x", ChangeType::Modify, Some(&variable("x", "5")));
        let names: Vec<&str> = list.names().collect();
        assert_eq!(names, vec!["y", "x"]);
        assert_eq!(list.get("x").unwrap().value, "5");
        apply_entity(&mut list, "y", ChangeType::Delete, None);
        assert!(!list.contains("y"));
    }

    #[test]
    fn test_translation_delete_is_scoped_to_language() {
        let mut languages = LanguageMap::new();
        for lang in ["en", "de"] {
            languages.insert(
                lang.to_string(),
                BTreeMap::from([("greeting".to_string(), "hi".to_string())]),
            );
        }
        apply_translation(&mut languages, "en", "greeting", ChangeType::Delete, None);
        assert!(languages["en"].is_empty());
        assert_eq!(languages["de"]["greeting"], "hi");

        apply_translation(&mut languages, "fr", "greeting", ChangeType::Add, Some(&"salut".to_string()));
        assert_eq!(languages["fr"]["greeting"], "salut");
    }

    #[test]
    fn test_apply_resolved_element_with_files() {
        let mut base = Snapshot::new(WorkspaceSettings::default());
        base.mod_elements = EntityList::new(vec![ModElement::new("Ruby", "item")]).unwrap();
        let file = FileSyncHandle::new(
            "elements/Ruby.mod.json",
            Some(b"base".to_vec()),
            Some(b"local".to_vec()),
            None,
            true,
        );
        let element = ModElement::new("Ruby", "item");
        let handle = MergeHandle::new(
            "Ruby",
            Some(element.clone()),
            Some(element),
            file.local_change,
            file.remote_change,
        );
        handle.select(ResultSide::Remote).unwrap();

        let mut handles = WorkspaceMergeHandles::default();
        handles.mod_elements.insert(
            "Ruby".into(),
            ElementConflict {
                handle,
                files: vec![file],
                in_workspace_definition: false,
            },
        );

        let mut files = MemoryFileStore::default();
        files.write("elements/Ruby.mod.json", b"conflicted").unwrap();
        let mut generator = QueueingGenerator::default();
        apply_resolved(&mut base, &handles, &mut generator, &mut files).unwrap();

        assert!(files.get("elements/Ruby.mod.json").is_none());
        assert!(base.mod_elements.contains("Ruby"));
        assert_eq!(generator.queue().elements, vec!["Ruby".to_string()]);
    }
}
