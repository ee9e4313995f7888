//! The full set of conflicts produced by one workspace merge.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::handle::{MergeHandle, Resolvable};
use crate::file_sync::FileSyncHandle;
use crate::models::{
    FolderElement, ModElement, SoundElement, Translations, VariableElement, WorkspaceSettings,
};

/// Collection a conflict belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Settings,
    ModElement,
    Variable,
    Sound,
    Language,
    Translation,
    Folders,
    File,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings => write!(f, "settings"),
            Self::ModElement => write!(f, "mod_element"),
            Self::Variable => write!(f, "variable"),
            Self::Sound => write!(f, "sound"),
            Self::Language => write!(f, "language"),
            Self::Translation => write!(f, "translation"),
            Self::Folders => write!(f, "folders"),
            Self::File => write!(f, "file"),
        }
    }
}

/// A conflicting mod element, with the element files that conflicted.
#[derive(Debug, Clone)]
pub struct ElementConflict {
    pub handle: MergeHandle<ModElement>,
    pub files: Vec<FileSyncHandle>,
    /// The element itself conflicted inside the workspace definition.
    pub in_workspace_definition: bool,
}

/// One row of [`WorkspaceMergeHandles::entries`].
pub struct ConflictEntry<'a> {
    pub kind: ConflictKind,
    pub label: String,
    pub handle: &'a dyn Resolvable,
}

/// Every merge handle one workspace merge could not settle.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceMergeHandles {
    pub settings: Option<MergeHandle<WorkspaceSettings>>,
    pub mod_elements: BTreeMap<String, ElementConflict>,
    pub variables: Vec<MergeHandle<VariableElement>>,
    pub sounds: Vec<MergeHandle<SoundElement>>,
    pub languages: Vec<MergeHandle<Translations>>,
    /// Entry-level conflicts inside languages both sides modified.
    pub translations: BTreeMap<String, Vec<MergeHandle<String>>>,
    pub folders: Option<MergeHandle<FolderElement>>,
}

impl WorkspaceMergeHandles {
    /// All handles in merge order, labelled for display.
    pub fn entries(&self) -> Vec<ConflictEntry<'_>> {
        let mut entries = Vec::new();
        if let Some(handle) = &self.settings {
            entries.push(entry(ConflictKind::Settings, "workspace settings".into(), handle));
        }
        for (name, conflict) in &self.mod_elements {
            entries.push(entry(ConflictKind::ModElement, name.clone(), &conflict.handle));
        }
        for handle in &self.variables {
            entries.push(entry(ConflictKind::Variable, handle.key().to_string(), handle));
        }
        for handle in &self.sounds {
            entries.push(entry(ConflictKind::Sound, handle.key().to_string(), handle));
        }
        for handle in &self.languages {
            entries.push(entry(ConflictKind::Language, handle.key().to_string(), handle));
        }
        for (language, handles) in &self.translations {
            for handle in handles {
                entries.push(entry(
                    ConflictKind::Translation,
                    format!("{language}: {}", handle.key()),
                    handle,
                ));
            }
        }
        if let Some(handle) = &self.folders {
            entries.push(entry(ConflictKind::Folders, "folder tree".into(), handle));
        }
        entries
    }

    pub fn len(&self) -> usize {
        usize::from(self.settings.is_some())
            + self.mod_elements.len()
            + self.variables.len()
            + self.sounds.len()
            + self.languages.len()
            + self.translations.values().map(Vec::len).sum::<usize>()
            + usize::from(self.folders.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of handles without a selected side.
    pub fn unresolved(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| !e.handle.is_resolved())
            .count()
    }
}

fn entry<'a>(kind: ConflictKind, label: String, handle: &'a dyn Resolvable) -> ConflictEntry<'a> {
    ConflictEntry {
        kind,
        label,
        handle,
    }
}
