//! Domain model types used throughout worksync.
//!
//! A [`Snapshot`] is one version of a workspace definition: settings, mod
//! elements, variables, sounds, the language map and the folder tree. Three
//! snapshots take part in every merge (base, local, remote).

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::generator::GeneratorCache;

// ---------------------------------------------------------------------------
// Change vocabulary
// ---------------------------------------------------------------------------

/// How an entity, key or file changed relative to the common ancestor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Add,
    Delete,
    Modify,
    #[default]
    None,
}

impl ChangeType {
    /// `true` for every classification except [`ChangeType::None`].
    pub fn is_change(self) -> bool {
        self != Self::None
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Delete => write!(f, "delete"),
            Self::Modify => write!(f, "modify"),
            Self::None => write!(f, "none"),
        }
    }
}

/// One of the three versions taking part in a merge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResultSide {
    Base,
    Local,
    Remote,
}

impl fmt::Display for ResultSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

// ---------------------------------------------------------------------------
// Format version
// ---------------------------------------------------------------------------

/// Declared format version of a workspace definition.
///
/// Packed as `YYYY RRR BBBBB`: year, release within the year and build
/// number. Build `0` is reserved for unnumbered development builds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(transparent)]
pub struct FormatVersion(pub u64);

impl FormatVersion {
    /// Version written by this implementation.
    pub const CURRENT: FormatVersion = FormatVersion(2025_001_00100);

    pub const fn new(year: u64, release: u64, build: u64) -> Self {
        Self(year * 100_000_000 + release * 100_000 + build)
    }

    pub fn year(self) -> u64 {
        self.0 / 100_000_000
    }

    pub fn release(self) -> u64 {
        (self.0 / 100_000) % 1_000
    }

    pub fn build(self) -> u64 {
        self.0 % 100_000
    }

    /// Development builds carry no build number.
    pub fn is_development_build(self) -> bool {
        self.0 != 0 && self.build() == 0
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.year(), self.release(), self.build())
    }
}

// ---------------------------------------------------------------------------
// Identity-keyed collections
// ---------------------------------------------------------------------------

/// A member of an identity-keyed collection. Identity is the name.
pub trait Entity {
    /// Collection label used in error messages and logs.
    const KIND: &'static str;

    fn name(&self) -> &str;
}

/// Ordered collection whose members have unique names, indexed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityList<T> {
    items: Vec<T>,
    /// Name -> position in `items`.
    index: BTreeMap<String, usize>,
}

impl<T: Entity> EntityList<T> {
    /// Build a list, rejecting repeated identities.
    pub fn new(items: Vec<T>) -> Result<Self, ModelError> {
        let mut index = BTreeMap::new();
        for (position, item) in items.iter().enumerate() {
            if index.insert(item.name().to_string(), position).is_some() {
                return Err(ModelError::DuplicateIdentity {
                    collection: T::KIND.to_string(),
                    name: item.name().to_string(),
                });
            }
        }
        Ok(Self { items, index })
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).and_then(|&position| self.items.get(position))
    }

    /// The member must keep its name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let position = *self.index.get(name)?;
        self.items.get_mut(position)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Insert `item`, replacing the member with the same identity in place.
    pub fn upsert(&mut self, item: T) {
        match self.index.get(item.name()) {
            Some(&position) => self.items[position] = item,
            None => {
                self.index.insert(item.name().to_string(), self.items.len());
                self.items.push(item);
            }
        }
    }

    /// Remove the member with the given identity, keeping the order of the
    /// rest.
    pub fn remove(&mut self, name: &str) -> Option<T> {
        let position = self.index.remove(name)?;
        let item = self.items.remove(position);
        for later in self.index.values_mut().filter(|p| **p > position) {
            *later -= 1;
        }
        Some(item)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for EntityList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: BTreeMap::new(),
        }
    }
}

impl<'a, T> IntoIterator for &'a EntityList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize> Serialize for EntityList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Entity + Deserialize<'de>> Deserialize<'de> for EntityList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Self::new(items).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A mod element registered in the workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModElement {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub sort_id: i64,
    #[serde(default)]
    pub registry_name: Option<String>,
    /// Folder path inside the workspace folder tree.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub code_locked: bool,
    #[serde(default)]
    pub compiles: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ModElement {
    pub fn new(name: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            element_type: element_type.into(),
            sort_id: 0,
            registry_name: None,
            path: None,
            code_locked: false,
            compiles: true,
            metadata: BTreeMap::new(),
        }
    }

    /// Copy every content field from `other`, keeping this element's name.
    pub fn load_data_from(&mut self, other: &ModElement) {
        self.element_type = other.element_type.clone();
        self.sort_id = other.sort_id;
        self.registry_name = other.registry_name.clone();
        self.path = other.path.clone();
        self.code_locked = other.code_locked;
        self.compiles = other.compiles;
        self.metadata = other.metadata.clone();
    }
}

impl Entity for ModElement {
    const KIND: &'static str = "mod element";

    fn name(&self) -> &str {
        &self.name
    }
}

/// A global variable definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariableElement {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub value: String,
}

impl Entity for VariableElement {
    const KIND: &'static str = "variable";

    fn name(&self) -> &str {
        &self.name
    }
}

/// A sound event definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoundElement {
    pub name: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subtitle: Option<String>,
}

impl Entity for SoundElement {
    const KIND: &'static str = "sound";

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Settings, languages, folders
// ---------------------------------------------------------------------------

/// Workspace-wide settings record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    #[serde(default)]
    pub mod_id: String,
    #[serde(default)]
    pub mod_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub current_generator: String,
    /// Settings this version does not model explicitly.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Translation key → text for one language.
pub type Translations = BTreeMap<String, String>;

/// Language code → translations.
pub type LanguageMap = BTreeMap<String, Translations>;

/// A node of the workspace folder tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderElement {
    pub name: String,
    #[serde(default)]
    pub children: Vec<FolderElement>,
}

impl FolderElement {
    pub const ROOT_NAME: &'static str = "~";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Self::new(Self::ROOT_NAME)
    }

    pub fn with_child(mut self, child: FolderElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn child(&self, name: &str) -> Option<&FolderElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

impl Default for FolderElement {
    fn default() -> Self {
        Self::root()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One version of a workspace definition.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub format_version: FormatVersion,
    #[serde(default)]
    pub settings: WorkspaceSettings,
    #[serde(default)]
    pub mod_elements: EntityList<ModElement>,
    #[serde(default)]
    pub variables: EntityList<VariableElement>,
    #[serde(default)]
    pub sounds: EntityList<SoundElement>,
    #[serde(default)]
    pub language_map: LanguageMap,
    #[serde(default)]
    pub folders: FolderElement,
    /// Regeneration bookkeeping owned by this snapshot.
    #[serde(skip)]
    pub generator_cache: GeneratorCache,
    #[serde(skip)]
    dirty: bool,
}

impl Snapshot {
    pub fn new(settings: WorkspaceSettings) -> Self {
        Self {
            format_version: FormatVersion::CURRENT,
            settings,
            ..Default::default()
        }
    }

    /// Replace all stored data with `other`'s, keeping runtime state.
    pub fn load_stored_data_from(&mut self, other: &Snapshot) {
        self.format_version = other.format_version;
        self.settings = other.settings.clone();
        self.mod_elements = other.mod_elements.clone();
        self.variables = other.variables.clone();
        self.sounds = other.sounds.clone();
        self.language_map = other.language_map.clone();
        self.folders = other.folders.clone();
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// Snapshots compare by stored data only.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.format_version == other.format_version
            && self.settings == other.settings
            && self.mod_elements == other.mod_elements
            && self.variables == other.variables
            && self.sounds == other.sounds
            && self.language_map == other.language_map
            && self.folders == other.folders
    }
}
