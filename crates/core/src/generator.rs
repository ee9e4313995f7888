//! Derived-artifact regeneration.
//!
//! The merge core never generates code itself. It asks an
//! [`ArtifactGenerator`] to regenerate elements that were materialized or
//! modified during a merge, and to regenerate the mod base once the merged
//! state is in place. [`QueueingGenerator`] records those requests and
//! flushes them as JSON for an external generator to pick up.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::PersistenceError;
use crate::models::{ModElement, Snapshot};

// ---------------------------------------------------------------------------
// Per-snapshot cache
// ---------------------------------------------------------------------------

/// Regeneration bookkeeping owned by a [`Snapshot`].
///
/// Prevents regenerating the same element twice within one merge run.
#[derive(Debug, Clone, Default)]
pub struct GeneratorCache {
    regenerated: BTreeSet<String>,
    base_regenerated: bool,
}

impl GeneratorCache {
    /// Record `name` as regenerated. Returns `false` if it already was.
    pub fn mark_element(&mut self, name: &str) -> bool {
        self.regenerated.insert(name.to_string())
    }

    pub fn was_regenerated(&self, name: &str) -> bool {
        self.regenerated.contains(name)
    }

    /// Record the mod base as regenerated. Returns `false` if it already was.
    pub fn mark_base(&mut self) -> bool {
        !std::mem::replace(&mut self.base_regenerated, true)
    }

    pub fn regenerated(&self) -> impl Iterator<Item = &str> {
        self.regenerated.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.regenerated.clear();
        self.base_regenerated = false;
    }
}

// ---------------------------------------------------------------------------
// Collaborator trait
// ---------------------------------------------------------------------------

/// External collaborator that owns generated artifacts.
pub trait ArtifactGenerator {
    /// Name of the element in `snapshot` that generated `path`, if any.
    fn owner_of(&self, path: &str, snapshot: &Snapshot) -> Option<String>;

    /// Regenerate the artifacts of one element.
    fn regenerate_element(&mut self, element: &ModElement);

    /// Regenerate the mod base (files not owned by any element).
    fn regenerate_base(&mut self);
}

/// Regenerate `element` unless `cache` says it already was this run.
pub fn regenerate_once(
    generator: &mut dyn ArtifactGenerator,
    cache: &mut GeneratorCache,
    element: &ModElement,
) {
    if cache.mark_element(&element.name) {
        debug!(element = %element.name, "regenerating element");
        generator.regenerate_element(element);
    }
}

// ---------------------------------------------------------------------------
// Queueing implementation
// ---------------------------------------------------------------------------

/// Regeneration requests collected during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegenerationQueue {
    pub elements: Vec<String>,
    pub base: bool,
}

/// Generator that maps generated files by naming convention and queues
/// regeneration requests instead of running code generation.
///
/// A file under one of `generated_roots` belongs to the element whose name
/// (or registry name) matches the file stem, ignoring case.
#[derive(Debug, Clone, Default)]
pub struct QueueingGenerator {
    generated_roots: Vec<String>,
    elements: BTreeSet<String>,
    base: bool,
}

impl QueueingGenerator {
    pub fn new(generated_roots: Vec<String>) -> Self {
        Self {
            generated_roots,
            elements: BTreeSet::new(),
            base: false,
        }
    }

    pub fn queue(&self) -> RegenerationQueue {
        RegenerationQueue {
            elements: self.elements.iter().cloned().collect(),
            base: self.base,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && !self.base
    }

    /// Write the queue as pretty JSON to `path`, creating parent directories.
    pub fn flush(&self, path: &Path) -> Result<(), PersistenceError> {
        let io_err = |source| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(&self.queue())?;
        std::fs::write(path, json).map_err(io_err)?;
        info!(
            path = %path.display(),
            elements = self.elements.len(),
            base = self.base,
            "regeneration queue written"
        );
        Ok(())
    }
}

impl ArtifactGenerator for QueueingGenerator {
    fn owner_of(&self, path: &str, snapshot: &Snapshot) -> Option<String> {
        let file = Path::new(path);
        if !self.generated_roots.iter().any(|root| file.starts_with(root)) {
            return None;
        }
        let stem = file.file_name()?.to_str()?.split('.').next()?.to_lowercase();
        snapshot
            .mod_elements
            .iter()
            .find(|element| {
                element.name.to_lowercase() == stem
                    || element
                        .registry_name
                        .as_deref()
                        .is_some_and(|registry| registry.to_lowercase() == stem)
            })
            .map(|element| element.name.clone())
    }

    fn regenerate_element(&mut self, element: &ModElement) {
        self.elements.insert(element.name.clone());
    }

    fn regenerate_base(&mut self) {
        self.base = true;
    }
}
