//! Persistence collaborators: snapshot storage and project file writes.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::PersistenceError;
use crate::models::Snapshot;

// ---------------------------------------------------------------------------
// Snapshot storage
// ---------------------------------------------------------------------------

/// Serializes snapshots and owns the stored workspace definition.
pub trait SnapshotStore {
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, PersistenceError>;

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot, PersistenceError>;

    /// Persist `snapshot` as the stored workspace definition.
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistenceError>;

    /// Read the stored workspace definition back.
    fn reload(&self) -> Result<Snapshot, PersistenceError>;
}

/// Build a snapshot from serialized `bytes`, taking runtime services (the
/// generator cache) from a trusted `sibling`.
pub fn reconstruct_snapshot(
    store: &dyn SnapshotStore,
    bytes: &[u8],
    sibling: &Snapshot,
) -> Result<Snapshot, PersistenceError> {
    let mut snapshot = store.decode(bytes)?;
    snapshot.generator_cache = sibling.generator_cache.clone();
    snapshot.clear_dirty();
    Ok(snapshot)
}

/// Pretty-printed JSON workspace definition at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec_pretty(snapshot)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot, PersistenceError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let bytes = self.encode(snapshot)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        std::fs::write(&self.path, bytes).map_err(|e| self.io_error(e))?;
        info!(path = %self.path.display(), "workspace definition saved");
        Ok(())
    }

    fn reload(&self) -> Result<Snapshot, PersistenceError> {
        let bytes = std::fs::read(&self.path).map_err(|e| self.io_error(e))?;
        let snapshot = self.decode(&bytes)?;
        debug!(path = %self.path.display(), "workspace definition reloaded");
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Project files
// ---------------------------------------------------------------------------

/// Raw byte-level writes to project files, by project-relative path.
pub trait FileStore {
    fn write(&mut self, path: &str, bytes: &[u8]) -> io::Result<()>;

    /// Delete `path`. Deleting a missing file is not an error.
    fn delete(&mut self, path: &str) -> io::Result<()>;
}

/// Files on disk under a project root.
#[derive(Debug, Clone)]
pub struct DirFileStore {
    root: PathBuf,
}

impl DirFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileStore for DirFileStore {
    fn write(&mut self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, bytes)?;
        debug!(path, bytes = bytes.len(), "project file written");
        Ok(())
    }

    fn delete(&mut self, path: &str) -> io::Result<()> {
        match std::fs::remove_file(self.root.join(path)) {
            Ok(()) => {
                debug!(path, "project file deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-memory file store, for dry tooling and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFileStore {
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl FileStore for MemoryFileStore {
    fn write(&mut self, path: &str, bytes: &[u8]) -> io::Result<()> {
        self.files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&mut self, path: &str) -> io::Result<()> {
        self.files.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityList, ModElement, WorkspaceSettings};

    #[test]
    fn test_json_store_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonSnapshotStore::new(dir.path().join("nested").join("workspace.json"));
        let mut snapshot = Snapshot::new(WorkspaceSettings {
            mod_id: "gems".into(),
            ..Default::default()
        });
        snapshot.mod_elements = EntityList::new(vec![ModElement::new("Ruby", "item")]).unwrap();

        store.save(&snapshot).unwrap();
        let reloaded = store.reload().unwrap();
        assert_eq!(reloaded, snapshot);
    }

    #[test]
    fn test_reload_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("missing.json"));
        assert!(matches!(store.reload(), Err(PersistenceError::Io { .. })));
    }

    #[test]
    fn test_reconstruct_takes_sibling_cache() {
        let store = JsonSnapshotStore::new("unused.json");
        let mut sibling = Snapshot::new(WorkspaceSettings::default());
        sibling.generator_cache.mark_element("Ruby");
        let bytes = store.encode(&sibling).unwrap();

        let rebuilt = reconstruct_snapshot(&store, &bytes, &sibling).unwrap();
        assert!(rebuilt.generator_cache.was_regenerated("Ruby"));
        assert!(!rebuilt.is_dirty());

        let err = reconstruct_snapshot(&store, b"{not json", &sibling).unwrap_err();
        assert!(matches!(err, PersistenceError::Parse(_)));
    }

    #[test]
    fn test_dir_file_store_write_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = DirFileStore::new(dir.path());
        files.write("elements/Ruby.mod.json", b"{}").unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("elements/Ruby.mod.json")).unwrap(),
            b"{}"
        );
        files.delete("elements/Ruby.mod.json").unwrap();
        assert!(!dir.path().join("elements/Ruby.mod.json").exists());
        files.delete("elements/Ruby.mod.json").unwrap();
    }
}
