//! Error types for the worksync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

use crate::models::FormatVersion;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Model errors
// ---------------------------------------------------------------------------

/// Errors raised while constructing workspace model values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// An identity-keyed collection was given the same name twice.
    #[error("duplicate {collection} identity '{name}'")]
    DuplicateIdentity { collection: String, name: String },
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

/// Errors from serializing, deserializing or storing snapshots.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The snapshot bytes were not a valid workspace definition.
    #[error("failed to parse workspace definition: {0}")]
    Parse(#[from] serde_json::Error),

    /// Reading or writing the workspace definition failed.
    #[error("workspace storage I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors from merge handles and conflict resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// A resolved side was assigned to a handle that already has one.
    #[error("merge handle '{key}' is already resolved")]
    AlreadyResolved { key: String },

    /// Only the local or the remote side can be selected.
    #[error("cannot select side '{side}' for merge handle '{key}'")]
    InvalidSide { key: String, side: String },

    /// The resolution collaborator returned without resolving everything.
    #[error("{count} merge handle(s) left unresolved")]
    Unresolved { count: usize },

    /// The resolution collaborator gave up.
    #[error("conflict resolution aborted: {0}")]
    ResolutionAborted(String),
}

/// A folder subtree that cannot be reconciled automatically.
///
/// Never fatal: the orchestrator turns it into a single folder merge handle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot merge folder subtree '{path}' automatically: {detail}")]
pub struct StructuralMergeError {
    pub path: String,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors that abort a whole sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote workspace was written by a newer, released format.
    #[error("workspace format version {found} is newer than supported version {supported}")]
    VersionIncompatible {
        found: FormatVersion,
        supported: FormatVersion,
    },

    /// A conflicting workspace definition could not be reconstructed.
    #[error("failed to reconstruct {side} workspace: {source}")]
    Deserialization {
        side: String,
        #[source]
        source: PersistenceError,
    },

    /// A conflicting workspace definition was missing its content.
    #[error("workspace definition '{path}' has no {side} content")]
    MissingContent { path: String, side: String },

    /// Error from the version-control transport, propagated unchanged.
    #[error(transparent)]
    Transport(#[from] GitError),

    /// Conflict resolution failed.
    #[error("sync merge error: {0}")]
    Merge(#[from] MergeError),

    /// Saving or reloading the local snapshot failed.
    #[error("sync persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Writing or deleting a project file failed.
    #[error("failed to update project file '{path}': {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// There is no merge in progress (no `MERGE_HEAD`).
    #[error("no merge in progress in '{0}'")]
    NotMerging(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
