//! worksync core library.
//!
//! This crate provides the components of a three-way merge of structured
//! workspace definitions: the domain model, semantic differs, conflict
//! detection and merge handles, the entity merge orchestrator, the sync
//! driver and its collaborators (persistence, regeneration, git transport),
//! and configuration.

pub mod config;
pub mod conflict;
pub mod diff;
pub mod errors;
pub mod file_sync;
pub mod generator;
pub mod git;
pub mod merge;
pub mod models;
pub mod store;
pub mod sync_engine;

// Re-exports for convenience.
pub use config::AppConfig;
pub use conflict::{ConflictResolver, MergeHandle, PreferSideResolver, WorkspaceMergeHandles};
pub use file_sync::FileSyncHandle;
pub use merge::{RecursiveFolderMerger, WorkspaceMerger};
pub use models::Snapshot;
pub use sync_engine::{SyncHandler, SyncOutcome, SyncServices};
