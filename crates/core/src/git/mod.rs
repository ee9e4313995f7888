//! Git operations for worksync.
//!
//! The version-control transport is a collaborator: it supplies the
//! file-level change records of an in-progress merge and is told when every
//! path has been resolved.

pub mod client;

pub use client::GitClient;

use crate::errors::GitError;

/// Version-control transport, as seen by the sync driver.
pub trait Transport {
    /// Mark every path in the working tree as resolved.
    fn mark_all_resolved(&mut self) -> Result<(), GitError>;
}
