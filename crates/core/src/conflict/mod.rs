//! Conflict detection, merge handles and resolution.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- comparing two diffs against the same base to find
//!    identities both sides changed.
//! 2. **Handles** -- holding both candidates of a conflict until a side is
//!    selected.
//! 3. **Resolution** -- handing unresolved handles to a collaborator.

pub mod detector;
pub mod handle;
pub mod resolver;
pub mod workspace;

pub use detector::{ConflictDetector, Overlap};
pub use handle::{MergeHandle, Resolvable};
pub use resolver::{ConflictResolver, PreferSideResolver};
pub use workspace::{ConflictEntry, ConflictKind, ElementConflict, WorkspaceMergeHandles};
