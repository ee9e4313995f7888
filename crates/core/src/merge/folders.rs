//! Three-way merge of the workspace folder tree.

use tracing::debug;

use crate::errors::StructuralMergeError;
use crate::models::FolderElement;

/// Tree-merge collaborator.
///
/// Reconciles two folder trees against their common ancestor, or reports
/// the subtree it could not reconcile.
pub trait TreeMerger {
    fn merge(
        &self,
        base: &FolderElement,
        local: &FolderElement,
        remote: &FolderElement,
    ) -> Result<FolderElement, StructuralMergeError>;
}

/// Merges folder trees node by node, matching children by name.
///
/// A node changed on one side only takes that side. A node changed on both
/// sides has its children merged recursively: base order first, then names
/// new on the local side, then names new on the remote side. A folder
/// deleted on one side and changed on the other cannot be merged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveFolderMerger;

impl TreeMerger for RecursiveFolderMerger {
    fn merge(
        &self,
        base: &FolderElement,
        local: &FolderElement,
        remote: &FolderElement,
    ) -> Result<FolderElement, StructuralMergeError> {
        merge_node("", base, local, remote)
    }
}

fn merge_node(
    parent: &str,
    base: &FolderElement,
    local: &FolderElement,
    remote: &FolderElement,
) -> Result<FolderElement, StructuralMergeError> {
    if local == remote || remote == base {
        return Ok(local.clone());
    }
    if local == base {
        return Ok(remote.clone());
    }

    let name = if local.name != base.name {
        &local.name
    } else {
        &remote.name
    };
    let path = if parent.is_empty() {
        name.clone()
    } else {
        format!("{parent}/{name}")
    };
    debug!(path = %path, "merging folder children");

    let mut names: Vec<&str> = Vec::new();
    for child in base
        .children
        .iter()
        .chain(&local.children)
        .chain(&remote.children)
    {
        if !names.contains(&child.name.as_str()) {
            names.push(&child.name);
        }
    }

    let mut children = Vec::with_capacity(names.len());
    for child in names {
        match (base.child(child), local.child(child), remote.child(child)) {
            (base_child, Some(l), Some(r)) => {
                let empty = FolderElement::new(child);
                children.push(merge_node(&path, base_child.unwrap_or(&empty), l, r)?);
            }
            (Some(b), Some(l), None) => {
                if l != b {
                    return Err(StructuralMergeError {
                        path: format!("{path}/{child}"),
                        detail: "deleted remotely, modified locally".into(),
                    });
                }
            }
            (Some(b), None, Some(r)) => {
                if r != b {
                    return Err(StructuralMergeError {
                        path: format!("{path}/{child}"),
                        detail: "deleted locally, modified remotely".into(),
                    });
                }
            }
            (None, Some(added), None) | (None, None, Some(added)) => children.push(added.clone()),
            (_, None, None) => {}
        }
    }

    Ok(FolderElement {
        name: name.clone(),
        children,
    })
}
