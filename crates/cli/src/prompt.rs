//! Interactive conflict resolution.

use dialoguer::Select;

use worksync_core::conflict::{ConflictResolver, MergeHandle, WorkspaceMergeHandles};
use worksync_core::errors::MergeError;
use worksync_core::file_sync::FileSyncHandle;
use worksync_core::models::{ChangeType, ResultSide};

use crate::style;

/// Asks on the terminal which side to keep for every conflict.
pub struct PromptResolver;

impl ConflictResolver for PromptResolver {
    fn resolve_workspace(&mut self, handles: &WorkspaceMergeHandles) -> Result<(), MergeError> {
        println!();
        println!(
            "{}",
            style::header(&format!("Workspace conflicts ({})", handles.len()))
        );
        for entry in handles.entries() {
            if entry.handle.is_resolved() {
                continue;
            }
            let label = format!("{} '{}'", entry.kind, entry.label);
            let side = ask(
                &label,
                entry.handle.local_change(),
                entry.handle.remote_change(),
            )?;
            entry.handle.select(side)?;
        }
        Ok(())
    }

    fn resolve_files(&mut self, handles: &[MergeHandle<FileSyncHandle>]) -> Result<(), MergeError> {
        println!();
        println!(
            "{}",
            style::header(&format!("Unmerged files ({})", handles.len()))
        );
        for handle in handles.iter().filter(|h| !h.is_resolved()) {
            let label = format!("file '{}'", handle.key());
            let side = ask(&label, handle.local_change(), handle.remote_change())?;
            handle.select(side)?;
        }
        Ok(())
    }
}

fn ask(label: &str, local: ChangeType, remote: ChangeType) -> Result<ResultSide, MergeError> {
    let items = [
        format!("keep local  ({})", style::change(local)),
        format!("take remote ({})", style::change(remote)),
    ];
    let choice = Select::new()
        .with_prompt(format!("Resolve {label}"))
        .items(&items)
        .default(0)
        .interact()
        .map_err(|e| MergeError::ResolutionAborted(e.to_string()))?;
    Ok(if choice == 0 {
        ResultSide::Local
    } else {
        ResultSide::Remote
    })
}
