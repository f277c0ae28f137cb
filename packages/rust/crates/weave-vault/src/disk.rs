//! Writes user-originated deltas back to the vault.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use weave_graph::{NodeDelta, NodeId, serialize_node};
use weave_io::{IoError, read_text_safe};

use crate::error::VaultError;

/// What a disk projection did, per node id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskApplyReport {
    /// Files created or rewritten.
    pub written: Vec<NodeId>,
    /// Files whose text was already up to date.
    pub unchanged: Vec<NodeId>,
    /// Files removed.
    pub removed: Vec<NodeId>,
    /// Ids that do not name a path inside the vault.
    pub rejected: Vec<NodeId>,
}

/// File path for `id` under `root`, or `None` when the id would escape it.
#[must_use]
pub fn note_path(root: &Path, id: &str) -> Option<PathBuf> {
    let relative = Path::new(id);
    let mut path = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => path.push(segment),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (path != root).then_some(path)
}

// UTF-8 byte order mark, stripped by the read.
const BOM_LEN: u64 = 3;

/// Whether the file at `path` already holds `text`.
///
/// A file larger than `text` plus a byte order mark cannot match, so the
/// read is bounded by that size. Missing, oversize and binary files differ.
fn is_up_to_date(path: &Path, text: &str) -> Result<bool, VaultError> {
    let limit = u64::try_from(text.len())
        .unwrap_or(u64::MAX)
        .saturating_add(BOM_LEN);
    match read_text_safe(path, limit) {
        Ok(existing) => Ok(existing == text),
        Err(IoError::NotFound(_) | IoError::TooLarge(..) | IoError::BinaryFile) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Apply `delta` to the files under `root`, in order.
///
/// Upserts serialize the node and write it only when the text differs, so
/// replaying a delta leaves modification times alone. Deleting a missing
/// file is not an error.
///
/// # Errors
/// The first filesystem failure; operations before it have been applied.
pub fn apply_delta_to_disk(root: &Path, delta: &[NodeDelta]) -> Result<DiskApplyReport, VaultError> {
    let mut report = DiskApplyReport::default();
    for op in delta {
        let id = op.node_id();
        let Some(path) = note_path(root, id) else {
            tracing::warn!(id, "node id escapes the vault; not persisted");
            report.rejected.push(id.to_string());
            continue;
        };
        match op {
            NodeDelta::UpsertNode { node_to_upsert, .. } => {
                let text = serialize_node(node_to_upsert);
                if is_up_to_date(&path, &text)? {
                    report.unchanged.push(id.to_string());
                    continue;
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, text)?;
                tracing::debug!(path = %path.display(), "note written");
                report.written.push(id.to_string());
            }
            NodeDelta::DeleteNode { .. } => match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "note removed");
                    report.removed.push(id.to_string());
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            },
        }
    }
    Ok(report)
}
