use std::path::{Component, Path};

use crate::model::NodeId;

pub(crate) fn normalize_slashes(raw: &str) -> String {
    raw.replace('\\', "/")
}

pub(crate) fn has_markdown_extension(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    lower.ends_with(".md") || lower.ends_with(".markdown")
}

/// File name without directory or markdown extension.
pub(crate) fn file_stem(id: &str) -> &str {
    let name = id.rsplit('/').next().unwrap_or(id);
    for ext in [".markdown", ".md"] {
        if let Some(split) = name.len().checked_sub(ext.len())
            && let Some(tail) = name.get(split..)
            && tail.eq_ignore_ascii_case(ext)
        {
            return &name[..split];
        }
    }
    name
}

/// Directory part of an id (without trailing slash), empty at the vault root.
pub(crate) fn parent_dir(id: &str) -> &str {
    id.rfind('/').map_or("", |idx| &id[..idx])
}

/// Canonical id for a link target that did not resolve to an existing node.
pub(crate) fn canonical_target(raw: &str) -> NodeId {
    let cleaned = normalize_slashes(raw.trim());
    let cleaned = cleaned.trim_start_matches("./");
    if has_markdown_extension(cleaned) {
        cleaned.to_string()
    } else {
        format!("{cleaned}.md")
    }
}

/// Whether the extension is one the vault scanner picks up.
#[must_use]
pub fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|v| v.to_str())
        .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "md" | "markdown"))
}

/// Node id for a file inside `root`: relative path with forward slashes.
#[must_use]
pub fn node_id_for_path(path: &Path, root: &Path) -> Option<NodeId> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Whether a wikilink target is a well-formed vault-relative path.
#[must_use]
pub fn is_well_formed_target(raw: &str) -> bool {
    let target = normalize_slashes(raw.trim());
    if target.is_empty() || target.chars().any(char::is_control) {
        return false;
    }
    if target.starts_with('/') || target.contains("://") {
        return false;
    }
    let lower = target.to_lowercase();
    if ["mailto:", "tel:", "data:", "javascript:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return false;
    }
    // Windows drive prefix such as `C:/notes`.
    let bytes = target.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return false;
    }
    let trimmed = target.trim_start_matches("./");
    !trimmed.is_empty()
        && trimmed
            .split('/')
            .all(|segment| !segment.trim().is_empty() && segment != "..")
}
