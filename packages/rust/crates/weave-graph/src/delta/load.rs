use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::codec::{LinkResolver, ParsedMarkdown, is_markdown_path, node_id_for_path, parse_markdown};
use crate::model::Graph;

/// Default ceiling on markdown files per vault.
pub const DEFAULT_MAX_FILES: usize = 300;

/// Directory names never scanned (hidden directories are skipped as well).
pub const DEFAULT_EXCLUDED_DIR_NAMES: &[&str] =
    &["node_modules", "target", "venv", "__pycache__"];

/// Vault load failure. The caller falls back to an empty graph.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Root is missing or not a directory.
    #[error("invalid vault root '{path}': {reason}")]
    InvalidRoot {
        /// Root as given.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },
    /// Vault has more notes than the configured ceiling.
    #[error("vault contains {found} markdown files, more than the limit of {limit}")]
    TooManyFiles {
        /// Number of notes found.
        found: usize,
        /// Configured ceiling.
        limit: usize,
    },
    /// Root directory could not be listed.
    #[error("failed to scan vault: {0}")]
    Io(#[from] std::io::Error),
}

/// Scan options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Maximum number of markdown files; exceeding it fails the load.
    pub max_files: usize,
    /// Extra directory names to skip, on top of the defaults.
    pub excluded_dirs: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            excluded_dirs: Vec::new(),
        }
    }
}

impl LoadOptions {
    /// Options with a different file ceiling.
    #[must_use]
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    fn excluded_set(&self) -> HashSet<String> {
        DEFAULT_EXCLUDED_DIR_NAMES
            .iter()
            .map(|name| (*name).to_string())
            .chain(self.excluded_dirs.iter().cloned())
            .filter_map(|name| {
                let trimmed = name.trim().trim_matches('/').to_lowercase();
                (!trimmed.is_empty()).then_some(trimmed)
            })
            .collect()
    }
}

fn should_skip_entry(path: &Path, is_dir: bool, root: &Path, excluded: &HashSet<String>) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    let dir_components = if is_dir {
        &components[..]
    } else {
        &components[..components.len().saturating_sub(1)]
    };
    dir_components
        .iter()
        .any(|name| name.starts_with('.') || excluded.contains(&name.to_lowercase()))
}

fn collect_note_paths(root: &Path, options: &LoadOptions) -> Result<Vec<PathBuf>, LoadError> {
    let excluded = options.excluded_set();
    let mut paths = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !should_skip_entry(entry.path(), entry.file_type().is_dir(), root, &excluded))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(LoadError::Io(err.into())),
            Err(err) => {
                log::warn!("skipping unreadable vault entry: {err}");
                continue;
            }
        };
        if entry.file_type().is_file() && is_markdown_path(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

fn canonical_root(root: &Path) -> Result<PathBuf, LoadError> {
    let canonical = root.canonicalize().map_err(|err| LoadError::InvalidRoot {
        path: root.to_path_buf(),
        reason: err.to_string(),
    })?;
    if !canonical.is_dir() {
        return Err(LoadError::InvalidRoot {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    Ok(canonical)
}

/// Load every note under `root` into a graph.
///
/// Notes are parsed in parallel; links are resolved afterwards against the
/// full id set, so the result does not depend on scan order. Unreadable
/// files are skipped with a warning.
///
/// # Errors
///
/// [`LoadError::InvalidRoot`] when `root` is not a readable directory and
/// [`LoadError::TooManyFiles`] when the note count exceeds
/// [`LoadOptions::max_files`]; no partial graph is returned.
pub fn load_graph_from_directory(root: &Path, options: &LoadOptions) -> Result<Graph, LoadError> {
    let root = canonical_root(root)?;
    let paths = collect_note_paths(&root, options)?;
    if paths.len() > options.max_files {
        return Err(LoadError::TooManyFiles {
            found: paths.len(),
            limit: options.max_files,
        });
    }

    let parsed: Vec<ParsedMarkdown> = paths
        .into_par_iter()
        .filter_map(|path| {
            let id = node_id_for_path(&path, &root)?;
            match std::fs::read_to_string(&path) {
                Ok(text) => Some(parse_markdown(&id, &text)),
                Err(err) => {
                    log::warn!("skipping unreadable note {}: {err}", path.display());
                    None
                }
            }
        })
        .collect();

    let resolver = LinkResolver::new(parsed.iter().map(|note| note.id.as_str()));
    let graph = Graph::from_nodes(parsed.into_iter().map(|note| note.into_node(&resolver)));
    log::info!(
        "loaded vault {}: {} notes, {} resolved edges",
        root.display(),
        graph.len(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Load a vault, falling back to an empty graph plus the error.
#[must_use]
pub fn load_graph_or_empty(root: &Path, options: &LoadOptions) -> (Graph, Option<LoadError>) {
    match load_graph_from_directory(root, options) {
        Ok(graph) => (graph, None),
        Err(err) => {
            log::warn!("vault load failed, using empty graph: {err}");
            (Graph::default(), Some(err))
        }
    }
}
