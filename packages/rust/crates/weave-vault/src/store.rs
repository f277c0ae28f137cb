//! Shared graph state.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use weave_graph::{Graph, GraphDelta, NodeDelta, apply_delta_in_place, graph_replacement_delta};

#[derive(Debug, Default)]
struct StoreState {
    graph: Graph,
    directory: Option<PathBuf>,
}

/// The current graph and the directory it was loaded from.
///
/// The watch session is the single writer for file-originated changes;
/// user-originated deltas go through the same lock, so every delta is
/// computed and applied against a consistent graph.
#[derive(Debug, Default)]
pub struct GraphStore {
    state: Mutex<StoreState>,
}

impl GraphStore {
    /// Empty store with no vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panicking reader cannot leave the graph half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current graph.
    #[must_use]
    pub fn graph(&self) -> Graph {
        self.lock().graph.clone()
    }

    /// Run `f` against the current graph without cloning it.
    pub fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        f(&self.lock().graph)
    }

    /// Directory of the loaded vault.
    #[must_use]
    pub fn watched_directory(&self) -> Option<PathBuf> {
        self.lock().directory.clone()
    }

    /// Set the vault directory without touching the graph.
    pub fn set_watched_directory(&self, directory: Option<PathBuf>) {
        self.lock().directory = directory;
    }

    /// Number of nodes in the current graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().graph.len()
    }

    /// Whether the current graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().graph.is_empty()
    }

    /// Apply a delta to the stored graph.
    pub fn apply(&self, delta: &[NodeDelta]) {
        if delta.is_empty() {
            return;
        }
        apply_delta_in_place(&mut self.lock().graph, delta);
    }

    /// Compute a delta against the current graph and apply it under one lock.
    pub fn update(&self, compute: impl FnOnce(&Graph) -> GraphDelta) -> GraphDelta {
        let mut state = self.lock();
        let delta = compute(&state.graph);
        apply_delta_in_place(&mut state.graph, &delta);
        delta
    }

    /// Atomically swap in a new vault; returns the full replacement delta.
    pub fn replace_vault(&self, directory: Option<&Path>, graph: Graph) -> GraphDelta {
        let mut state = self.lock();
        let delta = graph_replacement_delta(&state.graph, &graph);
        state.graph = graph;
        state.directory = directory.map(Path::to_path_buf);
        delta
    }
}
