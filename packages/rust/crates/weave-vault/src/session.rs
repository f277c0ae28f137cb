//! Watch session: the consumer loop between the watcher and the graph.
//!
//! One session watches at most one vault. File events are processed one at a
//! time to completion (read with retry, parse, diff, apply, fan out), so
//! every delta is computed against the graph its predecessor produced.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;
use weave_events::{EventBus, GLOBAL_BUS, WeaveEvent, sources, topics};
use weave_graph::delta::DEFAULT_EXCLUDED_DIR_NAMES;
use weave_graph::{
    Graph, GraphDelta, LoadError, MergeOptions, NodeDelta, NodeId, RecentNodeQueue,
    VaultFileEvent, apply_delta_in_place, canonicalize_delta, delete_node_maintaining_transitive_edges,
    file_event_to_delta, graph_as_initial_delta, is_markdown_path, load_graph_from_directory,
    merge_nodes, node_id_for_path,
};
use weave_io::{
    FileEvent, FileWatcherHandle, WatcherConfig, read_text_safe, read_text_with_retry,
    start_file_watcher,
};

use crate::disk::{DiskApplyReport, apply_delta_to_disk, note_path};
use crate::error::VaultError;
use crate::settings::EngineSettings;
use crate::sink::{DeltaOrigin, DeltaSink};
use crate::store::GraphStore;

/// Result of [`WatchSession::start_watching`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    /// Whether the vault is now being watched.
    pub success: bool,
    /// Canonical vault directory on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of [`WatchSession::stop_watching`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    /// Whether a watch was stopped.
    pub success: bool,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of [`WatchSession::watch_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStatus {
    /// Whether a watch is active.
    pub is_watching: bool,
    /// Watched directory, when active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

struct ActiveWatch {
    directory: PathBuf,
    watcher: FileWatcherHandle,
    consumer: JoinHandle<()>,
}

struct Shared {
    store: GraphStore,
    sinks: Mutex<Vec<Box<dyn DeltaSink>>>,
    recent: Mutex<RecentNodeQueue>,
    bus: Arc<EventBus>,
    engine: EngineSettings,
}

fn display_dir(directory: Option<&Path>) -> Value {
    directory.map_or(Value::Null, |dir| Value::String(dir.display().to_string()))
}

impl Shared {
    fn emit(&self, topic: &str, payload: Value) {
        self.bus.emit(sources::SESSION, topic, payload);
    }

    fn emit_lifecycle(&self, topic: &str, directory: &Path) {
        self.bus.publish(WeaveEvent::for_directory(
            sources::SESSION,
            topic,
            &directory.display().to_string(),
        ));
    }

    /// Fan a non-empty, already-applied delta out to sinks and the bus.
    fn publish(&self, directory: Option<&Path>, origin: DeltaOrigin, delta: &[NodeDelta]) {
        if delta.is_empty() {
            return;
        }
        if origin != DeltaOrigin::Load {
            self.recent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .observe(delta);
        }
        {
            let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
            for sink in sinks.iter_mut() {
                sink.on_delta(directory, origin, delta);
            }
        }
        match serde_json::to_value(delta) {
            Ok(encoded) => {
                let source = if origin == DeltaOrigin::User {
                    sources::USER
                } else {
                    sources::SESSION
                };
                self.bus.emit(
                    source,
                    topics::GRAPH_DELTA,
                    json!({ "directory": display_dir(directory), "origin": origin, "delta": encoded }),
                );
            }
            Err(err) => tracing::warn!(error = %err, "failed to encode delta for the event bus"),
        }
    }

    fn replace_vault(&self, directory: Option<&Path>, graph: Graph) {
        let delta = self.store.replace_vault(directory, graph);
        *self.recent.lock().unwrap_or_else(PoisonError::into_inner) = RecentNodeQueue::new();
        self.publish(directory, DeltaOrigin::Load, &delta);
    }

    async fn consume(self: Arc<Self>, root: PathBuf, mut events: mpsc::Receiver<FileEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(&root, event).await;
        }
        tracing::debug!(root = %root.display(), "event queue drained");
    }

    async fn handle_event(&self, root: &Path, event: FileEvent) {
        match event {
            FileEvent::Created { path } if path.is_dir() => {
                for note in notes_under(&path) {
                    self.ingest(root, &note).await;
                }
            }
            FileEvent::Created { path } | FileEvent::Modified { path } => {
                if is_markdown_path(&path) {
                    self.ingest(root, &path).await;
                }
            }
            FileEvent::Deleted { path } => self.forget(root, &path),
            FileEvent::Error { path, error } => {
                tracing::warn!(root = %root.display(), error = %error, "watcher reported an error");
                self.emit(
                    topics::WATCH_ERROR,
                    json!({
                        "directory": root.display().to_string(),
                        "message": error,
                        "path": path.map(|p| p.display().to_string()),
                    }),
                );
            }
        }
    }

    async fn ingest(&self, root: &Path, path: &Path) {
        let Some(id) = node_id_for_path(path, root) else {
            return;
        };
        let policy = self.engine.retry_policy();
        let text = match read_text_with_retry(path, self.engine.max_file_bytes, &policy).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "dropping file event");
                self.emit(
                    topics::FILE_READ_FAILED,
                    json!({ "path": path.display().to_string(), "message": err.to_string() }),
                );
                return;
            }
        };
        let delta = self.store.update(|graph| {
            let event = if graph.contains(&id) {
                VaultFileEvent::Changed { id, content: text }
            } else {
                VaultFileEvent::Added { id, content: text }
            };
            file_event_to_delta(&event, graph)
        });
        self.publish(Some(root), DeltaOrigin::File, &delta);
    }

    /// Re-read the notes `delta` touched so the store matches the files again.
    ///
    /// The correction is published with origin `File`: the disk is the source
    /// of truth and nothing is written back.
    fn resync_from_disk(&self, directory: &Path, delta: &[NodeDelta]) {
        let ids: BTreeSet<NodeId> = delta.iter().map(|op| op.node_id().to_string()).collect();
        let max_bytes = self.engine.max_file_bytes;
        let restore = self.store.update(|graph| {
            let mut scratch = graph.clone();
            let mut restore = GraphDelta::new();
            for id in ids {
                let Some(path) = note_path(directory, &id) else {
                    continue;
                };
                let event = match read_text_safe(&path, max_bytes) {
                    Ok(content) if scratch.contains(&id) => VaultFileEvent::Changed { id, content },
                    Ok(content) => VaultFileEvent::Added { id, content },
                    Err(_) if !path.is_file() && scratch.contains(&id) => {
                        VaultFileEvent::Deleted { id }
                    }
                    Err(_) if !path.is_file() => continue,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "cannot re-read note");
                        continue;
                    }
                };
                let step = file_event_to_delta(&event, &scratch);
                apply_delta_in_place(&mut scratch, &step);
                restore.extend(step);
            }
            restore
        });
        tracing::debug!(restored = restore.len(), "store re-synced after failed write");
        self.publish(Some(directory), DeltaOrigin::File, &restore);
    }

    fn forget(&self, root: &Path, path: &Path) {
        let Some(id) = node_id_for_path(path, root) else {
            return;
        };
        let delta = self.store.update(|graph| {
            if graph.contains(&id) {
                return file_event_to_delta(&VaultFileEvent::Deleted { id: id.clone() }, graph);
            }
            if is_markdown_path(path) {
                return GraphDelta::new();
            }
            // A removed directory takes every note below it.
            let prefix = format!("{id}/");
            graph
                .nodes()
                .filter(|node| node.id.starts_with(&prefix))
                .map(|node| NodeDelta::delete(node.id.clone(), Some(node.clone())))
                .collect()
        });
        self.publish(Some(root), DeltaOrigin::File, &delta);
    }
}

fn is_skipped_dir_name(name: &str) -> bool {
    name.starts_with('.')
        || DEFAULT_EXCLUDED_DIR_NAMES
            .iter()
            .any(|excluded| name.eq_ignore_ascii_case(excluded))
}

/// Notes inside a directory that appeared in one step (mkdir, move, unpack).
fn notes_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && is_skipped_dir_name(&entry.file_name().to_string_lossy()))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_markdown_path(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn watcher_config(directory: &Path, engine: &EngineSettings) -> WatcherConfig {
    let mut config =
        WatcherConfig::for_root(directory).with_stability_window_ms(engine.stability_window_ms);
    config.exclude.extend(
        DEFAULT_EXCLUDED_DIR_NAMES
            .iter()
            .map(|name| format!("**/{name}/**")),
    );
    config
}

/// Owns the graph store, the active watch and the registered sinks.
///
/// Call [`WatchSession::stop_watching`] before dropping a session whose
/// watch is active; the watcher task otherwise lives until the runtime ends.
pub struct WatchSession {
    shared: Arc<Shared>,
    active: tokio::sync::Mutex<Option<ActiveWatch>>,
}

impl WatchSession {
    /// Session publishing on the global bus.
    #[must_use]
    pub fn new(engine: EngineSettings) -> Self {
        Self::with_bus(engine, Arc::clone(&GLOBAL_BUS))
    }

    /// Session publishing on `bus`.
    #[must_use]
    pub fn with_bus(engine: EngineSettings, bus: Arc<EventBus>) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: GraphStore::new(),
                sinks: Mutex::new(Vec::new()),
                recent: Mutex::new(RecentNodeQueue::new()),
                bus,
                engine,
            }),
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Shared graph state.
    #[must_use]
    pub fn store(&self) -> &GraphStore {
        &self.shared.store
    }

    /// Snapshot of the current graph.
    #[must_use]
    pub fn graph(&self) -> Graph {
        self.shared.store.graph()
    }

    /// Bus the session publishes on.
    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.shared.bus)
    }

    /// Engine settings in effect.
    #[must_use]
    pub fn engine(&self) -> &EngineSettings {
        &self.shared.engine
    }

    /// Register a sink; it first receives the current graph as a load delta.
    pub fn add_sink(&self, mut sink: impl DeltaSink + 'static) {
        let mut sinks = self.shared.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        let directory = self.shared.store.watched_directory();
        let current = self.shared.store.with_graph(graph_as_initial_delta);
        if !current.is_empty() {
            sink.on_delta(directory.as_deref(), DeltaOrigin::Load, &current);
        }
        sinks.push(Box::new(sink));
    }

    /// Recently active node ids, most recent first.
    #[must_use]
    pub fn recent_nodes(&self) -> Vec<NodeId> {
        self.shared
            .recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids()
            .map(str::to_string)
            .collect()
    }

    /// Load `path` and start watching it, replacing any previous vault.
    ///
    /// The previous watch is fully stopped before the new vault loads; sinks
    /// receive one replacement delta. Any failure leaves an empty graph and
    /// no active watch.
    pub async fn start_watching(&self, path: impl AsRef<Path>) -> WatchResponse {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            self.shutdown(previous).await;
        }
        match self.open(path.as_ref()).await {
            Ok(watch) => {
                let directory = watch.directory.clone();
                *active = Some(watch);
                self.shared.emit_lifecycle(topics::WATCH_STARTED, &directory);
                WatchResponse {
                    success: true,
                    directory: Some(directory),
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.as_ref().display(), error = %err, "failed to start watching");
                self.shared.replace_vault(None, Graph::new());
                self.shared.emit(
                    topics::WATCH_ERROR,
                    json!({ "directory": path.as_ref().display().to_string(), "message": err.to_string() }),
                );
                WatchResponse {
                    success: false,
                    directory: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Stop the active watch. The graph is kept; the directory is cleared.
    pub async fn stop_watching(&self) -> StopResponse {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(watch) => {
                self.shutdown(watch).await;
                self.shared.store.set_watched_directory(None);
                StopResponse {
                    success: true,
                    error: None,
                }
            }
            None => StopResponse {
                success: false,
                error: Some(VaultError::NotWatching.to_string()),
            },
        }
    }

    /// Whether a watch is active, and on which directory.
    pub async fn watch_status(&self) -> WatchStatus {
        let active = self.active.lock().await;
        WatchStatus {
            is_watching: active.is_some(),
            directory: active.as_ref().map(|watch| watch.directory.clone()),
        }
    }

    /// Apply a user-originated delta: store and sinks first, then disk.
    ///
    /// Upserts are stored in their canonical on-disk form, so the watcher's
    /// later report of the written files parses to the stored nodes and
    /// produces empty deltas.
    ///
    /// # Errors
    /// [`VaultError::NotWatching`] without a vault, or the disk failure. After
    /// a disk failure the touched notes are re-read, so the store and sinks
    /// fall back to what the files hold.
    pub fn apply_user_delta(&self, delta: &[NodeDelta]) -> Result<DiskApplyReport, VaultError> {
        self.commit_user(|_| delta.to_vec())
            .map(|(_, report)| report)
    }

    /// Delete `node_id`, reconnecting its neighbours, and persist the result.
    ///
    /// # Errors
    /// Same as [`WatchSession::apply_user_delta`].
    pub fn delete_node(&self, node_id: &str) -> Result<GraphDelta, VaultError> {
        self.commit_user(|graph| delete_node_maintaining_transitive_edges(graph, node_id))
            .map(|(delta, _)| delta)
    }

    /// Merge `node_ids` into `representative_id` and persist the result.
    ///
    /// # Errors
    /// Same as [`WatchSession::apply_user_delta`].
    pub fn merge_nodes(
        &self,
        node_ids: &[NodeId],
        representative_id: &str,
        options: &MergeOptions,
    ) -> Result<GraphDelta, VaultError> {
        self.commit_user(|graph| merge_nodes(graph, node_ids, representative_id, options))
            .map(|(delta, _)| delta)
    }

    fn commit_user(
        &self,
        compute: impl FnOnce(&Graph) -> GraphDelta,
    ) -> Result<(GraphDelta, DiskApplyReport), VaultError> {
        let directory = self
            .shared
            .store
            .watched_directory()
            .ok_or(VaultError::NotWatching)?;
        let delta = self
            .shared
            .store
            .update(|graph| canonicalize_delta(graph, &compute(graph)));
        self.shared
            .publish(Some(&directory), DeltaOrigin::User, &delta);
        let report = match apply_delta_to_disk(&directory, &delta) {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(directory = %directory.display(), error = %err, "user edit not persisted");
                self.shared.resync_from_disk(&directory, &delta);
                return Err(err);
            }
        };
        tracing::info!(
            written = report.written.len(),
            removed = report.removed.len(),
            "user edit persisted"
        );
        Ok((delta, report))
    }

    async fn open(&self, requested: &Path) -> Result<ActiveWatch, VaultError> {
        let directory = tokio::fs::canonicalize(requested)
            .await
            .map_err(|err| LoadError::InvalidRoot {
                path: requested.to_path_buf(),
                reason: err.to_string(),
            })?;
        if !directory.is_dir() {
            return Err(LoadError::InvalidRoot {
                path: requested.to_path_buf(),
                reason: "not a directory".to_string(),
            }
            .into());
        }

        // Watch before loading so edits made during the scan are queued.
        let (tx, rx) = mpsc::channel(self.shared.engine.event_queue_capacity.max(1));
        let watcher = start_file_watcher(watcher_config(&directory, &self.shared.engine), tx)?;

        let options = self.shared.engine.load_options();
        let scan_root = directory.clone();
        let loaded = tokio::task::spawn_blocking(move || load_graph_from_directory(&scan_root, &options))
            .await
            .map_err(|err| VaultError::Watch(err.to_string()));
        let graph = match loaded {
            Ok(Ok(graph)) => graph,
            Ok(Err(err)) => {
                watcher.stop().await;
                return Err(err.into());
            }
            Err(err) => {
                watcher.stop().await;
                return Err(err);
            }
        };

        self.shared.replace_vault(Some(&directory), graph);
        let consumer = tokio::spawn(Arc::clone(&self.shared).consume(directory.clone(), rx));
        tracing::info!(directory = %directory.display(), notes = self.shared.store.len(), "vault watch started");
        Ok(ActiveWatch {
            directory,
            watcher,
            consumer,
        })
    }

    async fn shutdown(&self, watch: ActiveWatch) {
        let ActiveWatch {
            directory,
            watcher,
            consumer,
        } = watch;
        watcher.stop().await;
        // The watcher dropped its sender; the consumer drains and exits.
        if let Err(err) = consumer.await {
            tracing::warn!(directory = %directory.display(), error = %err, "consumer ended abnormally");
        }
        self.shared.emit_lifecycle(topics::WATCH_STOPPED, &directory);
        tracing::info!(directory = %directory.display(), "vault watch stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_under_skips_hidden() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        std::fs::create_dir_all(dir.path().join("sub/.trash"))?;
        std::fs::write(dir.path().join("sub/a.md"), "a")?;
        std::fs::write(dir.path().join("sub/.trash/b.md"), "b")?;
        std::fs::write(dir.path().join("sub/c.txt"), "c")?;
        let notes = notes_under(&dir.path().join("sub"));
        assert_eq!(notes, vec![dir.path().join("sub/a.md")]);

        std::fs::create_dir_all(dir.path().join("node_modules/pkg"))?;
        std::fs::write(dir.path().join("node_modules/pkg/readme.md"), "r")?;
        assert!(notes_under(&dir.path().join("node_modules")).is_empty());
        Ok(())
    }

    #[test]
    fn test_watcher_config_excludes_scan_dirs() {
        let config = watcher_config(Path::new("/vault"), &EngineSettings::default());
        assert!(config.exclude.iter().any(|p| p == "**/node_modules/**"));
        assert!(config.exclude.iter().any(|p| p == "**/__pycache__/**"));
        assert_eq!(config.stability_window_ms, 100);
    }

    #[test]
    fn test_user_delta_requires_vault() {
        let session = WatchSession::with_bus(EngineSettings::default(), Arc::new(EventBus::new(4)));
        assert!(matches!(
            session.apply_user_delta(&[]),
            Err(VaultError::NotWatching)
        ));
        assert!(matches!(session.delete_node("a.md"), Err(VaultError::NotWatching)));
    }
}
