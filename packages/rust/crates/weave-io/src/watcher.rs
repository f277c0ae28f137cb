//! Filesystem watcher that settles write bursts before reporting them.
//!
//! Uses the `notify` crate for cross-platform monitoring. Raw events are
//! filtered with a compiled `GlobSet`, modifications are held until the path
//! has been quiet for the stability window, and the result is delivered on
//! a bounded channel owned by the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::IoError;

const RAW_EVENT_BUFFER: usize = 1024;
const MIN_TICK: Duration = Duration::from_millis(10);

/// Configuration for the vault watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory to watch.
    pub root: PathBuf,
    /// Paths to include (glob patterns, matched relative to `root`).
    pub patterns: Vec<String>,
    /// Paths to exclude.
    pub exclude: Vec<String>,
    /// Quiet period before a modified path is reported.
    pub stability_window_ms: u64,
    /// Whether to watch recursively.
    pub recursive: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            patterns: vec!["**/*".to_string()],
            exclude: vec![
                "**/.*/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/*.tmp".to_string(),
                "**/*.swp".to_string(),
                "**/*~".to_string(),
            ],
            stability_window_ms: 100,
            recursive: true,
        }
    }
}

impl WatcherConfig {
    /// Default configuration for `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Same configuration with a different stability window.
    #[must_use]
    pub fn with_stability_window_ms(mut self, millis: u64) -> Self {
        self.stability_window_ms = millis;
        self
    }
}

/// Settled filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// Path appeared (also the target side of a rename).
    Created {
        /// Absolute path.
        path: PathBuf,
    },
    /// Path was written and has been quiet for the stability window.
    Modified {
        /// Absolute path.
        path: PathBuf,
    },
    /// Path disappeared (also the source side of a rename).
    Deleted {
        /// Absolute path.
        path: PathBuf,
    },
    /// Backend reported an error; the watch keeps running.
    Error {
        /// Path involved, when known.
        path: Option<PathBuf>,
        /// Backend message.
        error: String,
    },
}

impl FileEvent {
    /// Path the event refers to.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Created { path } | Self::Modified { path } | Self::Deleted { path } => {
                Some(path)
            }
            Self::Error { path, .. } => path.as_deref(),
        }
    }
}

/// Include/exclude glob filter, compiled once per watcher.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => tracing::warn!(pattern = %pattern, error = %err, "ignoring invalid watch pattern"),
        }
    }
    match builder.build() {
        Ok(set) => Some(set),
        Err(err) => {
            tracing::warn!(error = %err, "failed to compile watch patterns");
            None
        }
    }
}

impl PatternFilter {
    /// Compile include and exclude patterns; invalid globs are skipped.
    #[must_use]
    pub fn new(patterns: &[String], exclude: &[String]) -> Self {
        Self {
            include: build_globset(patterns),
            exclude: build_globset(exclude),
        }
    }

    /// Whether `path` passes: not excluded, and included when includes exist.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        if let Some(exclude) = &self.exclude
            && exclude.is_match(path)
        {
            return false;
        }
        self.include.as_ref().is_none_or(|include| include.is_match(path))
    }
}

enum Classified {
    Immediate(FileEvent),
    Settle(PathBuf),
    Ignore,
}

fn classify(kind: &EventKind, path: &Path) -> Classified {
    match kind {
        EventKind::Create(_) => Classified::Immediate(FileEvent::Created {
            path: path.to_path_buf(),
        }),
        EventKind::Remove(_) => Classified::Immediate(FileEvent::Deleted {
            path: path.to_path_buf(),
        }),
        // Renames arrive as separate from/to halves on most backends.
        EventKind::Modify(ModifyKind::Name(_)) => {
            if path.exists() {
                Classified::Immediate(FileEvent::Created {
                    path: path.to_path_buf(),
                })
            } else {
                Classified::Immediate(FileEvent::Deleted {
                    path: path.to_path_buf(),
                })
            }
        }
        EventKind::Modify(_) | EventKind::Any => Classified::Settle(path.to_path_buf()),
        EventKind::Access(_) | EventKind::Other => Classified::Ignore,
    }
}

/// Paths quiet for at least `window`, in path order.
fn take_settled(pending: &mut HashMap<PathBuf, Instant>, window: Duration) -> Vec<PathBuf> {
    let now = Instant::now();
    let mut ready: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, last)| now.duration_since(**last) >= window)
        .map(|(path, _)| path.clone())
        .collect();
    ready.sort();
    for path in &ready {
        pending.remove(path);
    }
    ready
}

/// Handle to a running watcher.
#[derive(Debug)]
pub struct FileWatcherHandle {
    root: PathBuf,
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl FileWatcherHandle {
    /// Whether the watch task is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the watcher and wait until the OS watch is released.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        if let Err(err) = self.task.await {
            tracing::warn!(root = %self.root.display(), error = %err, "watch task ended abnormally");
        }
    }
}

/// Start watching `config.root`, delivering settled events on `events`.
///
/// Must be called from within a Tokio runtime. The watch ends when
/// [`FileWatcherHandle::stop`] is called or the receiver is dropped.
///
/// # Errors
/// `IoError::Watch` when the backend cannot be created or the root cannot be
/// watched.
pub fn start_file_watcher(
    config: WatcherConfig,
    events: mpsc::Sender<FileEvent>,
) -> Result<FileWatcherHandle, IoError> {
    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
    let (raw_tx, mut raw_rx) = mpsc::channel::<Result<Event, notify::Error>>(RAW_EVENT_BUFFER);

    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| {
            let _ = raw_tx.blocking_send(result);
        },
        Config::default().with_poll_interval(Duration::from_millis(50)),
    )?;
    watcher.watch(
        &config.root,
        if config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        },
    )?;

    let filter = PatternFilter::new(&config.patterns, &config.exclude);
    let window = Duration::from_millis(config.stability_window_ms);
    let root = config.root.clone();
    tracing::info!(root = %root.display(), window_ms = config.stability_window_ms, "watching vault");

    let task_root = root.clone();
    let task = tokio::spawn(async move {
        // Keep the OS watch alive for the lifetime of the task.
        let _watcher = watcher;
        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
        let mut ticker = tokio::time::interval((window / 2).max(MIN_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'watch: loop {
            tokio::select! {
                _ = stop_rx.recv() => break 'watch,
                raw = raw_rx.recv() => match raw {
                    Some(Ok(event)) => {
                        for path in &event.paths {
                            let relative = path.strip_prefix(&task_root).unwrap_or(path);
                            if !filter.matches(relative) {
                                continue;
                            }
                            match classify(&event.kind, path) {
                                Classified::Immediate(file_event) => {
                                    pending.remove(path);
                                    if events.send(file_event).await.is_err() {
                                        break 'watch;
                                    }
                                }
                                Classified::Settle(path) => {
                                    pending.insert(path, Instant::now());
                                }
                                Classified::Ignore => {}
                            }
                        }
                    }
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "watch backend error");
                        let file_event = FileEvent::Error {
                            path: err.paths.first().cloned(),
                            error: err.to_string(),
                        };
                        if events.send(file_event).await.is_err() {
                            break 'watch;
                        }
                    }
                    None => break 'watch,
                },
                _ = ticker.tick(), if !pending.is_empty() => {
                    for path in take_settled(&mut pending, window) {
                        // A later remove already reported the path.
                        if !path.exists() {
                            continue;
                        }
                        if events.send(FileEvent::Modified { path }).await.is_err() {
                            break 'watch;
                        }
                    }
                }
            }
        }
        tracing::info!(root = %task_root.display(), "vault watch stopped");
    });

    Ok(FileWatcherHandle {
        root,
        stop_tx,
        task,
    })
}
