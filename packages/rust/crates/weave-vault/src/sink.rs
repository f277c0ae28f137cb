//! Consumers of applied deltas.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use weave_graph::{NodeDelta, ProjectionReport, ViewProjector, ViewSurface};

/// Where a delta came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOrigin {
    /// Vault load or folder switch.
    Load,
    /// Filesystem change seen by the watcher.
    File,
    /// Structural edit requested by the user.
    User,
}

/// Receives every non-empty delta after it has been applied to the store.
pub trait DeltaSink: Send {
    /// Handle one delta. Must not block for long; it runs on the session loop.
    fn on_delta(&mut self, directory: Option<&Path>, origin: DeltaOrigin, delta: &[NodeDelta]);
}

impl<F> DeltaSink for F
where
    F: FnMut(Option<&Path>, DeltaOrigin, &[NodeDelta]) + Send,
{
    fn on_delta(&mut self, directory: Option<&Path>, origin: DeltaOrigin, delta: &[NodeDelta]) {
        self(directory, origin, delta);
    }
}

/// Projects deltas onto a shared view surface.
pub struct ViewSink<S> {
    surface: Arc<Mutex<S>>,
    projector: ViewProjector,
    last_report: Arc<Mutex<Option<ProjectionReport>>>,
}

impl<S: ViewSurface + Send> ViewSink<S> {
    /// Sink writing into `surface`.
    pub fn new(surface: Arc<Mutex<S>>) -> Self {
        Self {
            surface,
            projector: ViewProjector::new(),
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Handle to the most recent projection report.
    #[must_use]
    pub fn report_handle(&self) -> Arc<Mutex<Option<ProjectionReport>>> {
        Arc::clone(&self.last_report)
    }
}

impl<S: ViewSurface + Send> DeltaSink for ViewSink<S> {
    fn on_delta(&mut self, _directory: Option<&Path>, origin: DeltaOrigin, delta: &[NodeDelta]) {
        if origin == DeltaOrigin::Load {
            self.projector.reset();
        }
        let report = {
            let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
            self.projector.apply(&mut *surface, delta)
        };
        tracing::debug!(
            created = report.created.len(),
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            edges_added = report.edges_added,
            edges_skipped = report.edges_skipped,
            "delta projected"
        );
        *self.last_report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
    }
}
