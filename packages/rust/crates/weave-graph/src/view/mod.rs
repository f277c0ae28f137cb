//! Projection of deltas onto a live, renderable view.

mod projector;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::delta::NodeDelta;
use crate::model::{NodeId, Position};

pub use projector::{ProjectionReport, ViewProjector};

/// Deterministic view edge id.
#[must_use]
pub fn edge_id(source: &str, target: &str) -> String {
    format!("{source}->{target}")
}

/// Node as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewNode {
    /// Node id.
    pub id: NodeId,
    /// Displayed label (derived title).
    pub label: String,
    /// Validated color.
    pub color: Option<String>,
    /// View-owned position.
    pub position: Position,
}

/// Edge as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewEdge {
    /// `source->target`.
    pub id: String,
    /// Source node id.
    pub source: NodeId,
    /// Target node id.
    pub target: NodeId,
    /// Relationship label.
    pub label: String,
}

/// Mutable view the projector writes into (implemented by the renderer).
pub trait ViewSurface {
    /// Start an atomic batch of mutations.
    fn begin_batch(&mut self) {}
    /// Finish the batch started by [`ViewSurface::begin_batch`].
    fn end_batch(&mut self) {}
    /// Whether a node is present.
    fn has_node(&self, id: &str) -> bool;
    /// Add a node.
    fn add_node(&mut self, node: ViewNode);
    /// Change label and color of an existing node; position is untouched.
    fn update_node(&mut self, id: &str, label: &str, color: Option<&str>);
    /// Remove a node together with its incident edges.
    fn remove_node(&mut self, id: &str);
    /// Whether an edge id is present.
    fn has_edge(&self, edge_id: &str) -> bool;
    /// Add an edge; both endpoints exist.
    fn add_edge(&mut self, edge: ViewEdge);
    /// Remove an edge.
    fn remove_edge(&mut self, edge_id: &str);
    /// Ids of edges leaving `source`.
    fn outgoing_edge_ids(&self, source: &str) -> Vec<String>;
}

/// In-memory view used by the CLI and tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewGraph {
    nodes: BTreeMap<NodeId, ViewNode>,
    edges: BTreeMap<String, ViewEdge>,
    #[serde(skip)]
    batches: usize,
}

impl ViewGraph {
    /// Empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&ViewNode> {
        self.nodes.get(id)
    }

    /// Look up an edge by id.
    #[must_use]
    pub fn edge(&self, edge_id: &str) -> Option<&ViewEdge> {
        self.edges.get(edge_id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &ViewNode> {
        self.nodes.values()
    }

    /// Edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &ViewEdge> {
        self.edges.values()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Completed batches so far.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches
    }
}

impl ViewSurface for ViewGraph {
    fn end_batch(&mut self) {
        self.batches += 1;
    }

    fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    fn add_node(&mut self, node: ViewNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    fn update_node(&mut self, id: &str, label: &str, color: Option<&str>) {
        if let Some(node) = self.nodes.get_mut(id) {
            label.clone_into(&mut node.label);
            node.color = color.map(str::to_string);
        }
    }

    fn remove_node(&mut self, id: &str) {
        self.nodes.remove(id);
        self.edges
            .retain(|_, edge| edge.source != id && edge.target != id);
    }

    fn has_edge(&self, edge_id: &str) -> bool {
        self.edges.contains_key(edge_id)
    }

    fn add_edge(&mut self, edge: ViewEdge) {
        self.edges.insert(edge.id.clone(), edge);
    }

    fn remove_edge(&mut self, edge_id: &str) {
        self.edges.remove(edge_id);
    }

    fn outgoing_edge_ids(&self, source: &str) -> Vec<String> {
        self.edges
            .values()
            .filter(|edge| edge.source == source)
            .map(|edge| edge.id.clone())
            .collect()
    }
}

/// Apply `delta` to `surface` in one batch without remembered state.
///
/// Edges whose target is missing are skipped; they appear once a later
/// upsert of their source finds the target present. [`ViewProjector`] also
/// restores them when the target itself appears.
pub fn apply_delta_to_view<S: ViewSurface + ?Sized>(
    surface: &mut S,
    delta: &[NodeDelta],
) -> ProjectionReport {
    ViewProjector::new().apply(surface, delta)
}
