use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{ViewEdge, ViewNode, ViewSurface, edge_id};
use crate::classify::has_substantive_change;
use crate::delta::NodeDelta;
use crate::model::{Edge, GraphNode, NodeId, Position, normalize_color};

/// What one projection did to the view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionReport {
    /// Nodes added to the view.
    pub created: Vec<NodeId>,
    /// Existing nodes whose label/color were refreshed.
    pub updated: Vec<NodeId>,
    /// Nodes removed from the view.
    pub deleted: Vec<NodeId>,
    /// Edges materialized.
    pub edges_added: usize,
    /// Edges skipped because their target is not in the view.
    pub edges_skipped: usize,
    /// Stale edges removed from updated nodes.
    pub edges_removed: usize,
    /// Updated nodes whose content changed beyond links.
    pub substantively_changed: Vec<NodeId>,
}

impl ProjectionReport {
    /// Whether the projection touched nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.edges_added == 0
            && self.edges_removed == 0
    }
}

/// Two-pass delta projector that remembers each node's outgoing edges.
///
/// Pass 1 creates, updates and deletes nodes; pass 2 materializes edges once
/// every endpoint the delta introduces exists. Remembered edges let a node
/// that appears later pick up the links that were waiting for it.
#[derive(Debug, Clone, Default)]
pub struct ViewProjector {
    outgoing: BTreeMap<NodeId, Vec<Edge>>,
}

impl ViewProjector {
    /// Projector with no remembered edges.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything (the view was cleared externally).
    pub fn reset(&mut self) {
        self.outgoing.clear();
    }

    /// Apply `delta` to `surface` inside one batch.
    pub fn apply<S: ViewSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        delta: &[NodeDelta],
    ) -> ProjectionReport {
        let mut report = ProjectionReport::default();
        surface.begin_batch();

        let mut upserted: BTreeMap<&str, &GraphNode> = BTreeMap::new();
        let mut created: BTreeSet<&str> = BTreeSet::new();
        for op in delta {
            match op {
                NodeDelta::UpsertNode {
                    node_to_upsert,
                    previous_node,
                } => {
                    let id = node_to_upsert.id.as_str();
                    if project_node(surface, node_to_upsert, previous_node.as_ref(), &mut report) {
                        created.insert(id);
                    }
                    upserted.insert(id, node_to_upsert);
                }
                NodeDelta::DeleteNode { node_id, .. } => {
                    if surface.has_node(node_id) {
                        surface.remove_node(node_id);
                        report.deleted.push(node_id.clone());
                    }
                    self.outgoing.remove(node_id);
                    upserted.remove(node_id.as_str());
                    created.remove(node_id.as_str());
                }
            }
        }

        for node in upserted.values() {
            self.outgoing
                .insert(node.id.clone(), node.outgoing_edges.clone());
            remove_stale_edges(surface, node, &mut report);
            for edge in &node.outgoing_edges {
                materialize_edge(surface, &node.id, edge, &mut report);
            }
        }

        // Links from untouched nodes that were waiting for a created node.
        for (source, edges) in &self.outgoing {
            if upserted.contains_key(source.as_str()) || !surface.has_node(source) {
                continue;
            }
            for edge in edges
                .iter()
                .filter(|edge| created.contains(edge.target_id.as_str()))
            {
                materialize_edge(surface, source, edge, &mut report);
            }
        }

        surface.end_batch();
        log::debug!(
            "projected delta of {} ops: {} created, {} updated, {} deleted, {} edges added, {} skipped",
            delta.len(),
            report.created.len(),
            report.updated.len(),
            report.deleted.len(),
            report.edges_added,
            report.edges_skipped
        );
        report
    }
}

/// Pass 1 for one upsert. Returns `true` when the node was created.
fn project_node<S: ViewSurface + ?Sized>(
    surface: &mut S,
    node: &GraphNode,
    previous: Option<&GraphNode>,
    report: &mut ProjectionReport,
) -> bool {
    let label = node.title();
    let color = node.ui_metadata.color.as_deref().and_then(normalize_color);
    if surface.has_node(&node.id) {
        surface.update_node(&node.id, &label, color.as_deref());
        report.updated.push(node.id.clone());
        if previous.is_some_and(|prev| has_substantive_change(&prev.content, &node.content)) {
            report.substantively_changed.push(node.id.clone());
        }
        return false;
    }
    surface.add_node(ViewNode {
        id: node.id.clone(),
        label,
        color,
        position: node
            .ui_metadata
            .position
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .unwrap_or(Position::ORIGIN),
    });
    report.created.push(node.id.clone());
    true
}

fn remove_stale_edges<S: ViewSurface + ?Sized>(
    surface: &mut S,
    node: &GraphNode,
    report: &mut ProjectionReport,
) {
    let wanted: BTreeSet<String> = node
        .outgoing_edges
        .iter()
        .map(|edge| edge_id(&node.id, &edge.target_id))
        .collect();
    for stale in surface
        .outgoing_edge_ids(&node.id)
        .into_iter()
        .filter(|id| !wanted.contains(id))
    {
        surface.remove_edge(&stale);
        report.edges_removed += 1;
    }
}

fn materialize_edge<S: ViewSurface + ?Sized>(
    surface: &mut S,
    source: &str,
    edge: &Edge,
    report: &mut ProjectionReport,
) {
    if edge.target_id == source {
        return;
    }
    if !surface.has_node(&edge.target_id) {
        log::warn!(
            "edge {source} -> {} skipped: target not in view yet",
            edge.target_id
        );
        report.edges_skipped += 1;
        return;
    }
    let id = edge_id(source, &edge.target_id);
    if surface.has_edge(&id) {
        return;
    }
    surface.add_edge(ViewEdge {
        id,
        source: source.to_string(),
        target: edge.target_id.clone(),
        label: edge.label.clone(),
    });
    report.edges_added += 1;
}
