//! Graph data model: nodes, labeled edges and the derived incoming index.

mod color;

pub use color::{is_valid_css_color, normalize_color};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Vault-relative file path (forward slashes, extension included).
pub type NodeId = String;

/// 2D canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Default placement for nodes without stored coordinates.
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Create a position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Directed, labeled edge owned by its source node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Id of the node this edge points at. May not exist in the graph.
    pub target_id: NodeId,
    /// Relationship label, empty when the link carries none.
    #[serde(default)]
    pub label: String,
}

impl Edge {
    /// Create an edge.
    pub fn new(target_id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            label: label.into(),
        }
    }

    /// Create an edge with an empty label.
    pub fn unlabeled(target_id: impl Into<NodeId>) -> Self {
        Self::new(target_id, String::new())
    }
}

/// Presentation metadata stored in the frontmatter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUiMetadata {
    /// Validated CSS color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Stored canvas position; `None` lets the layout decide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Unknown frontmatter keys, round-tripped verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_yaml_props: BTreeMap<String, serde_yaml::Value>,
    /// Node synthesizes context from other nodes rather than authored text.
    #[serde(default)]
    pub is_context_node: bool,
    /// Members aggregated by a context node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contained_node_ids: Option<Vec<NodeId>>,
}

/// One markdown file in the vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Node identity and storage location.
    pub id: NodeId,
    /// Body text with frontmatter removed and wikilinks as `[target]*`.
    pub content: String,
    /// Outgoing edges in document order, unique by target.
    #[serde(default)]
    pub outgoing_edges: Vec<Edge>,
    /// Presentation metadata.
    #[serde(default)]
    pub ui_metadata: NodeUiMetadata,
}

impl GraphNode {
    /// Create a node without edges or metadata.
    pub fn new(id: impl Into<NodeId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            outgoing_edges: Vec::new(),
            ui_metadata: NodeUiMetadata::default(),
        }
    }

    /// Replace outgoing edges (deduplicated by target, first wins).
    #[must_use]
    pub fn with_edges(mut self, edges: impl IntoIterator<Item = Edge>) -> Self {
        self.outgoing_edges = dedupe_edges(edges);
        self
    }

    /// Set the stored position.
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.ui_metadata.position = Some(Position::new(x, y));
        self
    }

    /// Set the color (normalized; invalid values clear it).
    #[must_use]
    pub fn with_color(mut self, color: &str) -> Self {
        self.ui_metadata.color = normalize_color(color);
        self
    }

    /// Title derived from content (first heading, first line, or file stem).
    #[must_use]
    pub fn title(&self) -> String {
        crate::codec::derive_title(&self.content, &self.id)
    }

    /// Edge pointing at `target`, if any.
    #[must_use]
    pub fn edge_to(&self, target: &str) -> Option<&Edge> {
        self.outgoing_edges
            .iter()
            .find(|edge| edge.target_id == target)
    }

    /// Whether the node links to `target`.
    #[must_use]
    pub fn links_to(&self, target: &str) -> bool {
        self.edge_to(target).is_some()
    }

    /// Append an edge unless one to the same target exists.
    ///
    /// Returns `true` when the edge was added.
    pub fn push_edge(&mut self, edge: Edge) -> bool {
        if self.links_to(&edge.target_id) {
            return false;
        }
        self.outgoing_edges.push(edge);
        true
    }
}

/// Deduplicate edges by target id, keeping the first occurrence.
pub fn dedupe_edges(edges: impl IntoIterator<Item = Edge>) -> Vec<Edge> {
    let mut seen: BTreeSet<NodeId> = BTreeSet::new();
    edges
        .into_iter()
        .filter(|edge| seen.insert(edge.target_id.clone()))
        .collect()
}

/// Node map plus the derived incoming-edge index.
///
/// The incoming index is always the exact inverse of all outgoing edges whose
/// target exists in the graph. Dangling edges are kept on their source node
/// but contribute nothing to the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: BTreeMap<NodeId, GraphNode>,
    incoming: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from nodes; later duplicates replace earlier ones.
    pub fn from_nodes(nodes: impl IntoIterator<Item = GraphNode>) -> Self {
        let mut graph = Self::default();
        for node in nodes {
            graph.nodes.insert(node.id.clone(), node);
        }
        graph.rebuild_incoming_index();
        graph
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Whether a node exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Node ids in order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Ids of nodes with an edge to `id`, in id order.
    pub fn incomers<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        self.incoming
            .get(id)
            .into_iter()
            .flat_map(|sources| sources.iter().map(String::as_str))
    }

    /// Read-only view of the incoming index.
    #[must_use]
    pub fn incoming_index(&self) -> &BTreeMap<NodeId, BTreeSet<NodeId>> {
        &self.incoming
    }

    /// Edges whose target exists in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.incoming.values().map(BTreeSet::len).sum()
    }

    /// Insert or replace a node, keeping the incoming index exact.
    ///
    /// Returns the replaced node.
    pub fn upsert_node(&mut self, node: GraphNode) -> Option<GraphNode> {
        let id = node.id.clone();
        let previous = self.nodes.remove(&id);
        if let Some(prev) = &previous {
            self.unindex_outgoing(prev);
        }
        self.nodes.insert(id.clone(), node);
        if let Some(inserted) = self.nodes.get(&id) {
            let targets: Vec<NodeId> = inserted
                .outgoing_edges
                .iter()
                .map(|edge| edge.target_id.clone())
                .collect();
            for target in targets {
                if self.nodes.contains_key(&target) {
                    self.incoming.entry(target).or_default().insert(id.clone());
                }
            }
        }
        if previous.is_none() {
            // Dangling edges from existing nodes now resolve to the new node.
            let sources: BTreeSet<NodeId> = self
                .nodes
                .values()
                .filter(|candidate| candidate.links_to(&id))
                .map(|candidate| candidate.id.clone())
                .collect();
            if !sources.is_empty() {
                self.incoming.entry(id).or_default().extend(sources);
            }
        }
        previous
    }

    /// Remove a node. Edges pointing at it stay on their sources.
    pub fn remove_node(&mut self, id: &str) -> Option<GraphNode> {
        let removed = self.nodes.remove(id)?;
        self.unindex_outgoing(&removed);
        self.incoming.remove(id);
        Some(removed)
    }

    /// Recompute the incoming index from scratch.
    pub fn rebuild_incoming_index(&mut self) {
        let mut incoming: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for node in self.nodes.values() {
            for edge in &node.outgoing_edges {
                if self.nodes.contains_key(&edge.target_id) {
                    incoming
                        .entry(edge.target_id.clone())
                        .or_default()
                        .insert(node.id.clone());
                }
            }
        }
        self.incoming = incoming;
    }

    /// Consume the graph into its nodes.
    #[must_use]
    pub fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes.into_values().collect()
    }

    fn unindex_outgoing(&mut self, node: &GraphNode) {
        for edge in &node.outgoing_edges {
            if let Some(sources) = self.incoming.get_mut(&edge.target_id) {
                sources.remove(&node.id);
                if sources.is_empty() {
                    self.incoming.remove(&edge.target_id);
                }
            }
        }
    }
}
