//! Delta algebra: the single channel through which the graph changes.

mod apply;
mod file_event;
mod load;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::codec::{LinkResolver, canonical_node};
use crate::model::{Graph, GraphNode, NodeId};

pub use apply::{apply_delta_in_place, apply_delta_to_graph};
pub use file_event::{VaultFileEvent, file_event_to_delta};
pub use load::{
    DEFAULT_EXCLUDED_DIR_NAMES, DEFAULT_MAX_FILES, LoadError, LoadOptions,
    load_graph_from_directory, load_graph_or_empty,
};

/// One operation of a graph delta.
///
/// Serialized internally tagged by `type`, matching the delta feed wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeDelta {
    /// Create or replace a node.
    #[serde(rename_all = "camelCase")]
    UpsertNode {
        /// New node value.
        node_to_upsert: GraphNode,
        /// Pre-image, used for change classification only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_node: Option<GraphNode>,
    },
    /// Remove a node.
    #[serde(rename_all = "camelCase")]
    DeleteNode {
        /// Id of the removed node.
        node_id: NodeId,
        /// Snapshot of the node before removal.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deleted_node: Option<GraphNode>,
    },
}

impl NodeDelta {
    /// Upsert operation.
    #[must_use]
    pub fn upsert(node: GraphNode, previous: Option<GraphNode>) -> Self {
        Self::UpsertNode {
            node_to_upsert: node,
            previous_node: previous,
        }
    }

    /// Delete operation.
    pub fn delete(node_id: impl Into<NodeId>, snapshot: Option<GraphNode>) -> Self {
        Self::DeleteNode {
            node_id: node_id.into(),
            deleted_node: snapshot,
        }
    }

    /// Id of the node this operation touches.
    #[must_use]
    pub fn node_id(&self) -> &str {
        match self {
            Self::UpsertNode { node_to_upsert, .. } => &node_to_upsert.id,
            Self::DeleteNode { node_id, .. } => node_id,
        }
    }

    /// Whether this is a delete.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::DeleteNode { .. })
    }
}

/// Ordered list of operations; consumers must not reorder them.
pub type GraphDelta = Vec<NodeDelta>;

/// Every node as an upsert without a previous node.
///
/// First load and incremental change share one code path downstream.
#[must_use]
pub fn graph_as_initial_delta(graph: &Graph) -> GraphDelta {
    graph
        .nodes()
        .map(|node| NodeDelta::upsert(node.clone(), None))
        .collect()
}

/// Delta that replaces `old` with `new` wholesale (folder switch).
///
/// Every old node is deleted before any new node is upserted, so a consumer
/// never holds a union of both vaults.
#[must_use]
pub fn graph_replacement_delta(old: &Graph, new: &Graph) -> GraphDelta {
    old.nodes()
        .map(|node| NodeDelta::delete(node.id.clone(), Some(node.clone())))
        .chain(new.nodes().map(|node| NodeDelta::upsert(node.clone(), None)))
        .collect()
}

/// Rewrite every upsert into the form it will have once written to disk.
///
/// Links resolve against the ids present after `delta` is applied to
/// `graph`. Deletes pass through unchanged.
#[must_use]
pub fn canonicalize_delta(graph: &Graph, delta: &[NodeDelta]) -> GraphDelta {
    let mut ids: BTreeSet<&str> = graph.node_ids().collect();
    for op in delta {
        match op {
            NodeDelta::UpsertNode { node_to_upsert, .. } => {
                ids.insert(node_to_upsert.id.as_str());
            }
            NodeDelta::DeleteNode { node_id, .. } => {
                ids.remove(node_id.as_str());
            }
        }
    }
    let resolver = LinkResolver::new(ids.iter().copied());
    delta
        .iter()
        .map(|op| match op {
            NodeDelta::UpsertNode {
                node_to_upsert,
                previous_node,
            } => NodeDelta::upsert(canonical_node(node_to_upsert, &resolver), previous_node.clone()),
            NodeDelta::DeleteNode { .. } => op.clone(),
        })
        .collect()
}
