use std::collections::BTreeMap;

use crate::delta::{GraphDelta, NodeDelta};
use crate::model::{Edge, Graph, GraphNode, NodeId};

/// Delete `node_id` without changing bidirectional reachability among its
/// neighbours.
///
/// Every incomer `I` gains edges to each child of the removed node and to
/// every other incomer, all carrying the label `I` used on its edge to the
/// removed node. Edges `I` already has are left alone. `I`'s edge to the
/// removed node stays as a dangling edge.
///
/// The delta is the delete first, then one upsert per incomer that actually
/// gained an edge, in id order. A missing node yields an empty delta.
#[must_use]
pub fn delete_node_maintaining_transitive_edges(graph: &Graph, node_id: &str) -> GraphDelta {
    let Some(removed) = graph.node(node_id) else {
        log::debug!("delete of unknown node {node_id}: nothing to do");
        return GraphDelta::new();
    };

    // Children that are not in the graph would only spread dangling links.
    let children: Vec<&str> = removed
        .outgoing_edges
        .iter()
        .map(|edge| edge.target_id.as_str())
        .filter(|target| *target != node_id && graph.contains(target))
        .collect();
    let incomers: Vec<&str> = graph
        .incomers(node_id)
        .filter(|incomer| *incomer != node_id)
        .collect();

    let mut rewritten: BTreeMap<NodeId, GraphNode> = BTreeMap::new();
    for incomer_id in &incomers {
        let Some(incomer) = graph.node(incomer_id) else {
            continue;
        };
        let label = incomer
            .edge_to(node_id)
            .map(|edge| edge.label.clone())
            .unwrap_or_default();
        let mut updated = incomer.clone();
        let mut gained = false;
        let targets = children
            .iter()
            .chain(incomers.iter())
            .filter(|target| *target != incomer_id);
        for target in targets {
            gained |= updated.push_edge(Edge::new(*target, label.clone()));
        }
        if gained {
            rewritten.insert((*incomer_id).to_string(), updated);
        }
    }

    let mut delta = vec![NodeDelta::delete(node_id, Some(removed.clone()))];
    delta.extend(rewritten.into_values().map(|node| {
        let previous = graph.node(&node.id).cloned();
        NodeDelta::upsert(node, previous)
    }));
    delta
}
