use super::NodeDelta;
use crate::model::Graph;

/// Apply operations in order to `graph`.
///
/// Deleting an unknown id is a no-op and upserting replaces in place, so
/// replaying the same delta leaves the graph unchanged.
pub fn apply_delta_in_place(graph: &mut Graph, delta: &[NodeDelta]) {
    for op in delta {
        match op {
            NodeDelta::UpsertNode { node_to_upsert, .. } => {
                graph.upsert_node(node_to_upsert.clone());
            }
            NodeDelta::DeleteNode { node_id, .. } => {
                if graph.remove_node(node_id).is_none() {
                    log::trace!("delete of unknown node {node_id} ignored");
                }
            }
        }
    }
}

/// Pure reducer: returns a new graph with `delta` applied.
#[must_use]
pub fn apply_delta_to_graph(graph: &Graph, delta: &[NodeDelta]) -> Graph {
    let mut next = graph.clone();
    apply_delta_in_place(&mut next, delta);
    next
}
