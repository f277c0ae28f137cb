//! Bidirectional traversal and context windows.
//!
//! Reachability here follows outgoing edges and the incoming index alike,
//! which is the notion structural deletes are required to preserve.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::model::{Edge, Graph, GraphNode, NodeId, NodeUiMetadata};

const CONTEXT_EDGE_LABEL: &str = "context for";

fn neighbours<'a>(graph: &'a Graph, id: &str) -> impl Iterator<Item = &'a str> + use<'a> {
    let outgoing = graph
        .node(id)
        .into_iter()
        .flat_map(|node| node.outgoing_edges.iter().map(|edge| edge.target_id.as_str()))
        .filter(move |target| graph.contains(target));
    outgoing.chain(graph.incomers(id))
}

/// Every node reachable from `start` in either direction, `start` included.
///
/// Empty when `start` is not in the graph.
#[must_use]
pub fn bidirectional_reachable(graph: &Graph, start: &str) -> BTreeSet<NodeId> {
    context_window(graph, start, usize::MAX)
        .into_iter()
        .map(|(id, _)| id)
        .collect()
}

/// Nodes within `max_distance` hops of `start` in either direction.
///
/// Ordered by distance, then id; `start` comes first at distance 0.
#[must_use]
pub fn context_window(graph: &Graph, start: &str, max_distance: usize) -> Vec<(NodeId, usize)> {
    if !graph.contains(start) {
        return Vec::new();
    }
    let mut distances: BTreeMap<&str, usize> = BTreeMap::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    distances.insert(start, 0);
    queue.push_back((start, 0));
    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_distance {
            continue;
        }
        for next in neighbours(graph, current) {
            if !distances.contains_key(next) {
                distances.insert(next, depth + 1);
                queue.push_back((next, depth + 1));
            }
        }
    }
    let mut window: Vec<(NodeId, usize)> = distances
        .into_iter()
        .map(|(id, distance)| (id.to_string(), distance))
        .collect();
    window.sort_by(|left, right| left.1.cmp(&right.1).then_with(|| left.0.cmp(&right.0)));
    window
}

/// Synthesize a context node aggregating the window around `start`.
///
/// Returns `None` when `start` is not in the graph.
#[must_use]
pub fn build_context_node(
    graph: &Graph,
    start: &str,
    max_distance: usize,
    context_id: &str,
) -> Option<GraphNode> {
    let root = graph.node(start)?;
    let window = context_window(graph, start, max_distance);
    let mut sections = vec![format!("# Context: {}", root.title())];
    for (id, distance) in &window {
        let Some(node) = graph.node(id) else {
            continue;
        };
        sections.push(format!(
            "## {} (distance {distance})\n\n{}",
            node.title(),
            node.content.trim_end()
        ));
    }
    Some(GraphNode {
        id: context_id.to_string(),
        content: sections.join("\n\n"),
        outgoing_edges: vec![Edge::new(start, CONTEXT_EDGE_LABEL)],
        ui_metadata: NodeUiMetadata {
            is_context_node: true,
            contained_node_ids: Some(window.into_iter().map(|(id, _)| id).collect()),
            ..NodeUiMetadata::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Graph {
        Graph::from_nodes([
            GraphNode::new("a.md", "# A").with_edges([Edge::unlabeled("b.md")]),
            GraphNode::new("b.md", "# B"),
            GraphNode::new("c.md", "# C").with_edges([Edge::unlabeled("b.md")]),
            GraphNode::new("d.md", "# D"),
        ])
    }

    #[test]
    fn test_reachability_follows_both_directions() {
        let reachable = bidirectional_reachable(&chain(), "a.md");
        assert_eq!(
            reachable.into_iter().collect::<Vec<_>>(),
            vec!["a.md", "b.md", "c.md"]
        );
    }

    #[test]
    fn test_context_window_is_distance_ordered() {
        let window = context_window(&chain(), "a.md", 1);
        assert_eq!(window, vec![("a.md".to_string(), 0), ("b.md".to_string(), 1)]);
    }

    #[test]
    fn test_context_node_marks_members() {
        let node = build_context_node(&chain(), "b.md", 1, "ctx.md");
        let node = node.as_ref();
        assert_eq!(
            node.and_then(|n| n.ui_metadata.contained_node_ids.clone()),
            Some(vec!["b.md".to_string(), "a.md".to_string(), "c.md".to_string()])
        );
        assert!(node.is_some_and(|n| n.ui_metadata.is_context_node));
        assert!(build_context_node(&chain(), "zz.md", 1, "ctx.md").is_none());
    }
}
