use std::collections::{BTreeSet, HashSet};

use super::tree::render_internal_tree;
use crate::delta::{GraphDelta, NodeDelta};
use crate::model::{Edge, Graph, GraphNode, NodeId, NodeUiMetadata, Position, dedupe_edges};

const DEFAULT_MERGE_HEADING: &str = "Merged Node";
const CONTENT_SEPARATOR: &str = "\n\n---\n\n";

/// Merge presentation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Title for the heading; `None` gives `Merged Node`.
    pub representative_title: Option<String>,
}

impl MergeOptions {
    /// Options with a representative title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            representative_title: Some(title.into()),
        }
    }
}

fn merge_heading(options: &MergeOptions, member_count: usize) -> String {
    let Some(title) = options
        .representative_title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
    else {
        return format!("# {DEFAULT_MERGE_HEADING}");
    };
    match member_count.saturating_sub(1) {
        0 => format!("# {title}"),
        1 => format!("# {title} + 1 other node"),
        others => format!("# {title} + {others} other nodes"),
    }
}

#[allow(clippy::cast_precision_loss)]
fn centroid(nodes: &[&GraphNode]) -> Option<Position> {
    let positions: Vec<Position> = nodes
        .iter()
        .filter_map(|node| node.ui_metadata.position)
        .collect();
    if positions.is_empty() {
        return None;
    }
    let count = positions.len() as f64;
    let (sum_x, sum_y) = positions
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Some(Position::new(sum_x / count, sum_y / count))
}

fn build_representative(
    nodes: &[&GraphNode],
    representative_id: &str,
    options: &MergeOptions,
) -> GraphNode {
    let member_ids: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();

    let mut sections = vec![merge_heading(options, nodes.len())];
    if let Some(tree) = render_internal_tree(nodes) {
        sections.push(tree);
    }
    let mut content = sections.join("\n\n");
    let bodies: Vec<&str> = nodes.iter().map(|node| node.content.as_str()).collect();
    if !bodies.is_empty() {
        content.push_str(CONTENT_SEPARATOR);
        content.push_str(&bodies.join(CONTENT_SEPARATOR));
    }

    let external = nodes.iter().flat_map(|node| {
        node.outgoing_edges.iter().filter(|edge| {
            !member_ids.contains(edge.target_id.as_str()) && edge.target_id != representative_id
        })
    });

    GraphNode {
        id: representative_id.to_string(),
        content,
        outgoing_edges: dedupe_edges(external.cloned()),
        ui_metadata: NodeUiMetadata {
            color: nodes.first().and_then(|node| node.ui_metadata.color.clone()),
            position: centroid(nodes),
            ..NodeUiMetadata::default()
        },
    }
}

/// Build the node that stands in for `nodes` after a merge.
///
/// Position is the mean of the inputs that have one. External edges (target
/// outside the set) are unioned, first label wins; internal edges survive only
/// as the ASCII tree in the content.
#[must_use]
pub fn create_representative_node(
    nodes: &[GraphNode],
    representative_id: &str,
    options: &MergeOptions,
) -> GraphNode {
    let refs: Vec<&GraphNode> = nodes.iter().collect();
    build_representative(&refs, representative_id, options)
}

/// Merge the nodes named by `ids` into `representative_id`.
///
/// Unknown ids are ignored; an empty set yields an empty delta, and so does a
/// `representative_id` naming an existing node outside the set, which would
/// otherwise be overwritten. The delta
/// upserts the representative, then rewrites every outside node that linked
/// into the set so it links to the representative instead, then deletes the
/// merged inputs.
#[must_use]
pub fn merge_nodes(
    graph: &Graph,
    ids: &[NodeId],
    representative_id: &str,
    options: &MergeOptions,
) -> GraphDelta {
    let mut seen: HashSet<&str> = HashSet::new();
    let members: Vec<&GraphNode> = ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| graph.node(id))
        .collect();
    if members.is_empty() {
        log::debug!("merge of unknown nodes {ids:?}: nothing to do");
        return GraphDelta::new();
    }
    let member_ids: HashSet<&str> = members.iter().map(|node| node.id.as_str()).collect();
    if graph.contains(representative_id) && !member_ids.contains(representative_id) {
        log::debug!("merge into existing non-member {representative_id}: nothing to do");
        return GraphDelta::new();
    }

    let representative = build_representative(&members, representative_id, options);
    let mut delta = vec![NodeDelta::upsert(
        representative,
        graph.node(representative_id).cloned(),
    )];

    let outside_incomers: BTreeSet<&str> = members
        .iter()
        .flat_map(|node| graph.incomers(&node.id))
        .filter(|id| !member_ids.contains(id) && *id != representative_id)
        .collect();
    for incomer_id in outside_incomers {
        let Some(incomer) = graph.node(incomer_id) else {
            continue;
        };
        let redirected = incomer.outgoing_edges.iter().map(|edge| {
            if member_ids.contains(edge.target_id.as_str()) {
                Edge::new(representative_id, edge.label.clone())
            } else {
                edge.clone()
            }
        });
        let mut updated = incomer.clone();
        updated.outgoing_edges = dedupe_edges(redirected);
        if updated != *incomer {
            delta.push(NodeDelta::upsert(updated, Some(incomer.clone())));
        }
    }

    delta.extend(
        members
            .iter()
            .filter(|node| node.id != representative_id)
            .map(|node| NodeDelta::delete(node.id.clone(), Some((*node).clone()))),
    );
    delta
}
