use super::{GraphDelta, NodeDelta};
use crate::codec::{LinkResolver, file_stem, parse_markdown, placeholder_targets};
use crate::model::{Graph, GraphNode, NodeId, dedupe_edges};

/// Filesystem change for one note, with the text already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultFileEvent {
    /// A note appeared.
    Added {
        /// Node id of the note.
        id: NodeId,
        /// Full file text.
        content: String,
    },
    /// A note was rewritten.
    Changed {
        /// Node id of the note.
        id: NodeId,
        /// Full file text.
        content: String,
    },
    /// A note disappeared.
    Deleted {
        /// Node id of the note.
        id: NodeId,
    },
}

impl VaultFileEvent {
    /// Node id the event refers to.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Added { id, .. } | Self::Changed { id, .. } | Self::Deleted { id } => id,
        }
    }
}

/// Diff one file event against the current graph.
///
/// An added or changed note whose parsed form equals the stored node yields
/// an empty delta; this is how the echo of our own disk writes is absorbed.
///
/// A note new to the graph may also become the resolution of links already
/// stored in other nodes (a relative path or a file-stem match). Those nodes
/// are re-linked in the same delta, so the result matches a fresh load.
#[must_use]
pub fn file_event_to_delta(event: &VaultFileEvent, graph: &Graph) -> GraphDelta {
    match event {
        VaultFileEvent::Added { id, content } | VaultFileEvent::Changed { id, content } => {
            let before = LinkResolver::new(graph.node_ids());
            let mut resolver = before.clone();
            resolver.insert(id);
            let node = parse_markdown(id, content).into_node(&resolver);
            let Some(previous) = graph.node(id).cloned() else {
                let mut delta = vec![NodeDelta::upsert(node, None)];
                delta.extend(relink_existing(graph, id, &before, &resolver));
                return delta;
            };
            if previous == node {
                log::debug!("{id} unchanged after re-parse; no delta");
                return GraphDelta::new();
            }
            vec![NodeDelta::upsert(node, Some(previous))]
        }
        VaultFileEvent::Deleted { id } => {
            vec![NodeDelta::delete(id.clone(), graph.node(id).cloned())]
        }
    }
}

/// Upserts for stored nodes whose links now resolve to `added`.
///
/// Only a link whose file stem matches `added` can change resolution when
/// that one id joins the resolver.
fn relink_existing(
    graph: &Graph,
    added: &str,
    before: &LinkResolver,
    after: &LinkResolver,
) -> GraphDelta {
    let added_stem = file_stem(added);
    graph
        .nodes()
        .filter_map(|node| {
            let mut edges = node.outgoing_edges.clone();
            let mut changed = false;
            for raw in placeholder_targets(&node.content) {
                if !file_stem(&raw).eq_ignore_ascii_case(added_stem) {
                    continue;
                }
                let old = before.resolve(&raw, &node.id);
                let new = after.resolve(&raw, &node.id);
                if old == new {
                    continue;
                }
                if let Some(edge) = edges.iter_mut().find(|edge| edge.target_id == old) {
                    edge.target_id = new;
                    changed = true;
                }
            }
            if !changed {
                return None;
            }
            log::debug!("{} re-linked to new note {added}", node.id);
            let relinked = GraphNode {
                outgoing_edges: dedupe_edges(edges),
                ..node.clone()
            };
            Some(NodeDelta::upsert(relinked, Some(node.clone())))
        })
        .collect()
}
