use std::collections::BTreeSet;
use weave_graph::{
    Edge, Graph, GraphNode, MergeOptions, NodeDelta, Position, apply_delta_to_graph,
    bidirectional_reachable, create_representative_node, delete_node_maintaining_transitive_edges,
    merge_nodes,
};

fn node(id: &str, edges: &[(&str, &str)]) -> GraphNode {
    GraphNode::new(id, format!("# {id}"))
        .with_edges(edges.iter().map(|(target, label)| Edge::new(*target, *label)))
}

/// Small fixed graphs covering chains, stars, cycles, fan-in and self-loops.
fn fixtures() -> Vec<Graph> {
    vec![
        Graph::from_nodes([
            node("a.md", &[("x.md", "")]),
            node("x.md", &[("b.md", ""), ("c.md", "")]),
            node("b.md", &[]),
            node("c.md", &[("d.md", "")]),
            node("d.md", &[]),
        ]),
        Graph::from_nodes([
            node("a.md", &[("x.md", "la")]),
            node("b.md", &[("x.md", "lb")]),
            node("c.md", &[("x.md", "lc")]),
            node("x.md", &[("x.md", "self")]),
        ]),
        Graph::from_nodes([
            node("a.md", &[("x.md", "")]),
            node("x.md", &[("a.md", ""), ("b.md", "")]),
            node("b.md", &[("y.md", "")]),
            node("y.md", &[("x.md", "")]),
            node("lonely.md", &[]),
        ]),
        Graph::from_nodes([
            node("p.md", &[("x.md", "part of"), ("q.md", "")]),
            node("q.md", &[("x.md", "")]),
            node("x.md", &[("r.md", ""), ("ghost.md", "")]),
            node("r.md", &[("s.md", "")]),
            node("s.md", &[]),
        ]),
    ]
}

#[test]
fn test_delete_preserves_bidirectional_reachability() {
    for graph in fixtures() {
        let candidates: Vec<String> = graph
            .node_ids()
            .filter(|id| graph.incomers(id).any(|incomer| incomer != *id))
            .map(str::to_string)
            .collect();
        for removed in candidates {
            let before: Vec<(String, BTreeSet<String>)> = graph
                .node_ids()
                .filter(|id| *id != removed)
                .map(|id| {
                    let mut reach = bidirectional_reachable(&graph, id);
                    reach.remove(&removed);
                    (id.to_string(), reach)
                })
                .collect();

            let delta = delete_node_maintaining_transitive_edges(&graph, &removed);
            let after = apply_delta_to_graph(&graph, &delta);
            assert!(!after.contains(&removed));

            for (id, reach) in before {
                let now = bidirectional_reachable(&after, &id);
                assert_eq!(now, reach, "reachability from {id} changed after deleting {removed}");
            }
        }
    }
}

#[test]
fn test_delete_delta_orders_delete_first_and_incomers_by_id() {
    let graphs = fixtures();
    let delta = delete_node_maintaining_transitive_edges(&graphs[1], "x.md");
    let ids: Vec<(bool, &str)> = delta.iter().map(|op| (op.is_delete(), op.node_id())).collect();
    assert_eq!(
        ids,
        vec![(true, "x.md"), (false, "a.md"), (false, "b.md"), (false, "c.md")]
    );
    for op in &delta[1..] {
        let NodeDelta::UpsertNode { previous_node, .. } = op else {
            panic!("expected upsert");
        };
        assert!(previous_node.is_some());
    }
}

#[test]
fn test_merge_centroid_and_edges() {
    let a = GraphNode::new("a.md", "# A")
        .with_position(0.0, 0.0)
        .with_color("red")
        .with_edges([
            Edge::new("b.md", "internal"),
            Edge::new("out.md", "first"),
        ]);
    let b = GraphNode::new("b.md", "# B")
        .with_position(100.0, 200.0)
        .with_edges([Edge::new("out.md", "second"), Edge::new("other.md", "")]);
    let merged = create_representative_node(&[a, b], "merged.md", &MergeOptions::titled("A"));

    assert_eq!(merged.ui_metadata.position, Some(Position::new(50.0, 100.0)));
    assert_eq!(merged.ui_metadata.color.as_deref(), Some("red"));
    assert_eq!(
        merged.outgoing_edges,
        vec![Edge::new("out.md", "first"), Edge::unlabeled("other.md")]
    );
    assert!(merged.content.starts_with("# A + 1 other node\n\n```\nA\n└── B\n```"));
    assert!(!merged.ui_metadata.is_context_node);
    assert_eq!(merged.ui_metadata.contained_node_ids, None);
}

#[test]
fn test_merge_without_positions_has_no_position() {
    let merged = create_representative_node(
        &[GraphNode::new("a.md", "a"), GraphNode::new("b.md", "b")],
        "m.md",
        &MergeOptions::default(),
    );
    assert_eq!(merged.ui_metadata.position, None);
    assert!(merged.content.starts_with("# Merged Node\n\n---\n\n"));
}

#[test]
fn test_merge_nodes_redirects_incomers_and_deletes_members() {
    let graph = Graph::from_nodes([
        node("a.md", &[("b.md", "")]),
        node("b.md", &[("c.md", "")]),
        node("c.md", &[]),
        node("ext.md", &[("a.md", "refs"), ("b.md", "also")]),
    ]);
    let ids = vec!["a.md".to_string(), "b.md".to_string(), "nope.md".to_string()];
    let delta = merge_nodes(&graph, &ids, "a.md", &MergeOptions::default());
    let shape: Vec<(bool, &str)> = delta.iter().map(|op| (op.is_delete(), op.node_id())).collect();
    assert_eq!(shape, vec![(false, "a.md"), (false, "ext.md"), (true, "b.md")]);

    let after = apply_delta_to_graph(&graph, &delta);
    assert_eq!(after.len(), 3);
    let ext = after.node("ext.md").map(|n| n.outgoing_edges.clone());
    assert_eq!(ext, Some(vec![Edge::new("a.md", "refs")]));
    assert_eq!(after.incomers("c.md").collect::<Vec<_>>(), vec!["a.md"]);

    assert!(merge_nodes(&graph, &["nope.md".to_string()], "m.md", &MergeOptions::default()).is_empty());
}

#[test]
fn test_merge_refuses_to_overwrite_outside_node() {
    let graph = Graph::from_nodes([
        node("a.md", &[]),
        node("b.md", &[]),
        node("keep.md", &[("a.md", "")]),
    ]);
    let ids = vec!["a.md".to_string(), "b.md".to_string()];
    assert!(merge_nodes(&graph, &ids, "keep.md", &MergeOptions::default()).is_empty());
    assert!(!merge_nodes(&graph, &ids, "fresh.md", &MergeOptions::default()).is_empty());
}
