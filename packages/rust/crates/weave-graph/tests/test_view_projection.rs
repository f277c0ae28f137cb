use weave_graph::{
    Edge, Graph, GraphNode, NodeDelta, Position, ViewGraph, ViewProjector, ViewSurface,
    apply_delta_to_view, edge_id, graph_as_initial_delta, graph_replacement_delta,
};

fn sample_graph() -> Graph {
    Graph::from_nodes([
        GraphNode::new("a.md", "# Alpha")
            .with_position(10.0, 10.0)
            .with_color("rebeccapurple")
            .with_edges([Edge::new("b.md", "next"), Edge::unlabeled("a.md")]),
        GraphNode::new("b.md", "# Beta").with_edges([Edge::unlabeled("later.md")]),
    ])
}

#[test]
fn test_initial_delta_builds_view_and_replay_is_idempotent() {
    let mut view = ViewGraph::new();
    let delta = graph_as_initial_delta(&sample_graph());

    let first = apply_delta_to_view(&mut view, &delta);
    assert_eq!(first.created, vec!["a.md".to_string(), "b.md".to_string()]);
    assert_eq!(first.edges_added, 1);
    // Self-loop excluded, dangling edge skipped.
    assert_eq!(first.edges_skipped, 1);
    assert_eq!(view.edge_count(), 1);
    let edge = view.edge(&edge_id("a.md", "b.md"));
    assert_eq!(edge.map(|e| e.label.as_str()), Some("next"));
    assert_eq!(view.node("b.md").map(|n| n.position), Some(Position::ORIGIN));

    let second = apply_delta_to_view(&mut view, &delta);
    assert_eq!(second.edges_added, 0);
    assert_eq!(second.updated.len(), 2);
    assert_eq!(view.edge_count(), 1);
    assert_eq!(view.batch_count(), 2);
}

#[test]
fn test_edge_waits_for_missing_target() {
    let mut view = ViewGraph::new();
    let mut projector = ViewProjector::new();
    projector.apply(&mut view, &graph_as_initial_delta(&sample_graph()));
    assert!(!view.has_edge("b.md->later.md"));

    let report = projector.apply(
        &mut view,
        &[NodeDelta::upsert(GraphNode::new("later.md", "# Later"), None)],
    );
    assert_eq!(report.created, vec!["later.md".to_string()]);
    assert_eq!(report.edges_added, 1);
    assert!(view.has_edge("b.md->later.md"));
}

#[test]
fn test_delete_removes_incident_edges_and_restores_on_return() {
    let mut view = ViewGraph::new();
    let mut projector = ViewProjector::new();
    let graph = sample_graph();
    projector.apply(&mut view, &graph_as_initial_delta(&graph));

    let report = projector.apply(&mut view, &[NodeDelta::delete("b.md", None)]);
    assert_eq!(report.deleted, vec!["b.md".to_string()]);
    assert_eq!(view.edge_count(), 0);

    let beta = graph.node("b.md").cloned().map(|n| NodeDelta::upsert(n, None));
    projector.apply(&mut view, &beta.into_iter().collect::<Vec<_>>());
    assert!(view.has_edge("a.md->b.md"));
}

#[test]
fn test_folder_switch_leaves_only_new_nodes() {
    let mut view = ViewGraph::new();
    let mut projector = ViewProjector::new();
    let old = sample_graph();
    projector.apply(&mut view, &graph_as_initial_delta(&old));

    let new = Graph::from_nodes([GraphNode::new("z.md", "# Zed")]);
    projector.apply(&mut view, &graph_replacement_delta(&old, &new));
    assert_eq!(
        view.nodes().map(|n| n.id.as_str()).collect::<Vec<_>>(),
        vec!["z.md"]
    );
    assert_eq!(view.edge_count(), 0);
}
