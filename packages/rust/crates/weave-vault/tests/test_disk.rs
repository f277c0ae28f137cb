//! Tests for writing deltas back to the vault.

use std::fs;

use tempfile::TempDir;
use weave_graph::{
    GraphNode, LoadOptions, NodeDelta, delete_node_maintaining_transitive_edges,
    load_graph_from_directory,
};
use weave_vault::apply_delta_to_disk;

#[test]
fn test_upsert_creates_nested_file() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let node = GraphNode::new("deep/new.md", "# New\n").with_position(10.0, 20.0);
    let report = apply_delta_to_disk(tmp.path(), &[NodeDelta::upsert(node, None)])?;
    assert_eq!(report.written, vec!["deep/new.md".to_string()]);
    let text = fs::read_to_string(tmp.path().join("deep/new.md"))?;
    assert!(text.starts_with("---\n"));
    assert!(text.ends_with("# New\n"));
    Ok(())
}

#[test]
fn test_delete_of_missing_file_is_quiet() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let report = apply_delta_to_disk(tmp.path(), &[NodeDelta::delete("ghost.md", None)])?;
    assert!(report.removed.is_empty());
    Ok(())
}

#[test]
fn test_escaping_ids_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let inner = tmp.path().join("vault");
    fs::create_dir_all(&inner)?;
    let node = GraphNode::new("../evil.md", "x");
    let report = apply_delta_to_disk(&inner, &[NodeDelta::upsert(node, None)])?;
    assert_eq!(report.rejected, vec!["../evil.md".to_string()]);
    assert!(!tmp.path().join("evil.md").exists());
    Ok(())
}

#[test]
fn test_structural_delete_round_trips_through_disk() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    fs::write(tmp.path().join("a.md"), "# A\n\n[[b]]\n")?;
    fs::write(tmp.path().join("b.md"), "# B\n\n[[c]]\n")?;
    fs::write(tmp.path().join("c.md"), "# C\n")?;

    let graph = load_graph_from_directory(tmp.path(), &LoadOptions::default())?;
    let delta = delete_node_maintaining_transitive_edges(&graph, "b.md");
    apply_delta_to_disk(tmp.path(), &delta)?;

    let reloaded = load_graph_from_directory(tmp.path(), &LoadOptions::default())?;
    assert!(!reloaded.contains("b.md"));
    assert!(reloaded.node("a.md").is_some_and(|n| n.links_to("c.md")));
    // Reloading what was written matches the in-memory result.
    let expected = weave_graph::apply_delta_to_graph(&graph, &delta);
    assert_eq!(
        reloaded.node("a.md").map(|n| &n.outgoing_edges),
        expected.node("a.md").map(|n| &n.outgoing_edges)
    );

    // Second application changes nothing on disk.
    let again = apply_delta_to_disk(tmp.path(), &delta)?;
    assert!(again.written.is_empty());
    Ok(())
}

#[test]
fn test_binary_or_larger_file_is_overwritten() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    fs::write(tmp.path().join("bin.md"), b"# B\n\0\0\0")?;
    fs::write(tmp.path().join("big.md"), "# Big\n".repeat(100))?;
    fs::write(tmp.path().join("same.md"), "# Same\n")?;

    let delta = [
        NodeDelta::upsert(GraphNode::new("bin.md", "# B\n"), None),
        NodeDelta::upsert(GraphNode::new("big.md", "# Big\n"), None),
        NodeDelta::upsert(GraphNode::new("same.md", "# Same\n"), None),
    ];
    let report = apply_delta_to_disk(tmp.path(), &delta)?;
    assert_eq!(report.written, vec!["bin.md".to_string(), "big.md".to_string()]);
    assert_eq!(report.unchanged, vec!["same.md".to_string()]);
    assert_eq!(fs::read_to_string(tmp.path().join("big.md"))?, "# Big\n");
    Ok(())
}
