//! End-to-end tests for the watch session.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use weave_events::{EventBus, topics};
use weave_graph::{GraphNode, MergeOptions, NodeDelta, ViewGraph, edge_id};
use weave_vault::{EngineSettings, ViewSink, WatchSession};

fn fast_engine() -> EngineSettings {
    EngineSettings {
        stability_window_ms: 20,
        read_retry_backoff_ms: 10,
        ..EngineSettings::default()
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn small_vault() -> Result<TempDir, Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    write_file(&tmp.path().join("a.md"), "# A\n\n[[b]]\n")?;
    write_file(&tmp.path().join("b.md"), "# B\n\n[[c]]\n")?;
    write_file(&tmp.path().join("c.md"), "# C\n")?;
    Ok(tmp)
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn session_with_view() -> (WatchSession, Arc<Mutex<ViewGraph>>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new(256));
    let session = WatchSession::with_bus(fast_engine(), Arc::clone(&bus));
    let view = Arc::new(Mutex::new(ViewGraph::new()));
    session.add_sink(ViewSink::new(Arc::clone(&view)));
    (session, view, bus)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_loads_vault_and_projects_view() -> Result<(), Box<dyn std::error::Error>> {
    let vault = small_vault()?;
    let (session, view, bus) = session_with_view();
    let mut events = bus.subscribe();

    let response = session.start_watching(vault.path()).await;
    assert!(response.success, "{response:?}");
    assert_eq!(response.directory, Some(vault.path().canonicalize()?));

    let status = session.watch_status().await;
    assert!(status.is_watching);
    assert_eq!(session.store().len(), 3);
    {
        let view = view.lock().unwrap();
        assert_eq!(view.node_count(), 3);
        assert_eq!(view.edge_count(), 2);
    }

    let mut topics_seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        topics_seen.push(event.topic);
    }
    assert_eq!(topics_seen, vec![topics::GRAPH_DELTA, topics::WATCH_STARTED]);

    assert!(session.stop_watching().await.success);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_file_reaches_store_and_view() -> Result<(), Box<dyn std::error::Error>> {
    let vault = small_vault()?;
    let (session, view, _bus) = session_with_view();
    assert!(session.start_watching(vault.path()).await.success);

    write_file(&vault.path().join("notes/d.md"), "# D\n\n[[a]]\n")?;
    let arrived = eventually(|| {
        session
            .store()
            .with_graph(|g| g.node("notes/d.md").is_some_and(|n| n.links_to("a.md")))
    })
    .await;
    assert!(arrived, "created note never reached the store");
    let projected = eventually(|| {
        view.lock()
            .unwrap()
            .edge(&edge_id("notes/d.md", "a.md"))
            .is_some()
    })
    .await;
    assert!(projected, "edge never reached the view");
    assert_eq!(session.recent_nodes().first().map(String::as_str), Some("notes/d.md"));

    fs::remove_file(vault.path().join("notes/d.md"))?;
    let gone = eventually(|| session.store().with_graph(|g| !g.contains("notes/d.md"))).await;
    assert!(gone, "deleted note still in the store");
    assert!(!session.recent_nodes().iter().any(|id| id == "notes/d.md"));

    session.stop_watching().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_removed_directory_drops_its_notes() -> Result<(), Box<dyn std::error::Error>> {
    let vault = small_vault()?;
    write_file(&vault.path().join("sub/x.md"), "# X\n")?;
    write_file(&vault.path().join("sub/deep/y.md"), "# Y\n")?;
    let (session, _view, _bus) = session_with_view();
    assert!(session.start_watching(vault.path()).await.success);
    assert_eq!(session.store().len(), 5);

    fs::remove_dir_all(vault.path().join("sub"))?;
    let dropped = eventually(|| session.store().len() == 3).await;
    assert!(dropped, "notes under the removed folder remain");

    session.stop_watching().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_user_delete_is_persisted_and_echo_absorbed() -> Result<(), Box<dyn std::error::Error>> {
    let vault = small_vault()?;
    let (session, view, _bus) = session_with_view();
    assert!(session.start_watching(vault.path()).await.success);

    let delta = session.delete_node("b.md")?;
    assert!(matches!(&delta[0], NodeDelta::DeleteNode { node_id, .. } if node_id == "b.md"));
    assert!(!vault.path().join("b.md").exists());

    // a gained the transitive edge to c, on disk and in the view.
    let a_text = fs::read_to_string(vault.path().join("a.md"))?;
    assert!(a_text.contains("[[c.md]]") || a_text.contains("[[c]]"), "{a_text}");
    assert!(view.lock().unwrap().edge(&edge_id("a.md", "c.md")).is_some());

    let expected = session.graph();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(session.graph(), expected, "watcher echo changed the graph");

    session.stop_watching().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_user_merge_writes_representative() -> Result<(), Box<dyn std::error::Error>> {
    let vault = small_vault()?;
    let (session, _view, _bus) = session_with_view();
    assert!(session.start_watching(vault.path()).await.success);

    let ids = vec!["b.md".to_string(), "c.md".to_string()];
    let delta = session.merge_nodes(&ids, "bc.md", &MergeOptions::titled("BC"))?;
    assert!(!delta.is_empty());
    let merged = fs::read_to_string(vault.path().join("bc.md"))?;
    assert!(merged.contains("# BC + 1 other node"), "{merged}");
    assert!(!vault.path().join("b.md").exists());
    assert!(!vault.path().join("c.md").exists());
    assert!(session.graph().node("a.md").is_some_and(|n| n.links_to("bc.md")));

    session.stop_watching().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_user_upsert_updates_store_first() -> Result<(), Box<dyn std::error::Error>> {
    let vault = small_vault()?;
    let (session, _view, _bus) = session_with_view();
    assert!(session.start_watching(vault.path()).await.success);

    let previous = session.graph().node("c.md").cloned();
    let edited = GraphNode::new("c.md", "# C\n\nNow with more words.\n");
    let report = session.apply_user_delta(&[NodeDelta::upsert(edited.clone(), previous)])?;
    assert_eq!(report.written, vec!["c.md".to_string()]);
    assert_eq!(session.graph().node("c.md"), Some(&edited));

    let replay = session.apply_user_delta(&[NodeDelta::upsert(edited, None)])?;
    assert_eq!(replay.unchanged, vec!["c.md".to_string()]);

    session.stop_watching().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_write_restores_store_from_disk() -> Result<(), Box<dyn std::error::Error>> {
    let vault = small_vault()?;
    // A plain file where a folder would have to be created.
    write_file(&vault.path().join("blocker"), "not a folder")?;
    let (session, view, _bus) = session_with_view();
    assert!(session.start_watching(vault.path()).await.success);

    let previous = session.graph().node("c.md").cloned();
    let edited = GraphNode::new("c.md", "# C\n\nWritten before the failure.\n");
    let result = session.apply_user_delta(&[
        NodeDelta::upsert(edited.clone(), previous),
        NodeDelta::upsert(GraphNode::new("blocker/x.md", "# X\n"), None),
    ]);
    assert!(result.is_err());
    assert!(!vault.path().join("blocker/x.md").exists());

    let graph = session.graph();
    assert!(!graph.contains("blocker/x.md"), "store kept a note missing on disk");
    assert_eq!(graph.node("c.md"), Some(&edited));
    {
        let view = view.lock().unwrap();
        assert!(view.node("blocker/x.md").is_none());
        assert_eq!(view.node_count(), 3);
    }

    session.stop_watching().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_folder_switch_replaces_graph_and_view() -> Result<(), Box<dyn std::error::Error>> {
    let first = small_vault()?;
    let second = TempDir::new()?;
    write_file(&second.path().join("solo.md"), "# Solo\n")?;

    let (session, view, _bus) = session_with_view();
    assert!(session.start_watching(first.path()).await.success);
    let response = session.start_watching(second.path()).await;
    assert!(response.success);

    assert_eq!(session.store().len(), 1);
    assert_eq!(session.store().watched_directory(), Some(second.path().canonicalize()?));
    {
        let view = view.lock().unwrap();
        assert_eq!(view.node_count(), 1);
        assert_eq!(view.edge_count(), 0);
    }

    // The old vault is no longer observed.
    write_file(&first.path().join("late.md"), "# Late\n")?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!session.store().with_graph(|g| g.contains("late.md")));

    session.stop_watching().await;
    Ok(())
}

#[tokio::test]
async fn test_failed_start_leaves_empty_graph() -> Result<(), Box<dyn std::error::Error>> {
    let vault = small_vault()?;
    let (session, view, _bus) = session_with_view();
    assert!(session.start_watching(vault.path()).await.success);

    let response = session.start_watching(vault.path().join("missing")).await;
    assert!(!response.success);
    assert!(response.error.is_some());
    assert!(session.store().is_empty());
    assert_eq!(view.lock().unwrap().node_count(), 0);
    assert!(!session.watch_status().await.is_watching);

    let stop = session.stop_watching().await;
    assert!(!stop.success);
    Ok(())
}

#[tokio::test]
async fn test_too_many_files_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let vault = small_vault()?;
    let engine = EngineSettings {
        max_files: 2,
        ..fast_engine()
    };
    let session = WatchSession::with_bus(engine, Arc::new(EventBus::new(16)));
    let response = session.start_watching(vault.path()).await;
    assert!(!response.success);
    assert!(response.error.unwrap_or_default().contains("limit of 2"));
    assert!(session.store().is_empty());
    Ok(())
}

#[test]
fn test_status_serializes_camel_case() -> Result<(), Box<dyn std::error::Error>> {
    let status = weave_vault::WatchStatus {
        is_watching: false,
        directory: None,
    };
    assert_eq!(serde_json::to_string(&status)?, r#"{"isWatching":false}"#);
    Ok(())
}
