//! Tests for the vault watcher.

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use weave_io::{FileEvent, WatcherConfig, start_file_watcher};

const WAIT: Duration = Duration::from_secs(5);

async fn wait_for<F>(rx: &mut mpsc::Receiver<FileEvent>, mut pred: F) -> Option<FileEvent>
where
    F: FnMut(&FileEvent) -> bool,
{
    timeout(WAIT, async {
        while let Some(event) = rx.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

fn is_for(event: &FileEvent, name: &str) -> bool {
    event
        .path()
        .and_then(Path::file_name)
        .is_some_and(|file| file == name)
}

/// Events for `name` until the channel stays quiet for `quiet`.
async fn collect_for(
    rx: &mut mpsc::Receiver<FileEvent>,
    name: &str,
    quiet: Duration,
) -> Vec<FileEvent> {
    let mut seen = Vec::new();
    while let Ok(Some(event)) = timeout(quiet, rx.recv()).await {
        if is_for(&event, name) {
            seen.push(event);
        }
    }
    seen
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_modify_delete_are_reported() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let root = dir.path().canonicalize()?;
    let (tx, mut rx) = mpsc::channel(64);
    let handle = start_file_watcher(
        WatcherConfig::for_root(&root).with_stability_window_ms(50),
        tx,
    )?;
    assert!(handle.is_running());

    let note = root.join("fresh.md");
    tokio::fs::write(&note, "# Fresh").await?;
    let seen = wait_for(&mut rx, |e| {
        is_for(e, "fresh.md") && matches!(e, FileEvent::Created { .. } | FileEvent::Modified { .. })
    })
    .await;
    assert!(seen.is_some(), "no event for created note");

    for i in 0..5 {
        tokio::fs::write(&note, format!("# Fresh\n\nrev {i}")).await?;
    }
    let modified = wait_for(&mut rx, |e| {
        is_for(e, "fresh.md") && matches!(e, FileEvent::Modified { .. })
    })
    .await;
    assert!(modified.is_some(), "no settled modify");

    tokio::fs::remove_file(&note).await?;
    let deleted = wait_for(&mut rx, |e| {
        is_for(e, "fresh.md") && matches!(e, FileEvent::Deleted { .. })
    })
    .await;
    assert!(deleted.is_some(), "no delete event");

    handle.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_burst_settles_into_one_modify() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let root = dir.path().canonicalize()?;
    let note = root.join("busy.md");
    tokio::fs::write(&note, "# Busy").await?;

    let (tx, mut rx) = mpsc::channel(64);
    let handle = start_file_watcher(
        WatcherConfig::for_root(&root).with_stability_window_ms(300),
        tx,
    )?;

    for i in 0..5 {
        tokio::fs::write(&note, format!("# Busy\n\nrev {i}")).await?;
    }
    let events = collect_for(&mut rx, "busy.md", Duration::from_secs(1)).await;
    assert_eq!(events, vec![FileEvent::Modified { path: note.clone() }]);

    handle.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hidden_directories_are_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let root = dir.path().canonicalize()?;
    tokio::fs::create_dir_all(root.join(".obsidian")).await?;
    let (tx, mut rx) = mpsc::channel(64);
    let handle = start_file_watcher(WatcherConfig::for_root(&root), tx)?;

    tokio::fs::write(root.join(".obsidian").join("workspace.md"), "x").await?;
    tokio::fs::write(root.join("visible.md"), "y").await?;

    let first = wait_for(&mut rx, |e| !matches!(e, FileEvent::Error { .. })).await;
    let first = first.ok_or("no event observed")?;
    assert!(is_for(&first, "visible.md"), "unexpected event {first:?}");

    handle.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_closes_event_channel() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let (tx, mut rx) = mpsc::channel(8);
    let handle = start_file_watcher(WatcherConfig::for_root(dir.path()), tx)?;
    handle.stop().await;
    let closed = timeout(WAIT, async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_missing_root_fails_to_start() {
    let (tx, _rx) = mpsc::channel(1);
    let result = start_file_watcher(WatcherConfig::for_root("/definitely/not/a/vault"), tx);
    assert!(result.is_err());
}
