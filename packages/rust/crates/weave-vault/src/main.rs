//! weave CLI: load, watch and restructure a markdown vault as a graph.
//!
//! The vault comes from `--root`, else from the last vault in settings.
//!
//! Logging: set `RUST_LOG=weave_vault=debug` (or `warn`, `trace`) to see
//! engine logs on stderr. Deltas and results go to stdout.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;
use weave_events::{WeaveEvent, topics};
use weave_graph::{
    Graph, GraphDelta, GraphNode, MergeOptions, NodeDelta, build_context_node, canonicalize_delta,
    delete_node_maintaining_transitive_edges, graph_as_initial_delta, load_graph_from_directory,
    merge_nodes,
};
use weave_vault::{
    DeltaOrigin, VaultSettings, WatchSession, apply_delta_to_disk, load_settings, save_settings,
    set_config_home_override, settings_path,
};

use crate::cli::{Cli, Command, OutputFormat};

// `weave` is this binary's own target.
const DEFAULT_LOG_FILTER: &str = "weave=info,weave_vault=info,weave_io=info,weave_graph=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(conf_home) = cli.conf_home.clone() {
        set_config_home_override(conf_home);
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut settings = load_settings();
    let output = cli.output;
    match cli.command {
        Command::Load { delta } => {
            let root = resolve_root(cli.root, &settings)?;
            run_load(&root, &settings, delta, output)
        }
        Command::Watch => {
            let root = resolve_root(cli.root, &settings)?;
            run_watch(&root, &mut settings, output).await
        }
        Command::Delete { id } => {
            let root = resolve_root(cli.root, &settings)?;
            run_structural(&root, &settings, output, |graph| {
                if !graph.contains(&id) {
                    bail!("unknown node '{id}'");
                }
                Ok(delete_node_maintaining_transitive_edges(graph, &id))
            })
        }
        Command::Merge { ids, into, title } => {
            let root = resolve_root(cli.root, &settings)?;
            let options = title.map(MergeOptions::titled).unwrap_or_default();
            run_structural(&root, &settings, output, |graph| {
                Ok(merge_nodes(graph, &ids, &into, &options))
            })
        }
        Command::Context { id, max_distance } => {
            let root = resolve_root(cli.root, &settings)?;
            run_context(&root, &settings, &id, max_distance, output)
        }
        Command::Settings { show_all } => run_settings(cli.root, &mut settings, show_all, output),
    }
}

fn resolve_root(explicit: Option<PathBuf>, settings: &VaultSettings) -> anyhow::Result<PathBuf> {
    let root = explicit
        .or_else(|| settings.last_directory.clone())
        .context("no vault given: pass --root or open a vault with `weave watch` first")?;
    root.canonicalize()
        .with_context(|| format!("vault directory {} is not accessible", root.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe_op(op: &NodeDelta) -> String {
    match op {
        NodeDelta::UpsertNode {
            node_to_upsert,
            previous_node,
        } => {
            let marker = if previous_node.is_some() { "~" } else { "+" };
            format!(
                "{marker} {} ({} edges)",
                node_to_upsert.id,
                node_to_upsert.outgoing_edges.len()
            )
        }
        NodeDelta::DeleteNode { node_id, .. } => format!("- {node_id}"),
    }
}

fn print_delta(delta: &[NodeDelta], output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => print_json(delta),
        OutputFormat::Pretty => {
            if delta.is_empty() {
                println!("(no changes)");
            }
            for op in delta {
                println!("{}", describe_op(op));
            }
            Ok(())
        }
    }
}

fn print_node(node: &GraphNode) {
    println!("{}  {}", node.id, node.title());
    for edge in &node.outgoing_edges {
        if edge.label.is_empty() {
            println!("    -> {}", edge.target_id);
        } else {
            println!("    -> {} [{}]", edge.target_id, edge.label);
        }
    }
}

fn run_load(
    root: &Path,
    settings: &VaultSettings,
    as_delta: bool,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let graph = load_graph_from_directory(root, &settings.engine.load_options())?;
    if as_delta {
        return print_delta(&graph_as_initial_delta(&graph), output);
    }
    match output {
        OutputFormat::Json => print_json(&graph.nodes().collect::<Vec<_>>()),
        OutputFormat::Pretty => {
            for node in graph.nodes() {
                print_node(node);
            }
            println!(
                "{} notes, {} edges in {}",
                graph.len(),
                graph.edge_count(),
                root.display()
            );
            Ok(())
        }
    }
}

/// Payload shape of `watch/error` and `file/read_failed`.
#[derive(Deserialize)]
struct ProblemPayload {
    message: String,
}

/// Log lifecycle and failure events from the bus; deltas are printed by the sink.
fn log_bus_event(event: &WeaveEvent) {
    if event.topic == topics::WATCH_ERROR || event.topic == topics::FILE_READ_FAILED {
        match event.payload_as::<ProblemPayload>() {
            Ok(problem) => tracing::warn!(topic = %event.topic, "{}", problem.message),
            Err(_) => tracing::warn!("{event}"),
        }
    } else if topics::is_watch_topic(&event.topic) {
        tracing::info!("{event}");
    }
}

async fn run_watch(
    root: &Path,
    settings: &mut VaultSettings,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let session = WatchSession::new(settings.engine.clone());
    session.add_sink(
        move |_directory: Option<&Path>, origin: DeltaOrigin, delta: &[NodeDelta]| match output {
            OutputFormat::Json => match serde_json::to_string(&json!({ "origin": origin, "delta": delta })) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "failed to encode delta"),
            },
            OutputFormat::Pretty => {
                for op in delta {
                    println!("[{origin:?}] {}", describe_op(op));
                }
            }
        },
    );

    let mut bus_events = weave_events::subscribe();
    let bus_logger = tokio::spawn(async move {
        loop {
            match bus_events.recv().await {
                Ok(event) => log_bus_event(&event),
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "bus logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let response = session.start_watching(root).await;
    if !response.success {
        bus_logger.abort();
        bail!(
            "failed to watch {}: {}",
            root.display(),
            response.error.unwrap_or_default()
        );
    }
    settings.last_directory = response.directory.clone();
    if let Err(err) = save_settings(settings) {
        tracing::warn!(error = %err, "could not record last vault");
    }
    tracing::info!(directory = %root.display(), "watching; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    let stopped = session.stop_watching().await;
    if let Some(error) = stopped.error {
        tracing::warn!(error = %error, "stop reported an error");
    }
    bus_logger.abort();
    Ok(())
}

fn run_structural(
    root: &Path,
    settings: &VaultSettings,
    output: OutputFormat,
    compute: impl FnOnce(&Graph) -> anyhow::Result<GraphDelta>,
) -> anyhow::Result<()> {
    let graph = load_graph_from_directory(root, &settings.engine.load_options())?;
    let delta = canonicalize_delta(&graph, &compute(&graph)?);
    let report = apply_delta_to_disk(root, &delta)?;
    match output {
        OutputFormat::Json => print_json(&json!({ "delta": delta, "disk": report })),
        OutputFormat::Pretty => {
            print_delta(&delta, output)?;
            println!(
                "{} written, {} removed, {} unchanged",
                report.written.len(),
                report.removed.len(),
                report.unchanged.len()
            );
            Ok(())
        }
    }
}

fn context_id_for(id: &str) -> String {
    let stem = id
        .strip_suffix(".md")
        .or_else(|| id.strip_suffix(".markdown"))
        .unwrap_or(id);
    format!("{stem}.context.md")
}

fn run_context(
    root: &Path,
    settings: &VaultSettings,
    id: &str,
    max_distance: usize,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let graph = load_graph_from_directory(root, &settings.engine.load_options())?;
    let node = build_context_node(&graph, id, max_distance, &context_id_for(id))
        .with_context(|| format!("unknown node '{id}'"))?;
    match output {
        OutputFormat::Json => print_json(&node),
        OutputFormat::Pretty => {
            println!("{}", node.content);
            Ok(())
        }
    }
}

fn run_settings(
    root: Option<PathBuf>,
    settings: &mut VaultSettings,
    show_all: Option<bool>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(value) = show_all {
        let root = resolve_root(root, settings)?;
        settings.set_show_all(&root, value);
        let path = save_settings(settings)?;
        tracing::info!(path = %path.display(), "settings saved");
    }
    match output {
        OutputFormat::Json => print_json(&json!({
            "path": settings_path(),
            "settings": settings,
        })),
        OutputFormat::Pretty => {
            match settings_path() {
                Some(path) => println!("# {}", path.display()),
                None => println!("# (no config directory)"),
            }
            print!("{}", serde_yaml::to_string(settings)?);
            Ok(())
        }
    }
}
