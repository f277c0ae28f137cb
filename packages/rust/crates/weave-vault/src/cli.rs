use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "weave")]
#[command(about = "Render a markdown vault as a graph and keep graph, files and view in sync.")]
pub(crate) struct Cli {
    /// Vault directory (default: the last vault recorded in settings).
    #[arg(long, global = true)]
    pub(crate) root: Option<PathBuf>,

    /// Override config home; settings live in `<conf-home>/weave/settings.yaml`.
    #[arg(long, global = true)]
    pub(crate) conf_home: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub(crate) output: OutputFormat,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Load the vault and print its nodes.
    Load {
        /// Print the initial-load delta instead of the node list.
        #[arg(long)]
        delta: bool,
    },
    /// Watch the vault and print every delta until Ctrl+C.
    Watch,
    /// Delete a node, reconnecting its neighbours, and update the files.
    Delete {
        /// Node id (vault-relative path, e.g. `notes/a.md`).
        id: String,
    },
    /// Merge nodes into one representative node and update the files.
    Merge {
        /// Node ids to merge.
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,

        /// Id of the representative node.
        #[arg(long)]
        into: String,

        /// Title for the representative heading.
        #[arg(long)]
        title: Option<String>,
    },
    /// Print the synthesized context node around a node.
    Context {
        /// Node id at the centre of the window.
        id: String,

        /// Hops to follow in either direction.
        #[arg(long, default_value_t = 2)]
        max_distance: usize,
    },
    /// Print resolved settings, optionally toggling show-all for the vault.
    Settings {
        /// Set the show-all toggle for `--root`.
        #[arg(long)]
        show_all: Option<bool>,
    },
}
