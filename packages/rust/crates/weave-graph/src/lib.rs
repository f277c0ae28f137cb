//! weave-graph - Graph delta synchronization engine for markdown vaults.
//!
//! A vault is a directory of markdown files. Every file is a node, every
//! `[[wikilink]]` is a directed edge. All change flows through [`GraphDelta`]
//! values: the same delta is applied to the in-memory [`Graph`], projected
//! onto a live view, and (when user-originated) persisted back to disk.
//!
//! # Architecture
//!
//! ```text
//! weave-graph/src/
//! ├── model/       # Graph, GraphNode, Edge, CSS color validation
//! ├── codec/       # markdown <-> node (frontmatter, wikilinks, titles)
//! ├── delta/       # load, initial delta, file-event diff, apply
//! ├── structural/  # transitive delete, merge into representative
//! ├── classify/    # substantive-change detection, recent-activity queue
//! ├── traversal.rs # bidirectional reachability, context windows
//! └── view/        # view surface trait + two-pass projector
//! ```
//!
//! # Example
//!
//! ```rust
//! use weave_graph::{Graph, GraphNode, apply_delta_to_graph, graph_as_initial_delta};
//!
//! let graph = Graph::from_nodes([GraphNode::new("a.md", "# Alpha")]);
//! let delta = graph_as_initial_delta(&graph);
//! let rebuilt = apply_delta_to_graph(&Graph::default(), &delta);
//! assert_eq!(rebuilt, graph);
//! ```

pub mod classify;
pub mod codec;
pub mod delta;
pub mod model;
pub mod structural;
pub mod traversal;
pub mod view;

pub use classify::{
    RECENT_NODE_CAPACITY, RecentNodeQueue, SUBSTANTIVE_GROWTH_MARGIN, appended_suffix,
    has_substantive_change, is_append_only, reconcile_external_append, strip_bracketed_spans,
};
pub use codec::{
    LinkResolver, ParsedMarkdown, RawLink, canonical_node, derive_title, is_markdown_path,
    is_well_formed_target, node_id_for_path, parse_markdown, parse_markdown_to_node,
    serialize_node,
};
pub use delta::{
    DEFAULT_MAX_FILES, GraphDelta, LoadError, LoadOptions, NodeDelta, VaultFileEvent,
    apply_delta_in_place, apply_delta_to_graph, canonicalize_delta, file_event_to_delta,
    graph_as_initial_delta, graph_replacement_delta, load_graph_from_directory,
    load_graph_or_empty,
};
pub use model::{
    Edge, Graph, GraphNode, NodeId, NodeUiMetadata, Position, is_valid_css_color, normalize_color,
};
pub use structural::{
    MergeOptions, create_representative_node, delete_node_maintaining_transitive_edges,
    merge_nodes,
};
pub use traversal::{bidirectional_reachable, build_context_node, context_window};
pub use view::{
    ProjectionReport, ViewEdge, ViewGraph, ViewNode, ViewProjector, ViewSurface,
    apply_delta_to_view, edge_id,
};
