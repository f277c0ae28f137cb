//! Structural graph operations that keep relationships intact.

mod delete;
mod merge;
mod tree;

pub use delete::delete_node_maintaining_transitive_edges;
pub use merge::{MergeOptions, create_representative_node, merge_nodes};
