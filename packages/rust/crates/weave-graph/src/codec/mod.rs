//! Markdown note codec: file text to graph node and back.

mod frontmatter;
mod links;
mod paths;

use crate::model::{Edge, GraphNode, NodeId, NodeUiMetadata, dedupe_edges};

use self::frontmatter::{
    mapping_from_metadata, metadata_from_mapping, split_frontmatter, starts_like_frontmatter,
};
use self::links::{display_placeholders, extract_wikilinks, format_link_line, restore_wikilinks};

pub use self::links::{LinkResolver, RawLink};
pub use self::paths::{is_markdown_path, is_well_formed_target, node_id_for_path};
pub(crate) use self::links::placeholder_targets;
pub(crate) use self::paths::file_stem;

/// Parsed note before its links are resolved against the vault.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMarkdown {
    /// Node id the text was read for.
    pub id: NodeId,
    /// Body with placeholders in place of wikilinks.
    pub content: String,
    /// Raw link targets in document order, unique by target.
    pub links: Vec<RawLink>,
    /// Metadata read from the frontmatter.
    pub ui_metadata: NodeUiMetadata,
}

impl ParsedMarkdown {
    /// Resolve raw links into edges and build the node.
    #[must_use]
    pub fn into_node(self, resolver: &LinkResolver) -> GraphNode {
        let edges: Vec<Edge> = self
            .links
            .iter()
            .map(|link| Edge::new(resolver.resolve(&link.target, &self.id), link.label.clone()))
            .collect();
        GraphNode {
            id: self.id,
            content: self.content,
            outgoing_edges: dedupe_edges(edges),
            ui_metadata: self.ui_metadata,
        }
    }
}

/// Parse note text without resolving links.
#[must_use]
pub fn parse_markdown(id: &str, text: &str) -> ParsedMarkdown {
    let (mapping, body) = split_frontmatter(text);
    let ui_metadata = mapping
        .as_ref()
        .map(metadata_from_mapping)
        .unwrap_or_default();
    let (content, links) = extract_wikilinks(body);
    ParsedMarkdown {
        id: id.to_string(),
        content,
        links,
        ui_metadata,
    }
}

/// Parse note text and resolve its links in one step.
#[must_use]
pub fn parse_markdown_to_node(id: &str, text: &str, resolver: &LinkResolver) -> GraphNode {
    parse_markdown(id, text).into_node(resolver)
}

/// Node as it reads back after being written: `parse(serialize(node))`.
///
/// Edges without a placeholder become link lines in the content and
/// placeholders without an edge become plain text. Storing this form keeps
/// the parsed echo of a write equal to the stored node.
#[must_use]
pub fn canonical_node(node: &GraphNode, resolver: &LinkResolver) -> GraphNode {
    parse_markdown_to_node(&node.id, &serialize_node(node), resolver)
}

/// Render a node as note text.
///
/// Placeholders backed by an edge become wikilinks again; edges without a
/// placeholder are appended as `- label [[target]]` lines.
#[must_use]
pub fn serialize_node(node: &GraphNode) -> String {
    let (mut body, covered) = restore_wikilinks(&node.content, &node.outgoing_edges);
    let uncovered: Vec<&Edge> = node
        .outgoing_edges
        .iter()
        .filter(|edge| !covered.contains(&edge.target_id))
        .collect();
    if !uncovered.is_empty() {
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        for edge in uncovered {
            body.push_str(&format_link_line(edge));
            body.push('\n');
        }
    }

    let header = match mapping_from_metadata(&node.ui_metadata) {
        Some(mapping) => match serde_yaml::to_string(&mapping) {
            Ok(yaml) => Some(yaml),
            Err(err) => {
                log::warn!("failed to serialize metadata for {}: {err}", node.id);
                None
            }
        },
        None => None,
    };
    match header {
        Some(yaml) => format!("---\n{yaml}---\n{body}"),
        // An explicit empty header keeps a leading `---` in the body from
        // being read back as frontmatter.
        None if starts_like_frontmatter(&body) => format!("---\n{{}}\n---\n{body}"),
        None => body,
    }
}

/// Display title: first heading, else first non-empty line, else file stem.
#[must_use]
pub fn derive_title(content: &str, id: &str) -> String {
    let heading = content.lines().map(str::trim).find_map(|line| {
        let rest = line.strip_prefix('#')?.trim_start_matches('#');
        // `#tag` is not a heading: the marker run must end in whitespace.
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let text = rest.trim();
        (!text.is_empty()).then_some(text)
    });
    let line = heading.or_else(|| content.lines().map(str::trim).find(|line| !line.is_empty()));
    match line {
        Some(text) => display_placeholders(text),
        None => file_stem(id).to_string(),
    }
}
