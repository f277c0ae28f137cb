use std::collections::{BTreeSet, HashSet};

use crate::model::GraphNode;

/// ASCII tree of the edges internal to `members`, `None` when there are none.
///
/// Members without an internal parent are roots; members only reachable
/// through a cycle are rendered as extra roots in input order. A node is
/// expanded once; later occurrences are listed without children.
pub(super) fn render_internal_tree(members: &[&GraphNode]) -> Option<String> {
    let ids: HashSet<&str> = members.iter().map(|node| node.id.as_str()).collect();
    let children_of = |node: &GraphNode| -> Vec<usize> {
        node.outgoing_edges
            .iter()
            .filter(|edge| edge.target_id != node.id && ids.contains(edge.target_id.as_str()))
            .filter_map(|edge| members.iter().position(|m| m.id == edge.target_id))
            .collect()
    };

    let has_parent: BTreeSet<usize> = members.iter().flat_map(|node| children_of(*node)).collect();
    if has_parent.is_empty() {
        return None;
    }

    let mut lines: Vec<String> = Vec::new();
    let mut expanded: HashSet<usize> = HashSet::new();
    let roots = (0..members.len()).filter(|idx| !has_parent.contains(idx));
    let rest: Vec<usize> = (0..members.len()).collect();
    for root in roots.chain(rest) {
        if expanded.contains(&root) {
            continue;
        }
        lines.push(members[root].title());
        expanded.insert(root);
        render_children(members, &children_of, root, "", &mut expanded, &mut lines);
    }
    Some(format!("```\n{}\n```", lines.join("\n")))
}

fn render_children(
    members: &[&GraphNode],
    children_of: &dyn Fn(&GraphNode) -> Vec<usize>,
    parent: usize,
    prefix: &str,
    expanded: &mut HashSet<usize>,
    lines: &mut Vec<String>,
) {
    let children = children_of(members[parent]);
    let count = children.len();
    for (position, child) in children.into_iter().enumerate() {
        let last = position + 1 == count;
        let (branch, indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        lines.push(format!("{prefix}{branch}{}", members[child].title()));
        if expanded.insert(child) {
            let nested = format!("{prefix}{indent}");
            render_children(members, children_of, child, &nested, expanded, lines);
        }
    }
}
