use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use super::paths::{
    canonical_target, file_stem, has_markdown_extension, is_well_formed_target,
    normalize_slashes, parent_dir,
};
use crate::model::{Edge, NodeId};

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_compile_err) => match Regex::new(r"$^") {
            Ok(fallback) => fallback,
            Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
        },
    }
}

static WIKILINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\[\[([^\[\]\n]+)\]\]"));

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\[([^\[\]\n]+)\]\*"));

/// Wikilink target as written, before resolution against the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    /// Path part of the link (alias and heading removed).
    pub target: String,
    /// Relationship label from a `- label [[target]]` line.
    pub label: String,
}

/// Path part of a link body: `target|alias` and `target#heading` drop the tail.
pub(crate) fn link_target_part(inner: &str) -> &str {
    let before_alias = inner.split('|').next().unwrap_or(inner);
    before_alias.split('#').next().unwrap_or(before_alias).trim()
}

fn label_for_link(line_prefix: &str) -> String {
    let trimmed = line_prefix.trim_start();
    let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    else {
        return String::new();
    };
    if rest.contains("[[") || rest.contains("]*") {
        return String::new();
    }
    rest.trim().replace('_', " ")
}

/// Rewrite `[[target]]` into `[target]*` and collect the raw links.
///
/// Ill-formed targets stay verbatim and produce no link.
pub(crate) fn extract_wikilinks(body: &str) -> (String, Vec<RawLink>) {
    let mut links: Vec<RawLink> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let rewritten = WIKILINK_REGEX.replace_all(body, |caps: &Captures<'_>| {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            return String::new();
        };
        let target = link_target_part(inner.as_str());
        if !is_well_formed_target(target) {
            log::debug!("ignoring ill-formed wikilink target: {}", inner.as_str());
            return whole.as_str().to_string();
        }
        let line_start = body[..whole.start()].rfind('\n').map_or(0, |idx| idx + 1);
        let label = label_for_link(&body[line_start..whole.start()]);
        let normalized = normalize_slashes(target);
        if seen.insert(normalized.clone()) {
            links.push(RawLink {
                target: normalized,
                label,
            });
        }
        format!("[{}]*", inner.as_str())
    });
    (rewritten.into_owned(), links)
}

/// Whether a placeholder body refers to `target_id`.
pub(crate) fn placeholder_matches(inner: &str, target_id: &str) -> bool {
    let target = normalize_slashes(link_target_part(inner));
    let target = target.trim_start_matches("./");
    if target == target_id || canonical_target(target) == target_id {
        return true;
    }
    if target_id.ends_with(&format!("/{}", canonical_target(target))) {
        return true;
    }
    !target.contains('/') && file_stem(target).eq_ignore_ascii_case(file_stem(target_id))
}

/// Restore `[target]*` placeholders backed by an edge to `[[target]]`.
///
/// Placeholders without a matching edge (the link was removed by a structural
/// operation) are written as plain text. Returns the rewritten text and the
/// edge targets that were covered.
pub(crate) fn restore_wikilinks(content: &str, edges: &[Edge]) -> (String, BTreeSet<NodeId>) {
    let mut covered: BTreeSet<NodeId> = BTreeSet::new();
    let restored = PLACEHOLDER_REGEX.replace_all(content, |caps: &Captures<'_>| {
        let inner = caps.get(1).map_or("", |m| m.as_str());
        match edges
            .iter()
            .find(|edge| placeholder_matches(inner, &edge.target_id))
        {
            Some(edge) => {
                covered.insert(edge.target_id.clone());
                format!("[[{inner}]]")
            }
            None => inner.to_string(),
        }
    });
    (restored.into_owned(), covered)
}

/// Raw link targets of the placeholders in `content`, in document order.
pub(crate) fn placeholder_targets(content: &str) -> Vec<String> {
    PLACEHOLDER_REGEX
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|inner| normalize_slashes(link_target_part(inner.as_str())))
        .collect()
}

/// Placeholders shown as their display text (alias when present).
pub(crate) fn display_placeholders(content: &str) -> String {
    PLACEHOLDER_REGEX
        .replace_all(content, |caps: &Captures<'_>| {
            let inner = caps.get(1).map_or("", |m| m.as_str());
            match inner.split_once('|') {
                Some((_, alias)) if !alias.trim().is_empty() => alias.trim().to_string(),
                _ => link_target_part(inner).to_string(),
            }
        })
        .into_owned()
}

/// Serialized form of an edge that has no placeholder in the content.
pub(crate) fn format_link_line(edge: &Edge) -> String {
    let label = edge.label.trim();
    if label.is_empty() {
        format!("- [[{}]]", edge.target_id)
    } else {
        format!("- {} [[{}]]", label.replace(' ', "_"), edge.target_id)
    }
}

/// Resolves raw wikilink targets against a known set of node ids.
///
/// Order: exact id, id with `.md`, path relative to the linking file, then a
/// case-insensitive file-stem match (smallest id wins). Unresolved targets
/// are canonicalized to `<target>.md`.
#[derive(Debug, Clone, Default)]
pub struct LinkResolver {
    ids: BTreeSet<NodeId>,
    by_stem: BTreeMap<String, NodeId>,
}

impl LinkResolver {
    /// Build a resolver over the given ids.
    pub fn new<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let ids: BTreeSet<NodeId> = ids.into_iter().map(str::to_string).collect();
        let mut by_stem: BTreeMap<String, NodeId> = BTreeMap::new();
        for id in &ids {
            by_stem
                .entry(file_stem(id).to_lowercase())
                .or_insert_with(|| id.clone());
        }
        Self { ids, by_stem }
    }

    /// Add one id (used when resolving a node against a graph that lacks it).
    pub fn insert(&mut self, id: &str) {
        self.ids.insert(id.to_string());
        let key = file_stem(id).to_lowercase();
        match self.by_stem.get(&key) {
            Some(existing) if existing.as_str() <= id => {}
            _ => {
                self.by_stem.insert(key, id.to_string());
            }
        }
    }

    /// Resolve `raw` as written inside `source_id`.
    #[must_use]
    pub fn resolve(&self, raw: &str, source_id: &str) -> NodeId {
        let target = normalize_slashes(raw.trim());
        let target = target.trim_start_matches("./");
        let mut candidates: Vec<String> = vec![target.to_string()];
        if !has_markdown_extension(target) {
            candidates.push(format!("{target}.md"));
        }
        let source_dir = parent_dir(source_id);
        if !source_dir.is_empty() {
            let relative: Vec<String> = candidates
                .iter()
                .map(|candidate| format!("{source_dir}/{candidate}"))
                .collect();
            candidates.extend(relative);
        }
        if let Some(found) = candidates.iter().find(|c| self.ids.contains(c.as_str())) {
            return found.clone();
        }
        if !target.contains('/')
            && let Some(found) = self.by_stem.get(&file_stem(target).to_lowercase())
        {
            return found.clone();
        }
        canonical_target(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_rewrites_links_and_reads_labels() {
        let body = "Intro [[alpha]] text\n- child_of [[notes/beta|Beta]]\n- [[alpha]]\n";
        let (content, links) = extract_wikilinks(body);
        assert_eq!(
            content,
            "Intro [alpha]* text\n- child_of [notes/beta|Beta]*\n- [alpha]*\n"
        );
        assert_eq!(
            links,
            vec![
                RawLink {
                    target: "alpha".to_string(),
                    label: String::new()
                },
                RawLink {
                    target: "notes/beta".to_string(),
                    label: "child of".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_ill_formed_links_stay_verbatim() {
        let (content, links) = extract_wikilinks("see [[../secret]] and [[https://x.y]]");
        assert_eq!(content, "see [[../secret]] and [[https://x.y]]");
        assert!(links.is_empty());
    }

    #[test]
    fn test_resolver_order() {
        let resolver = LinkResolver::new(["alpha.md", "notes/beta.md", "notes/gamma.md"]);
        assert_eq!(resolver.resolve("alpha", "x.md"), "alpha.md");
        assert_eq!(resolver.resolve("gamma", "notes/beta.md"), "notes/gamma.md");
        assert_eq!(resolver.resolve("BETA", "alpha.md"), "notes/beta.md");
        assert_eq!(resolver.resolve("missing", "alpha.md"), "missing.md");
    }

    #[test]
    fn test_placeholder_targets_drop_alias_and_heading() {
        assert_eq!(
            placeholder_targets("[c|See C]* then [notes\\d#Top]* and [e]*"),
            vec!["c", "notes/d", "e"]
        );
    }

    #[test]
    fn test_restore_drops_placeholders_without_edges() {
        let edges = vec![Edge::unlabeled("alpha.md")];
        let (text, covered) = restore_wikilinks("[alpha]* and [gone]*", &edges);
        assert_eq!(text, "[[alpha]] and gone");
        assert!(covered.contains("alpha.md"));
    }
}
