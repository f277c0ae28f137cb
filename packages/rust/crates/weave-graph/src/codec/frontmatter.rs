use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::LazyLock;

use crate::model::{NodeUiMetadata, Position, normalize_color};

const KEY_POSITION: &str = "position";
const KEY_COLOR: &str = "color";
const KEY_IS_CONTEXT_NODE: &str = "isContextNode";
const KEY_CONTAINED_NODE_IDS: &str = "containedNodeIds";

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_compile_err) => match Regex::new(r"$^") {
            Ok(fallback) => fallback,
            Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
        },
    }
}

// Closing fence consumes exactly one line break so leading body blank lines survive.
static FRONTMATTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n(?:---|\.\.\.)[ \t]*(?:\r?\n|\z)")
});

/// Split leading YAML frontmatter from the body.
///
/// Malformed or non-mapping YAML is treated as ordinary body text.
pub(super) fn split_frontmatter(content: &str) -> (Option<Mapping>, &str) {
    let Some(caps) = FRONTMATTER_REGEX.captures(content) else {
        return (None, content);
    };
    let (Some(whole), Some(yaml)) = (caps.get(0), caps.get(1)) else {
        return (None, content);
    };
    match serde_yaml::from_str::<Value>(yaml.as_str()) {
        Ok(Value::Mapping(mapping)) => (Some(mapping), &content[whole.end()..]),
        Ok(Value::Null) => (Some(Mapping::new()), &content[whole.end()..]),
        Ok(_) => (None, content),
        Err(err) => {
            log::debug!("frontmatter is not valid YAML, keeping it as body text: {err}");
            (None, content)
        }
    }
}

/// Whether a header-less body would be read back as frontmatter.
pub(super) fn starts_like_frontmatter(body: &str) -> bool {
    body.starts_with("---")
}

fn value_to_finite_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        Value::String(raw) => raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn parse_position(value: &Value) -> Option<Position> {
    let x = value.get("x").and_then(value_to_finite_f64)?;
    let y = value.get("y").and_then(value_to_finite_f64)?;
    Some(Position::new(x, y))
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(raw) => match raw.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_id_list(value: &Value) -> Option<Vec<String>> {
    let Value::Sequence(items) = value else {
        return None;
    };
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Interpret a frontmatter mapping; unknown keys are kept verbatim.
pub(super) fn metadata_from_mapping(mapping: &Mapping) -> NodeUiMetadata {
    let mut metadata = NodeUiMetadata::default();
    for (key, value) in mapping {
        let Some(key) = key.as_str() else {
            log::debug!("skipping non-string frontmatter key: {key:?}");
            continue;
        };
        match key {
            KEY_POSITION => {
                metadata.position = parse_position(value);
                if metadata.position.is_none() {
                    log::debug!("dropping unreadable position: {value:?}");
                }
            }
            KEY_COLOR => {
                metadata.color = value.as_str().and_then(normalize_color);
                if metadata.color.is_none() {
                    log::debug!("dropping invalid color: {value:?}");
                }
            }
            KEY_IS_CONTEXT_NODE => metadata.is_context_node = parse_bool(value).unwrap_or(false),
            KEY_CONTAINED_NODE_IDS => metadata.contained_node_ids = parse_id_list(value),
            other => {
                metadata
                    .additional_yaml_props
                    .insert(other.to_string(), value.clone());
            }
        }
    }
    metadata
}

/// Frontmatter mapping for a node, `None` when there is nothing to store.
pub(super) fn mapping_from_metadata(metadata: &NodeUiMetadata) -> Option<Mapping> {
    let mut mapping = Mapping::new();
    if let Some(position) = metadata.position
        && position.x.is_finite()
        && position.y.is_finite()
    {
        let mut coords = Mapping::new();
        coords.insert(Value::from("x"), Value::from(position.x));
        coords.insert(Value::from("y"), Value::from(position.y));
        mapping.insert(Value::from(KEY_POSITION), Value::Mapping(coords));
    }
    if let Some(color) = metadata.color.as_deref().and_then(normalize_color) {
        mapping.insert(Value::from(KEY_COLOR), Value::from(color));
    }
    if metadata.is_context_node {
        mapping.insert(Value::from(KEY_IS_CONTEXT_NODE), Value::Bool(true));
    }
    if let Some(ids) = &metadata.contained_node_ids {
        let items = ids.iter().map(|id| Value::from(id.as_str())).collect();
        mapping.insert(Value::from(KEY_CONTAINED_NODE_IDS), Value::Sequence(items));
    }
    for (key, value) in &metadata.additional_yaml_props {
        mapping.insert(Value::from(key.as_str()), value.clone());
    }
    if mapping.is_empty() {
        None
    } else {
        Some(mapping)
    }
}
