//! Change classifiers: link-only vs substantive edits, append detection.

mod recent;

use regex::Regex;
use std::sync::LazyLock;

pub use recent::{RECENT_NODE_CAPACITY, RecentNodeQueue, SUBSTANTIVE_GROWTH_MARGIN};

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_compile_err) => match Regex::new(r"$^") {
            Ok(fallback) => fallback,
            Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
        },
    }
}

// `[[wikilink]]`, then `[span]` with the optional `*` placeholder marker.
static BRACKETED_SPAN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\[\[[^\[\]\n]*\]\]|\[[^\[\]\n]*\]\*?"));

/// Remove `[[...]]` and `[...]` spans, brackets included.
#[must_use]
pub fn strip_bracketed_spans(text: &str) -> String {
    BRACKETED_SPAN_REGEX.replace_all(text, "").into_owned()
}

/// Whether the edit changed more than links.
///
/// Whitespace left behind by a removed span still counts, so adding a link
/// next to existing whitespace can read as substantive.
#[must_use]
pub fn has_substantive_change(previous: &str, next: &str) -> bool {
    strip_bracketed_spans(previous) != strip_bracketed_spans(next)
}

/// `next` extends `previous` at the end and nowhere else.
#[must_use]
pub fn is_append_only(previous: &str, next: &str) -> bool {
    next.len() > previous.len() && next.starts_with(previous)
}

/// Text appended to `previous` to form `next`, if the change is append-only.
#[must_use]
pub fn appended_suffix<'a>(previous: &str, next: &'a str) -> Option<&'a str> {
    next.strip_prefix(previous).filter(|suffix| !suffix.is_empty())
}

/// Fold an external append into an unsaved local edit.
///
/// Returns `None` when the disk change is not append-only; the caller then has
/// a real conflict to resolve.
#[must_use]
pub fn reconcile_external_append(
    unsaved: &str,
    previous_disk: &str,
    new_disk: &str,
) -> Option<String> {
    appended_suffix(previous_disk, new_disk).map(|suffix| format!("{unsaved}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_swaps_are_not_substantive() {
        assert!(!has_substantive_change(
            "Hello [[old]] world",
            "Hello [[new]] world"
        ));
        assert!(!has_substantive_change("See [a]* here", "See [b]* here"));
        assert!(has_substantive_change(
            "Hello [[x]] world",
            "Hello [[x]] universe"
        ));
    }

    #[test]
    fn test_append_detection() {
        assert!(is_append_only("abc", "abcdef"));
        assert!(!is_append_only("abc", "abc"));
        assert!(!is_append_only("abc", "xabc"));
        assert_eq!(appended_suffix("abc", "abcdef"), Some("def"));
        assert_eq!(appended_suffix("abc", "abc"), None);
        assert_eq!(
            reconcile_external_append("draft edit", "disk", "disk\nmore"),
            Some("draft edit\nmore".to_string())
        );
        assert_eq!(reconcile_external_append("draft", "disk", "changed"), None);
    }
}
