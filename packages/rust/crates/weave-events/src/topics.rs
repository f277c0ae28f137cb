//! Topic names used on the bus.

/// A delta was applied to the graph. Payload: `{directory, origin, delta}`.
pub const GRAPH_DELTA: &str = "graph/delta";
/// A watch session started. Payload: `{directory}`.
pub const WATCH_STARTED: &str = "watch/started";
/// A watch session stopped. Payload: `{directory}`.
pub const WATCH_STOPPED: &str = "watch/stopped";
/// The watcher or session reported an error. Payload: `{directory, message, path?}`.
pub const WATCH_ERROR: &str = "watch/error";
/// A note could not be read after retries. Payload: `{path, message}`.
pub const FILE_READ_FAILED: &str = "file/read_failed";

/// Whether `topic` belongs to the watch lifecycle group.
#[must_use]
pub fn is_watch_topic(topic: &str) -> bool {
    topic.starts_with("watch/")
}
