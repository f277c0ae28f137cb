use std::collections::VecDeque;

use crate::delta::NodeDelta;
use crate::model::{GraphNode, NodeId};

/// Entries kept in the recent-activity queue.
pub const RECENT_NODE_CAPACITY: usize = 5;

/// Characters an update must add to count as a meaningful edit.
pub const SUBSTANTIVE_GROWTH_MARGIN: usize = 150;

/// Bounded most-recent-first list of nodes with meaningful activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentNodeQueue {
    entries: VecDeque<NodeId>,
    capacity: usize,
}

impl Default for RecentNodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RecentNodeQueue {
    /// Queue with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(RECENT_NODE_CAPACITY)
    }

    /// Queue with a custom capacity (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Ids, most recent first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `id` is queued.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry == id)
    }

    /// Put `id` at the front, dropping an older copy and the overflow.
    pub fn touch(&mut self, id: &str) {
        self.remove(id);
        self.entries.push_front(id.to_string());
        self.entries.truncate(self.capacity);
    }

    /// Drop `id` if present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry != id);
        self.entries.len() != before
    }

    /// Whether an upsert counts as recent activity.
    #[must_use]
    pub fn qualifies(node: &GraphNode, previous: Option<&GraphNode>) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        node.content.chars().count()
            > previous.content.chars().count() + SUBSTANTIVE_GROWTH_MARGIN
    }

    /// Fold a delta into the queue: removals first, then qualifying upserts.
    pub fn observe(&mut self, delta: &[NodeDelta]) {
        for op in delta {
            if let NodeDelta::DeleteNode { node_id, .. } = op {
                self.remove(node_id);
            }
        }
        for op in delta {
            if let NodeDelta::UpsertNode {
                node_to_upsert,
                previous_node,
            } = op
                && Self::qualifies(node_to_upsert, previous_node.as_ref())
            {
                self.touch(&node_to_upsert.id);
            }
        }
    }
}
