//! In-memory work queue with session-scoped deduplication

use crate::pipeline::CandidateItem;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct QueueInner {
    items: VecDeque<CandidateItem>,
    /// Dedup keys of everything ever enqueued this session, including
    /// items already dequeued
    seen: HashSet<String>,
}

/// FIFO queue of candidate items shared between discovery and consumption.
///
/// Enqueuing is idempotent per dedup key for the lifetime of the queue, so
/// an article surfaced by both a feed and a sitemap is processed once.
#[derive(Debug, Default)]
pub struct WorkQueue {
    inner: Mutex<QueueInner>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item unless its dedup key was already seen this session.
    /// Returns true when the item was accepted.
    pub fn enqueue(&self, item: CandidateItem) -> bool {
        let key = item.dedup_key().to_string();
        let mut inner = self.inner.lock().unwrap();
        if !inner.seen.insert(key) {
            tracing::debug!("Dropping duplicate candidate {}", item.link);
            return false;
        }
        inner.items.push_back(item);
        true
    }

    /// Removes and returns the oldest queued item
    pub fn dequeue(&self) -> Option<CandidateItem> {
        self.inner.lock().unwrap().items.pop_front()
    }

    /// Number of items currently waiting
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
