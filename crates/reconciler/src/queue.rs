//! Delay queue of resource keys.
//!
//! A key is queued at most once, at its earliest due time, and is never handed
//! out again while a worker still holds it. A key added while held is parked
//! and becomes due once the worker calls [`WorkQueue::done`].

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use ddmon_api::ObjectKey;

/// Longest delay a key can be scheduled out (one week); longer requeues are
/// clamped.
pub const MAX_DELAY: Duration = Duration::from_secs(604_800);

/// `now + delay`, with `delay` clamped to [`MAX_DELAY`].
pub fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay.min(MAX_DELAY)).unwrap_or(now)
}

#[derive(Debug, Default)]
pub struct WorkQueue {
    /// Due time of every queued key.
    due: HashMap<ObjectKey, Instant>,
    /// Min-heap over `due`; entries whose time no longer matches are stale.
    heap: BinaryHeap<Reverse<(Instant, ObjectKey)>>,
    /// Keys handed out and not yet done.
    processing: HashSet<ObjectKey>,
    /// Keys re-added while processing.
    parked: HashMap<ObjectKey, Instant>,
}

impl WorkQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `key` to be processed now.
    pub fn add(&mut self, key: ObjectKey) {
        self.add_at(key, Instant::now());
    }

    /// Queue `key` to be processed after `delay`, at most [`MAX_DELAY`].
    pub fn add_after(&mut self, key: ObjectKey, delay: Duration) {
        self.add_at(key, deadline_after(Instant::now(), delay));
    }

    /// Queue `key` for `at`, keeping the earlier time if already queued.
    pub fn add_at(&mut self, key: ObjectKey, at: Instant) {
        if self.processing.contains(&key) {
            let parked = self.parked.entry(key).or_insert(at);
            *parked = (*parked).min(at);
            return;
        }

        if self.due.get(&key).is_some_and(|current| *current <= at) {
            return;
        }
        self.due.insert(key.clone(), at);
        self.heap.push(Reverse((at, key)));
    }

    /// Take the next key due at or before `now` and mark it processing.
    pub fn pop_ready(&mut self, now: Instant) -> Option<ObjectKey> {
        while let Some(Reverse((at, _))) = self.heap.peek() {
            if *at > now {
                return None;
            }
            let Some(Reverse((at, key))) = self.heap.pop() else {
                return None;
            };
            if self.due.get(&key) != Some(&at) {
                continue;
            }
            self.due.remove(&key);
            self.processing.insert(key.clone());
            return Some(key);
        }
        None
    }

    /// Release a key taken with `pop_ready`.
    pub fn done(&mut self, key: &ObjectKey) {
        self.processing.remove(key);
        if let Some(at) = self.parked.remove(key) {
            self.add_at(key.clone(), at);
        }
    }

    /// Drop a queued key; a key being processed is left alone.
    pub fn forget(&mut self, key: &ObjectKey) {
        self.due.remove(key);
        self.parked.remove(key);
    }

    /// Earliest due time among queued keys.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.due.values().min().copied()
    }

    /// Whether `key` is held by a worker.
    pub fn is_processing(&self, key: &ObjectKey) -> bool {
        self.processing.contains(key)
    }

    /// Number of queued keys, not counting ones being processed.
    pub fn len(&self) -> usize {
        self.due.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }
}
