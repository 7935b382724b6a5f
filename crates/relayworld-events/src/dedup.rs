//! Bounded set of recently applied event ids.
//!
//! Relays replay history on every subscription and echo a client's own
//! publishes back to it. The filter remembers the most recent `capacity`
//! ids and evicts the oldest once full.

use std::collections::{HashSet, VecDeque};

use tracing::trace;

use relayworld_types::EventId;

/// Remembers applied event ids so that a redelivery is discarded.
#[derive(Debug, Clone)]
pub struct IdempotencyFilter {
    capacity: usize,
    seen: HashSet<EventId>,
    order: VecDeque<EventId>,
}

impl IdempotencyFilter {
    /// Create a filter remembering at most `capacity` ids (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Whether `id` was recorded and not yet evicted.
    pub fn contains(&self, id: &EventId) -> bool {
        self.seen.contains(id)
    }

    /// Record `id`. Returns `false` if it was already present.
    pub fn insert(&mut self, id: EventId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
                trace!(event_id = %evicted, "Evicted event id from idempotency filter");
            }
        }
        true
    }

    /// Forget `id`. Returns `false` if it was not remembered.
    pub fn remove(&mut self, id: &EventId) -> bool {
        if !self.seen.remove(id) {
            return false;
        }
        if let Some(index) = self.order.iter().position(|o| o == id) {
            self.order.remove(index);
        }
        true
    }

    /// Number of ids currently remembered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no ids are remembered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of ids remembered.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
