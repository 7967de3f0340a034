//! Subscriber Registry
//!
//! Each stream owns an ordered registry of subscribers. Entries are
//! `{id, handler, once}` records: ids are assigned from a per-registry
//! monotonic counter and are never reused, so removal works by id lookup
//! rather than by handler identity.
//!
//! Dispatch iterates a snapshot of the registry taken before the first
//! handler runs. A handler that subscribes or unsubscribes mid-dispatch
//! therefore cannot affect the current pass; the change takes effect on
//! the next dispatch.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::message::Message;

/// A subscriber's message callback.
pub type Handler<V> = Arc<dyn Fn(&Message<V>) + Send + Sync>;

/// Unique identifier for a subscriber, scoped to one stream instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Options accepted when subscribing to a stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    /// Remove the subscriber after its first delivery (of any message).
    pub once: bool,
}

struct SubscriberEntry<V> {
    handler: Handler<V>,
    once: bool,
}

/// A dispatch snapshot: `(id, handler, once)` per subscriber, in
/// subscription order. Inline capacity covers the common case of a
/// handful of subscribers per stream.
pub(crate) type Snapshot<V> = SmallVec<[(SubscriberId, Handler<V>, bool); 8]>;

/// Ordered subscriber registry with monotonic id assignment.
pub(crate) struct SubscriberSet<V> {
    entries: IndexMap<SubscriberId, SubscriberEntry<V>>,
    next_id: u64,
}

impl<V> SubscriberSet<V> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            next_id: 0,
        }
    }

    /// Register a handler, returning its id. Ids are never reused.
    pub fn add(&mut self, handler: Handler<V>, once: bool) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, SubscriberEntry { handler, once });
        id
    }

    /// Remove a subscriber by id. Returns whether it was present.
    ///
    /// Uses `shift_remove` so the remaining entries keep their
    /// subscription order.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    /// Drop every subscriber without touching the id counter.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot the registry for a dispatch pass.
    pub fn snapshot(&self) -> Snapshot<V> {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(&entry.handler), entry.once))
            .collect()
    }
}
