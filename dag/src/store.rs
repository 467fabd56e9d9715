//! Keyed event storage

use crate::event::Event;
use dashmap::DashMap;
use lachesis_core::EventId;
use std::sync::Arc;

/// Keyed retrieval of inserted events.
///
/// Persistence and encoding belong to the implementor; the consensus core
/// only needs get/put by id.
pub trait EventStore: Send + Sync {
    /// Get an event by id
    fn get(&self, id: &EventId) -> Option<Arc<Event>>;

    /// Store an event (overwrites are harmless: events are immutable)
    fn put(&self, event: Arc<Event>);

    /// Check if an event exists
    fn contains(&self, id: &EventId) -> bool;

    /// Number of stored events
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory event store
pub struct MemoryEventStore {
    events: DashMap<EventId, Arc<Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
        }
    }

    pub fn with_events(events: Vec<Event>) -> Self {
        let store = Self::new();
        for event in events {
            store.events.insert(event.id(), Arc::new(event));
        }
        store
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for MemoryEventStore {
    fn get(&self, id: &EventId) -> Option<Arc<Event>> {
        self.events.get(id).map(|e| e.value().clone())
    }

    fn put(&self, event: Arc<Event>) {
        self.events.insert(event.id(), event);
    }

    fn contains(&self, id: &EventId) -> bool {
        self.events.contains_key(id)
    }

    fn len(&self) -> usize {
        self.events.len()
    }
}

impl<S: EventStore + ?Sized> EventStore for Arc<S> {
    fn get(&self, id: &EventId) -> Option<Arc<Event>> {
        (**self).get(id)
    }

    fn put(&self, event: Arc<Event>) {
        (**self).put(event)
    }

    fn contains(&self, id: &EventId) -> bool {
        (**self).contains(id)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}
