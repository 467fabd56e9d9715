//! Buffer for events whose parents have not arrived yet

use lachesis_core::{EventId, LachesisError, LachesisResult};
use lachesis_dag::Event;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Pending entry with the parents it still waits for
#[derive(Debug, Clone)]
struct PendingEvent {
    event: Event,
    missing: HashSet<EventId>,
}

/// Events held back until all their parents are inserted.
///
/// Indexed both by event and by missing parent, so that the arrival of a
/// parent releases exactly the children it unblocks.
#[derive(Debug)]
pub struct PendingPool {
    events: HashMap<EventId, PendingEvent>,
    /// Missing parent -> events waiting for it
    waiting: HashMap<EventId, HashSet<EventId>>,
    max_size: usize,
}

impl PendingPool {
    pub fn new(max_size: usize) -> Self {
        Self {
            events: HashMap::new(),
            waiting: HashMap::new(),
            max_size,
        }
    }

    /// Buffer an event; returns false if it is already pending
    pub fn insert(
        &mut self,
        event: Event,
        missing: impl IntoIterator<Item = EventId>,
    ) -> LachesisResult<bool> {
        let id = event.id();
        if self.events.contains_key(&id) {
            return Ok(false);
        }
        if self.events.len() >= self.max_size {
            warn!("Pending pool full, event {} rejected", id);
            return Err(LachesisError::PendingPoolFull(self.max_size));
        }

        let missing: HashSet<EventId> = missing.into_iter().collect();
        for parent in &missing {
            self.waiting.entry(*parent).or_default().insert(id);
        }
        debug!("Buffered event {} waiting for {} parents", id, missing.len());
        self.events.insert(id, PendingEvent { event, missing });
        Ok(true)
    }

    /// Note that `parent` was inserted; returns the events it unblocked
    pub fn release(&mut self, parent: &EventId) -> Vec<Event> {
        let Some(children) = self.waiting.remove(parent) else {
            return Vec::new();
        };

        let mut ready: Vec<EventId> = Vec::new();
        for child in children {
            if let Some(entry) = self.events.get_mut(&child) {
                entry.missing.remove(parent);
                if entry.missing.is_empty() {
                    ready.push(child);
                }
            }
        }
        // Released in id order for deterministic admission
        ready.sort();

        ready
            .into_iter()
            .filter_map(|id| self.events.remove(&id))
            .map(|entry| entry.event)
            .collect()
    }

    /// Drop every pending event that depends on `id`, directly or not.
    /// Returns how many were dropped.
    pub fn evict_dependents(&mut self, id: &EventId) -> usize {
        let mut evicted = 0;
        let mut stack = vec![*id];
        while let Some(parent) = stack.pop() {
            let Some(children) = self.waiting.remove(&parent) else {
                continue;
            };
            for child in children {
                if let Some(entry) = self.events.remove(&child) {
                    for other in &entry.missing {
                        if let Some(waiters) = self.waiting.get_mut(other) {
                            waiters.remove(&child);
                        }
                    }
                    evicted += 1;
                    stack.push(child);
                }
            }
        }
        evicted
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.events.contains_key(id)
    }

    /// Parents some pending event is still waiting for
    pub fn missing_parents(&self) -> Vec<EventId> {
        let mut missing: Vec<EventId> = self
            .waiting
            .keys()
            .filter(|parent| !self.events.contains_key(*parent))
            .copied()
            .collect();
        missing.sort();
        missing
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
