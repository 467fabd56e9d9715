//! Sealed DAG events

use crate::hashing::{IncrementalHasher, EVENT_ID_CONTEXT};
use lachesis_core::{
    Epoch, EventId, Hash, Hashable, LachesisError, LachesisResult, Seq, ValidatorId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An immutable event created by a validator.
///
/// Derived consensus data (vectors, frame) is kept by the index and the
/// frame assigner; the event itself never changes after sealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    creator: ValidatorId,
    seq: Seq,
    epoch: Epoch,
    /// If seq > 1, the first parent is the self-parent
    parents: Vec<EventId>,
    payload: Vec<u8>,
}

impl Event {
    pub fn builder(creator: ValidatorId, seq: Seq) -> EventBuilder {
        EventBuilder::new(creator, seq)
    }

    /// Compute the event id from its header fields.
    pub fn compute_id(
        creator: ValidatorId,
        seq: Seq,
        epoch: Epoch,
        parents: &[EventId],
        payload: &[u8],
    ) -> EventId {
        let mut hasher = IncrementalHasher::new(EVENT_ID_CONTEXT);
        hasher
            .update(&epoch.0.to_le_bytes())
            .update(&seq.0.to_le_bytes())
            .update(&creator.0.to_le_bytes())
            .update(&(parents.len() as u64).to_le_bytes());
        for parent in parents {
            hasher.update(parent.as_bytes());
        }
        hasher.update_framed(payload);
        hasher.finalize()
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn creator(&self) -> ValidatorId {
        self.creator
    }

    pub fn seq(&self) -> Seq {
        self.seq
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn parents(&self) -> &[EventId] {
        &self.parents
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The self-parent, if any
    pub fn self_parent(&self) -> Option<&EventId> {
        if self.seq <= Seq::FIRST {
            return None;
        }
        self.parents.first()
    }

    /// Parents other than the self-parent
    pub fn other_parents(&self) -> &[EventId] {
        match self.self_parent() {
            Some(_) => &self.parents[1..],
            None => &self.parents,
        }
    }

    /// Check the event on its own, without looking at the DAG.
    pub fn validate_structure(&self) -> LachesisResult<()> {
        if self.seq.is_none() {
            return Err(LachesisError::InvalidEvent(format!(
                "event {} has seq 0",
                self.id
            )));
        }

        if self.seq > Seq::FIRST && self.parents.is_empty() {
            return Err(LachesisError::InvalidEvent(format!(
                "event {} with seq {} has no self-parent",
                self.id, self.seq
            )));
        }

        let mut seen = HashSet::with_capacity(self.parents.len());
        for parent in &self.parents {
            if !seen.insert(parent) {
                return Err(LachesisError::InvalidEvent(format!(
                    "event {} references parent {} twice",
                    self.id, parent
                )));
            }
        }

        if self.hash() != self.id {
            return Err(LachesisError::InvalidEvent(format!(
                "event {} id does not match header hash",
                self.id
            )));
        }

        Ok(())
    }
}

impl Hashable for Event {
    fn hash(&self) -> Hash {
        Self::compute_id(
            self.creator,
            self.seq,
            self.epoch,
            &self.parents,
            &self.payload,
        )
    }
}

/// Builder sealing an [`Event`] with its computed id
#[derive(Debug, Clone)]
pub struct EventBuilder {
    creator: ValidatorId,
    seq: Seq,
    epoch: Epoch,
    parents: Vec<EventId>,
    payload: Vec<u8>,
}

impl EventBuilder {
    pub fn new(creator: ValidatorId, seq: Seq) -> Self {
        Self {
            creator,
            seq,
            epoch: Epoch::default(),
            parents: Vec::new(),
            payload: Vec::new(),
        }
    }

    pub fn epoch(mut self, epoch: Epoch) -> Self {
        self.epoch = epoch;
        self
    }

    /// Set the self-parent; it is always stored first
    pub fn self_parent(mut self, parent: EventId) -> Self {
        self.parents.insert(0, parent);
        self
    }

    pub fn parent(mut self, parent: EventId) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn parents(mut self, parents: impl IntoIterator<Item = EventId>) -> Self {
        self.parents.extend(parents);
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn build(self) -> Event {
        let id = Event::compute_id(
            self.creator,
            self.seq,
            self.epoch,
            &self.parents,
            &self.payload,
        );
        Event {
            id,
            creator: self.creator,
            seq: self.seq,
            epoch: self.epoch,
            parents: self.parents,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis(creator: u32) -> Event {
        Event::builder(ValidatorId(creator), Seq::FIRST).build()
    }

    #[test]
    fn test_event_id_deterministic() {
        let a = genesis(1);
        let b = genesis(1);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), genesis(2).id());
        assert!(a.validate_structure().is_ok());
    }

    #[test]
    fn test_payload_distinguishes_forks() {
        let a = Event::builder(ValidatorId(1), Seq::FIRST).payload(b"x".to_vec()).build();
        let b = Event::builder(ValidatorId(1), Seq::FIRST).payload(b"y".to_vec()).build();
        assert_ne!(a.id(), b.id());
        assert_eq!((a.creator(), a.seq(), a.epoch()), (b.creator(), b.seq(), b.epoch()));
    }

    #[test]
    fn test_self_parent_comes_first() {
        let a1 = genesis(1);
        let b1 = genesis(2);
        let a2 = Event::builder(ValidatorId(1), Seq::new(2))
            .parent(b1.id())
            .self_parent(a1.id())
            .build();

        assert_eq!(a2.self_parent(), Some(&a1.id()));
        assert_eq!(a2.other_parents(), &[b1.id()]);
        assert_eq!(a1.self_parent(), None);
    }

    #[test]
    fn test_structure_rejects_missing_self_parent() {
        let e = Event::builder(ValidatorId(1), Seq::new(2)).build();
        assert!(matches!(
            e.validate_structure(),
            Err(LachesisError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_structure_rejects_duplicate_parent() {
        let a1 = genesis(1);
        let e = Event::builder(ValidatorId(2), Seq::FIRST)
            .parents([a1.id(), a1.id()])
            .build();
        assert!(e.validate_structure().is_err());
    }

    #[test]
    fn test_structure_rejects_seq_zero() {
        let e = Event::builder(ValidatorId(1), Seq::NONE).build();
        assert!(e.validate_structure().is_err());
    }
}
