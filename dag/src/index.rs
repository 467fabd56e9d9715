//! Incremental causal-vector index
//!
//! Maintains, for every inserted event, the highest events it observes and
//! the lowest events observing it, per branch. Work per insertion is bounded
//! by the direct parents (highest) and by ancestors not yet observed from the
//! new event's branch (lowest), never by the size of the DAG.

use crate::event::Event;
use crate::store::EventStore;
use crate::vector::{
    BranchId, BranchSeq, HighestBefore, HighestObserved, LowestAfter, LowestObserving,
};
use lachesis_core::{Epoch, EventId, LachesisError, LachesisResult, Seq, ValidatorId};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

/// A linear run of one creator's events
#[derive(Debug, Clone)]
pub struct BranchInfo {
    pub creator: ValidatorId,
    pub epoch: Epoch,
    /// Seq of the first event on this branch
    pub start_seq: Seq,
    pub head: EventId,
    pub head_seq: Seq,
}

/// What indexing a single event revealed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUpdate {
    pub branch: BranchId,
    /// Creators whose fork became visible at this event (not inherited)
    pub new_forks: Vec<ValidatorId>,
}

/// Causal vectors of all inserted events
#[derive(Debug, Default)]
pub struct VectorIndex {
    branches: Vec<BranchInfo>,
    creator_branches: HashMap<ValidatorId, Vec<BranchId>>,
    /// Creators owning more than one branch
    multi_branch: BTreeSet<ValidatorId>,
    event_branch: HashMap<EventId, BranchId>,
    highest: HashMap<EventId, HighestBefore>,
    lowest: HashMap<EventId, LowestAfter>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.highest.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.highest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highest.is_empty()
    }

    /// Compute the vectors of `event` and propagate it into its ancestors'
    /// lowest-observing tables.
    ///
    /// All parents must already be indexed and present in `store`.
    pub fn insert<S: EventStore + ?Sized>(
        &mut self,
        event: &Event,
        store: &S,
    ) -> LachesisResult<IndexUpdate> {
        let id = event.id();
        if self.contains(&id) {
            return Err(LachesisError::DuplicateEvent(id));
        }
        for parent in event.parents() {
            if !self.contains(parent) {
                return Err(LachesisError::MissingParent(*parent));
            }
        }
        self.check_self_parent(event)?;

        let mut highest = HighestBefore::default();
        for parent in event.parents() {
            if let Some(parent_highest) = self.highest.get(parent) {
                highest.merge(parent_highest);
            }
        }

        let branch = self.assign_branch(event);
        let own = BranchSeq::new(id, event.seq());
        highest.set(branch, own);

        let mut new_forks = Vec::new();
        for creator in &self.multi_branch {
            if highest.is_fork(creator) {
                continue;
            }
            if self.branches_conflict(&highest, self.branches_of(creator)) {
                new_forks.push(*creator);
            }
        }
        for creator in &new_forks {
            highest.mark_fork(*creator);
            debug!("Event {} observes a fork of {}", id, creator);
        }

        self.highest.insert(id, highest);
        self.event_branch.insert(id, branch);

        let mut lowest = LowestAfter::default();
        lowest.set_if_empty(branch, own);
        self.lowest.insert(id, lowest);
        self.propagate_lowest(event, branch, store)?;

        Ok(IndexUpdate { branch, new_forks })
    }

    fn check_self_parent(&self, event: &Event) -> LachesisResult<()> {
        let Some(self_parent) = event.self_parent() else {
            return Ok(());
        };
        let (creator, seq) = self
            .creator_of(self_parent)
            .zip(self.seq_of(self_parent))
            .ok_or(LachesisError::MissingParent(*self_parent))?;

        if creator != event.creator() {
            return Err(LachesisError::InvalidEvent(format!(
                "self-parent {} of event {} was created by {}",
                self_parent,
                event.id(),
                creator
            )));
        }
        if seq.next() != event.seq() {
            return Err(LachesisError::InvalidEvent(format!(
                "event {} has seq {} but its self-parent has seq {}",
                event.id(),
                event.seq(),
                seq
            )));
        }
        Ok(())
    }

    /// Extend the self-parent's branch if the self-parent is its head,
    /// otherwise open a new branch for the creator.
    fn assign_branch(&mut self, event: &Event) -> BranchId {
        if let Some(self_parent) = event.self_parent() {
            if let Some(branch) = self.event_branch.get(self_parent).copied() {
                let info = &mut self.branches[branch.0 as usize];
                if info.head == *self_parent && info.epoch == event.epoch() {
                    info.head = event.id();
                    info.head_seq = event.seq();
                    return branch;
                }
            }
        }

        let branch = BranchId(self.branches.len() as u32);
        self.branches.push(BranchInfo {
            creator: event.creator(),
            epoch: event.epoch(),
            start_seq: event.seq(),
            head: event.id(),
            head_seq: event.seq(),
        });
        let owned = self.creator_branches.entry(event.creator()).or_default();
        owned.push(branch);
        if owned.len() > 1 {
            self.multi_branch.insert(event.creator());
            debug!(
                "Opened {} for {} at seq {}",
                branch,
                event.creator(),
                event.seq()
            );
        }
        branch
    }

    /// Two same-epoch branches of one creator conflict when the seq ranges
    /// observed on them overlap: both then contain an event at that seq.
    fn branches_conflict(&self, highest: &HighestBefore, branches: &[BranchId]) -> bool {
        for (i, a) in branches.iter().enumerate() {
            let a_high = highest.get(*a).seq;
            if a_high.is_none() {
                continue;
            }
            let a_info = &self.branches[a.0 as usize];
            for b in &branches[i + 1..] {
                let b_high = highest.get(*b).seq;
                let b_info = &self.branches[b.0 as usize];
                if b_high.is_none() || a_info.epoch != b_info.epoch {
                    continue;
                }
                let low = a_info.start_seq.max(b_info.start_seq);
                if low <= a_high.min(b_high) {
                    return true;
                }
            }
        }
        false
    }

    /// Walk ancestors breadth-first, recording `event` as their lowest
    /// observer on its branch. Stops at ancestors already observed from this
    /// branch: an earlier event of the branch covered them and everything
    /// below.
    fn propagate_lowest<S: EventStore + ?Sized>(
        &mut self,
        event: &Event,
        branch: BranchId,
        store: &S,
    ) -> LachesisResult<()> {
        let observer = BranchSeq::new(event.id(), event.seq());
        let mut queue: VecDeque<EventId> = event.parents().iter().copied().collect();

        while let Some(ancestor_id) = queue.pop_front() {
            let lowest = self
                .lowest
                .get_mut(&ancestor_id)
                .ok_or(LachesisError::MissingParent(ancestor_id))?;
            if !lowest.set_if_empty(branch, observer) {
                continue;
            }
            let ancestor = store
                .get(&ancestor_id)
                .ok_or(LachesisError::MissingParent(ancestor_id))?;
            queue.extend(ancestor.parents().iter().copied());
        }
        Ok(())
    }

    pub fn highest(&self, id: &EventId) -> Option<&HighestBefore> {
        self.highest.get(id)
    }

    pub fn lowest(&self, id: &EventId) -> Option<&LowestAfter> {
        self.lowest.get(id)
    }

    /// Most advanced event of `validator` observed by `id`, with the fork flag
    pub fn highest_observed(
        &self,
        id: &EventId,
        validator: &ValidatorId,
    ) -> Option<HighestObserved> {
        let highest = self.highest.get(id)?;
        let best = self
            .branches_of(validator)
            .iter()
            .map(|b| highest.get(*b))
            .filter(|s| !s.is_empty())
            .max_by_key(|s| s.seq)?;
        Some(HighestObserved {
            event: best.event?,
            seq: best.seq,
            is_fork: highest.is_fork(validator),
        })
    }

    /// Least advanced event of `validator` observing `id`, if any yet
    pub fn lowest_observing(
        &self,
        id: &EventId,
        validator: &ValidatorId,
    ) -> Option<LowestObserving> {
        let lowest = self.lowest.get(id)?;
        let best = self
            .branches_of(validator)
            .iter()
            .map(|b| lowest.get(*b))
            .filter(|s| !s.is_empty())
            .min_by_key(|s| s.seq)?;
        Some(LowestObserving {
            event: best.event?,
            seq: best.seq,
        })
    }

    pub fn branches_of(&self, validator: &ValidatorId) -> &[BranchId] {
        self.creator_branches
            .get(validator)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn branch(&self, branch: BranchId) -> Option<&BranchInfo> {
        self.branches.get(branch.0 as usize)
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    pub fn branch_of(&self, id: &EventId) -> Option<BranchId> {
        self.event_branch.get(id).copied()
    }

    pub fn creator_of(&self, id: &EventId) -> Option<ValidatorId> {
        self.branch_of(id)
            .and_then(|b| self.branch(b))
            .map(|info| info.creator)
    }

    pub fn seq_of(&self, id: &EventId) -> Option<Seq> {
        let branch = self.branch_of(id)?;
        self.highest.get(id).map(|h| h.get(branch).seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEventStore;
    use std::sync::Arc;

    struct Dag {
        index: VectorIndex,
        store: MemoryEventStore,
    }

    impl Dag {
        fn new() -> Self {
            Self {
                index: VectorIndex::new(),
                store: MemoryEventStore::new(),
            }
        }

        fn add(&mut self, event: &Event) -> IndexUpdate {
            let update = self.index.insert(event, &self.store).unwrap();
            self.store.put(Arc::new(event.clone()));
            update
        }
    }

    fn v(n: u32) -> ValidatorId {
        ValidatorId(n)
    }

    fn genesis(creator: u32) -> Event {
        Event::builder(v(creator), Seq::FIRST).build()
    }

    fn next(self_parent: &Event, others: &[&Event]) -> Event {
        Event::builder(self_parent.creator(), self_parent.seq().next())
            .self_parent(self_parent.id())
            .parents(others.iter().map(|e| e.id()))
            .build()
    }

    #[test]
    fn test_highest_merges_parents() {
        let mut dag = Dag::new();
        let a1 = genesis(1);
        let b1 = genesis(2);
        dag.add(&a1);
        dag.add(&b1);
        let a2 = next(&a1, &[&b1]);
        dag.add(&a2);

        let own = dag.index.highest_observed(&a2.id(), &v(1)).unwrap();
        assert_eq!((own.event, own.seq), (a2.id(), Seq(2)));

        let peer = dag.index.highest_observed(&a2.id(), &v(2)).unwrap();
        assert_eq!((peer.event, peer.seq, peer.is_fork), (b1.id(), Seq(1), false));

        assert!(dag.index.highest_observed(&a2.id(), &v(3)).is_none());
    }

    #[test]
    fn test_lowest_forward_propagation() {
        let mut dag = Dag::new();
        let a1 = genesis(1);
        let b1 = genesis(2);
        dag.add(&a1);
        dag.add(&b1);

        // An event observes itself
        let own = dag.index.lowest_observing(&a1.id(), &v(1)).unwrap();
        assert_eq!(own.event, a1.id());
        assert!(dag.index.lowest_observing(&a1.id(), &v(2)).is_none());

        let a2 = next(&a1, &[&b1]);
        dag.add(&a2);
        let b2 = next(&b1, &[&a2]);
        dag.add(&b2);

        // b2 reached a1 transitively through a2
        let from_b = dag.index.lowest_observing(&a1.id(), &v(2)).unwrap();
        assert_eq!((from_b.event, from_b.seq), (b2.id(), Seq(2)));

        let from_a = dag.index.lowest_observing(&b1.id(), &v(1)).unwrap();
        assert_eq!((from_a.event, from_a.seq), (a2.id(), Seq(2)));
    }

    #[test]
    fn test_lowest_keeps_first_observer() {
        let mut dag = Dag::new();
        let a1 = genesis(1);
        let b1 = genesis(2);
        dag.add(&a1);
        dag.add(&b1);
        let b2 = next(&b1, &[&a1]);
        dag.add(&b2);
        let b3 = next(&b2, &[]);
        dag.add(&b3);

        let lowest = dag.index.lowest_observing(&a1.id(), &v(2)).unwrap();
        assert_eq!(lowest.event, b2.id());
    }

    #[test]
    fn test_fork_detected_by_descendant() {
        let mut dag = Dag::new();
        let a1 = genesis(1);
        let a1_fork = Event::builder(v(1), Seq::FIRST).payload(b"fork".to_vec()).build();
        let b1 = genesis(2);
        dag.add(&a1);
        let update = dag.add(&a1_fork);
        dag.add(&b1);

        // The forking event alone contains no conflict
        assert!(update.new_forks.is_empty());
        assert_eq!(dag.index.branches_of(&v(1)).len(), 2);

        let b2 = next(&b1, &[&a1, &a1_fork]);
        let update = dag.add(&b2);
        assert_eq!(update.new_forks, vec![v(1)]);
        assert!(dag.index.highest_observed(&b2.id(), &v(1)).unwrap().is_fork);
        assert!(!dag.index.highest_observed(&b2.id(), &v(2)).unwrap().is_fork);

        // Sticky: inherited, not newly detected
        let b3 = next(&b2, &[]);
        let update = dag.add(&b3);
        assert!(update.new_forks.is_empty());
        assert!(dag.index.highest(&b3.id()).unwrap().is_fork(&v(1)));
    }

    #[test]
    fn test_fork_from_shared_self_parent() {
        let mut dag = Dag::new();
        let a1 = genesis(1);
        dag.add(&a1);
        let a2 = next(&a1, &[]);
        let a2_fork = Event::builder(v(1), Seq(2))
            .self_parent(a1.id())
            .payload(b"fork".to_vec())
            .build();
        dag.add(&a2);
        dag.add(&a2_fork);
        assert_eq!(dag.index.branch_count(), 2);

        // a1 and a2' sit on different branches but never at the same seq
        let b1 = Event::builder(v(2), Seq::FIRST)
            .parents([a1.id(), a2_fork.id()])
            .build();
        let update = dag.add(&b1);
        assert!(update.new_forks.is_empty());

        let c1 = Event::builder(v(3), Seq::FIRST)
            .parents([a2.id(), a2_fork.id()])
            .build();
        let update = dag.add(&c1);
        assert_eq!(update.new_forks, vec![v(1)]);
    }

    #[test]
    fn test_new_epoch_is_not_a_fork() {
        let mut dag = Dag::new();
        let a1 = genesis(1);
        let a1_next_epoch = Event::builder(v(1), Seq::FIRST).epoch(Epoch(2)).build();
        dag.add(&a1);
        dag.add(&a1_next_epoch);

        let b1 = Event::builder(v(2), Seq::FIRST)
            .parents([a1.id(), a1_next_epoch.id()])
            .build();
        let update = dag.add(&b1);
        assert!(update.new_forks.is_empty());
        assert!(!dag.index.highest(&b1.id()).unwrap().is_fork(&v(1)));
    }

    #[test]
    fn test_insert_errors_leave_index_untouched() {
        let mut dag = Dag::new();
        let a1 = genesis(1);
        let b1 = genesis(2);
        dag.add(&a1);

        assert!(matches!(
            dag.index.insert(&a1, &dag.store),
            Err(LachesisError::DuplicateEvent(_))
        ));

        let orphan = next(&a1, &[&b1]);
        assert!(matches!(
            dag.index.insert(&orphan, &dag.store),
            Err(LachesisError::MissingParent(id)) if id == b1.id()
        ));

        dag.add(&b1);
        let stolen = Event::builder(v(2), Seq(2)).self_parent(a1.id()).build();
        assert!(matches!(
            dag.index.insert(&stolen, &dag.store),
            Err(LachesisError::InvalidEvent(_))
        ));

        let skipped = Event::builder(v(1), Seq(3)).self_parent(a1.id()).build();
        assert!(dag.index.insert(&skipped, &dag.store).is_err());

        assert_eq!(dag.index.len(), 2);
        assert_eq!(dag.index.branch_count(), 2);
    }
}
