//! Per-event causal vectors

use lachesis_core::{EventId, Seq, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Index of a linear run of one creator's events.
///
/// Every validator gets one branch with its first event; a fork opens
/// another branch for the same creator.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchId(pub u32);

impl BranchId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch:{}", self.0)
    }
}

impl fmt::Debug for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BranchId({})", self.0)
    }
}

/// An event position on one branch. `Seq::NONE` means nothing observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BranchSeq {
    pub event: Option<EventId>,
    pub seq: Seq,
}

impl BranchSeq {
    pub fn new(event: EventId, seq: Seq) -> Self {
        Self {
            event: Some(event),
            seq,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_none()
    }
}

fn slot(seqs: &mut Vec<BranchSeq>, branch: BranchId) -> &mut BranchSeq {
    if seqs.len() <= branch.index() {
        seqs.resize(branch.index() + 1, BranchSeq::default());
    }
    &mut seqs[branch.index()]
}

/// Highest events observed by an event, per branch, and the creators whose
/// forks it has observed.
///
/// Computed once at insertion from the direct parents and never changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HighestBefore {
    seqs: Vec<BranchSeq>,
    forks: BTreeSet<ValidatorId>,
}

impl HighestBefore {
    pub fn get(&self, branch: BranchId) -> BranchSeq {
        self.seqs.get(branch.index()).copied().unwrap_or_default()
    }

    pub fn set(&mut self, branch: BranchId, value: BranchSeq) {
        *slot(&mut self.seqs, branch) = value;
    }

    /// Keep the more advanced entry per branch and inherit fork flags
    pub fn merge(&mut self, other: &HighestBefore) {
        for (i, theirs) in other.seqs.iter().enumerate() {
            if theirs.is_empty() {
                continue;
            }
            let mine = slot(&mut self.seqs, BranchId(i as u32));
            if theirs.seq > mine.seq {
                *mine = *theirs;
            }
        }
        self.forks.extend(other.forks.iter().copied());
    }

    pub fn is_fork(&self, creator: &ValidatorId) -> bool {
        self.forks.contains(creator)
    }

    /// Flag a creator as forked; returns false if it already was
    pub fn mark_fork(&mut self, creator: ValidatorId) -> bool {
        self.forks.insert(creator)
    }

    pub fn forks(&self) -> impl Iterator<Item = &ValidatorId> {
        self.forks.iter()
    }

    /// Non-empty entries
    pub fn observed(&self) -> impl Iterator<Item = (BranchId, &BranchSeq)> {
        self.seqs
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(i, s)| (BranchId(i as u32), s))
    }
}

/// Lowest events, per branch, that observe an event.
///
/// Filled by forward propagation as descendants are inserted; an entry is
/// written once and never lowered afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LowestAfter {
    seqs: Vec<BranchSeq>,
}

impl LowestAfter {
    pub fn get(&self, branch: BranchId) -> BranchSeq {
        self.seqs.get(branch.index()).copied().unwrap_or_default()
    }

    /// Write the entry if the branch has none yet
    pub fn set_if_empty(&mut self, branch: BranchId, value: BranchSeq) -> bool {
        let entry = slot(&mut self.seqs, branch);
        if !entry.is_empty() {
            return false;
        }
        *entry = value;
        true
    }

    pub fn observed(&self) -> impl Iterator<Item = (BranchId, &BranchSeq)> {
        self.seqs
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(i, s)| (BranchId(i as u32), s))
    }
}

/// Most advanced event of a validator reachable from some event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HighestObserved {
    pub event: EventId,
    pub seq: Seq,
    pub is_fork: bool,
}

/// Least advanced event of a validator that observes some event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LowestObserving {
    pub event: EventId,
    pub seq: Seq,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lachesis_core::Hash;

    fn id(n: u8) -> EventId {
        Hash([n; 32])
    }

    #[test]
    fn test_highest_merge_keeps_higher_seq() {
        let mut a = HighestBefore::default();
        a.set(BranchId(0), BranchSeq::new(id(1), Seq(3)));
        a.set(BranchId(2), BranchSeq::new(id(2), Seq(1)));

        let mut b = HighestBefore::default();
        b.set(BranchId(0), BranchSeq::new(id(3), Seq(2)));
        b.set(BranchId(1), BranchSeq::new(id(4), Seq(5)));
        b.mark_fork(ValidatorId(7));

        a.merge(&b);

        assert_eq!(a.get(BranchId(0)).seq, Seq(3));
        assert_eq!(a.get(BranchId(1)).event, Some(id(4)));
        assert_eq!(a.get(BranchId(2)).seq, Seq(1));
        assert!(a.get(BranchId(9)).is_empty());
        assert!(a.is_fork(&ValidatorId(7)));
        assert_eq!(a.observed().count(), 3);
    }

    #[test]
    fn test_mark_fork_is_sticky() {
        let mut h = HighestBefore::default();
        assert!(h.mark_fork(ValidatorId(1)));
        assert!(!h.mark_fork(ValidatorId(1)));
        assert_eq!(h.forks().count(), 1);
    }

    #[test]
    fn test_lowest_written_once() {
        let mut l = LowestAfter::default();
        assert!(l.set_if_empty(BranchId(3), BranchSeq::new(id(1), Seq(4))));
        assert!(!l.set_if_empty(BranchId(3), BranchSeq::new(id(2), Seq(2))));
        assert_eq!(l.get(BranchId(3)).seq, Seq(4));
        assert!(l.get(BranchId(0)).is_empty());
    }
}
