//! Weighted counting and election votes

use crate::frame::Root;
use crate::validator::ValidatorSet;
use lachesis_core::{EventId, ValidatorId, Weight};
use std::collections::HashSet;

/// Accumulates validator weight toward a quorum, each validator once.
#[derive(Debug)]
pub struct WeightCounter<'a> {
    validators: &'a ValidatorSet,
    already: HashSet<ValidatorId>,
    quorum: Weight,
    sum: Weight,
}

impl<'a> WeightCounter<'a> {
    pub fn new(validators: &'a ValidatorSet, quorum: Weight) -> Self {
        Self {
            validators,
            already: HashSet::new(),
            quorum,
            sum: 0,
        }
    }

    /// Add a validator's weight; returns false if it was already counted
    /// or is not part of the set
    pub fn count(&mut self, id: ValidatorId) -> bool {
        if !self.validators.contains(&id) || !self.already.insert(id) {
            return false;
        }
        self.sum += self.validators.weight_of(&id);
        true
    }

    pub fn has_quorum(&self) -> bool {
        self.sum >= self.quorum
    }

    pub fn sum_weight(&self) -> Weight {
        self.sum
    }

    pub fn quorum(&self) -> Weight {
        self.quorum
    }
}

/// Key of a vote: which root voted about which validator's candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoteId {
    pub from_root: EventId,
    pub for_validator: ValidatorId,
}

/// A root's opinion on whether a validator's candidate becomes Atropos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteValue {
    pub decided: bool,
    pub yes: bool,
    pub candidate: Option<Root>,
}
