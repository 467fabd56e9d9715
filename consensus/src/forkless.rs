//! ForklessCause relation

use crate::frame::Root;
use crate::validator::ValidatorSet;
use lachesis_core::{EventId, Weight};
use lachesis_dag::VectorIndex;

/// Evaluates ForklessCause over the vector index.
///
/// `A` forkless-causes `B` when a supermajority of validators, excluding
/// those `A` has seen forking, have a branch whose lowest observer of `B`
/// is already within `A`'s history.
#[derive(Clone, Copy)]
pub struct ForklessCause<'a> {
    index: &'a VectorIndex,
    validators: &'a ValidatorSet,
}

impl<'a> ForklessCause<'a> {
    pub fn new(index: &'a VectorIndex, validators: &'a ValidatorSet) -> Self {
        Self { index, validators }
    }

    pub fn check(&self, a: &EventId, b: &EventId) -> bool {
        let (Some(a_highest), Some(b_lowest), Some(b_creator)) = (
            self.index.highest(a),
            self.index.lowest(b),
            self.index.creator_of(b),
        ) else {
            return false;
        };

        if a_highest.is_fork(&b_creator) {
            return false;
        }

        let total = self
            .validators
            .total_weight()
            .saturating_sub(self.forked_weight(a));
        let mut yes = self.validators.counter_with_total(total);

        for validator in self.validators.iter() {
            if a_highest.is_fork(&validator.id) {
                continue;
            }
            let reached = self.index.branches_of(&validator.id).iter().any(|branch| {
                let after = b_lowest.get(*branch).seq;
                !after.is_none() && after <= a_highest.get(*branch).seq
            });
            if reached {
                yes.count(validator.id);
            }
        }

        yes.has_quorum()
    }

    /// True if `event` forkless-causes roots of a quorum of validators
    pub fn by_quorum_on(&self, event: &EventId, roots: &[Root]) -> bool {
        let mut counter = self.validators.new_counter();
        for root in roots {
            if self.check(event, &root.id) {
                counter.count(root.creator);
            }
        }
        counter.has_quorum()
    }

    /// Weight of the validators `event` has seen forking
    pub fn forked_weight(&self, event: &EventId) -> Weight {
        self.index
            .highest(event)
            .map(|h| h.forks().map(|v| self.validators.weight_of(v)).sum())
            .unwrap_or(0)
    }
}
