//! Atropos election by virtual voting
//!
//! Roots of frame `frame_to_decide + 1` vote yes for every root of the frame
//! being decided that they forkless-cause. Roots of later frames aggregate
//! the votes of the previous frame's roots they forkless-cause, until one
//! side reaches a quorum for a validator. The first validator decided yes
//! supplies the frame's Atropos.

use crate::frame::Root;
use crate::validator::ValidatorSet;
use crate::vote::{VoteId, VoteValue};
use lachesis_core::{EventId, Frame, ValidatorId, Weight};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A decided frame and its Atropos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decision {
    pub frame: Frame,
    pub atropos: EventId,
}

/// DAG queries the election needs
pub trait ElectionContext {
    fn validators(&self) -> &ValidatorSet;

    /// Roots of a frame, in insertion order
    fn roots(&self, frame: Frame) -> &[Root];

    fn forkless_cause(&self, a: &EventId, b: &EventId) -> bool;

    /// Weight of the validators `root` has seen forking
    fn forked_weight(&self, root: &EventId) -> Weight;
}

/// Election state for the current undecided frame
#[derive(Debug, Default)]
pub struct Election {
    votes: HashMap<VoteId, VoteValue>,
    decided_roots: HashMap<ValidatorId, VoteValue>,
    /// Candidates decided yes, in decision order
    sorted_decided: Vec<Root>,
}

impl Election {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all votes; called once a frame is decided
    pub fn reset(&mut self) {
        self.votes.clear();
        self.decided_roots.clear();
        self.sorted_decided.clear();
    }

    pub fn vote(&self, from_root: &EventId, for_validator: &ValidatorId) -> Option<VoteValue> {
        self.votes
            .get(&VoteId {
                from_root: *from_root,
                for_validator: *for_validator,
            })
            .copied()
    }

    pub fn is_decided(&self, validator: &ValidatorId) -> bool {
        self.decided_roots.contains_key(validator)
    }

    /// Record `new_root`'s votes and return the decision they complete.
    ///
    /// Roots at or below `frame_to_decide` take no part.
    pub fn process_root<C: ElectionContext + ?Sized>(
        &mut self,
        new_root: &Root,
        frame_to_decide: Frame,
        ctx: &C,
    ) -> Option<Decision> {
        let round = match new_root.frame.distance_from(frame_to_decide) {
            Some(round) if round > 0 => round,
            _ => return None,
        };
        let prev_roots: Vec<Root> = ctx
            .roots(new_root.frame.prev()?)
            .iter()
            .filter(|root| ctx.forkless_cause(&new_root.id, &root.id))
            .copied()
            .collect();

        let validators = ctx.validators();
        let total = validators
            .total_weight()
            .saturating_sub(ctx.forked_weight(&new_root.id));

        for subject in validators.ids() {
            if self.decided_roots.contains_key(&subject) {
                continue;
            }

            let vote = if round == 1 {
                let candidate = prev_roots.iter().find(|r| r.creator == subject).copied();
                VoteValue {
                    decided: false,
                    yes: candidate.is_some(),
                    candidate,
                }
            } else {
                self.aggregate(subject, &prev_roots, validators, total)
            };

            if vote.decided {
                debug!(
                    "Election for {}: {} decided {}",
                    frame_to_decide,
                    subject,
                    if vote.yes { "yes" } else { "no" }
                );
                self.decided_roots.insert(subject, vote);
                if let (true, Some(candidate)) = (vote.yes, vote.candidate) {
                    self.sorted_decided.push(candidate);
                }
            }

            self.votes.insert(
                VoteId {
                    from_root: new_root.id,
                    for_validator: subject,
                },
                vote,
            );
        }

        self.sorted_decided.first().map(|atropos| Decision {
            frame: atropos.frame,
            atropos: atropos.id,
        })
    }

    /// Weigh the votes of `prev_roots` about `subject`; ties go to yes
    fn aggregate(
        &self,
        subject: ValidatorId,
        prev_roots: &[Root],
        validators: &ValidatorSet,
        total: Weight,
    ) -> VoteValue {
        let mut yes = validators.counter_with_total(total);
        let mut no = validators.counter_with_total(total);
        let mut candidate = None;

        for prev in prev_roots {
            match self.vote(&prev.id, &subject) {
                Some(vote) if vote.yes => {
                    yes.count(prev.creator);
                    candidate = candidate.or(vote.candidate);
                }
                // Unrecorded votes count as no
                _ => {
                    no.count(prev.creator);
                }
            }
        }

        let is_yes = yes.sum_weight() >= no.sum_weight();
        VoteValue {
            decided: yes.has_quorum() || no.has_quorum(),
            yes: is_yes,
            candidate: if is_yes { candidate } else { None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidatorInfo;
    use lachesis_core::Hash;
    use std::collections::{BTreeMap, HashSet};

    /// Hand-built root graph with an explicit ForklessCause relation
    struct MockContext {
        validators: ValidatorSet,
        roots: BTreeMap<Frame, Vec<Root>>,
        causes: HashSet<(EventId, EventId)>,
        forked: HashMap<EventId, Weight>,
    }

    impl MockContext {
        fn new(count: u32) -> Self {
            Self {
                validators: ValidatorSet::with_validators(
                    (1..=count)
                        .map(|n| ValidatorInfo::new(ValidatorId(n), 1))
                        .collect(),
                )
                .unwrap(),
                roots: BTreeMap::new(),
                causes: HashSet::new(),
                forked: HashMap::new(),
            }
        }

        fn root(frame: u32, creator: u32) -> Root {
            let mut bytes = [0u8; 32];
            bytes[0] = frame as u8;
            bytes[1] = creator as u8;
            Root {
                id: Hash(bytes),
                creator: ValidatorId(creator),
                frame: Frame(frame),
            }
        }

        /// Register root (frame, creator) as forkless-causing the given
        /// creators' roots of the previous frame
        fn add(&mut self, frame: u32, creator: u32, causes: &[u32]) -> Root {
            let root = Self::root(frame, creator);
            for target in causes {
                self.causes
                    .insert((root.id, Self::root(frame - 1, *target).id));
            }
            self.roots.entry(Frame(frame)).or_default().push(root);
            root
        }

        fn add_frame_zero(&mut self) {
            for creator in 1..=self.validators.len() as u32 {
                let root = Self::root(0, creator);
                self.roots.entry(Frame::ZERO).or_default().push(root);
            }
        }
    }

    impl ElectionContext for MockContext {
        fn validators(&self) -> &ValidatorSet {
            &self.validators
        }

        fn roots(&self, frame: Frame) -> &[Root] {
            self.roots.get(&frame).map(Vec::as_slice).unwrap_or(&[])
        }

        fn forkless_cause(&self, a: &EventId, b: &EventId) -> bool {
            self.causes.contains(&(*a, *b))
        }

        fn forked_weight(&self, root: &EventId) -> Weight {
            self.forked.get(root).copied().unwrap_or(0)
        }
    }

    #[test]
    fn test_round_one_votes_for_observed_roots() {
        let mut ctx = MockContext::new(4);
        ctx.add_frame_zero();
        let r = ctx.add(1, 1, &[1, 2, 4]);

        let mut election = Election::new();
        assert_eq!(election.process_root(&r, Frame::ZERO, &ctx), None);

        let yes = election.vote(&r.id, &ValidatorId(2)).unwrap();
        assert!(yes.yes && !yes.decided);
        assert_eq!(yes.candidate, Some(MockContext::root(0, 2)));

        let no = election.vote(&r.id, &ValidatorId(3)).unwrap();
        assert!(!no.yes);
        assert_eq!(no.candidate, None);
    }

    #[test]
    fn test_three_of_four_decides() {
        let mut ctx = MockContext::new(4);
        ctx.add_frame_zero();
        let mut election = Election::new();
        for creator in 1..=4 {
            let r = ctx.add(1, creator, &[1, 2, 3, 4]);
            assert_eq!(election.process_root(&r, Frame::ZERO, &ctx), None);
        }

        let r = ctx.add(2, 1, &[1, 2, 3]);
        let decision = election.process_root(&r, Frame::ZERO, &ctx);
        assert_eq!(
            decision,
            Some(Decision {
                frame: Frame::ZERO,
                atropos: MockContext::root(0, 1).id,
            })
        );
        assert!((1..=4).all(|n| election.is_decided(&ValidatorId(n))));
    }

    #[test]
    fn test_split_vote_stays_undecided() {
        let mut ctx = MockContext::new(4);
        ctx.add_frame_zero();
        let mut election = Election::new();

        // Two frame-1 roots observe every candidate, two observe none
        let observed: [&[u32]; 4] = [&[1, 2, 3, 4], &[1, 2, 3, 4], &[], &[]];
        for (creator, causes) in (1..=4).zip(observed) {
            let r = ctx.add(1, creator, causes);
            election.process_root(&r, Frame::ZERO, &ctx);
        }

        for creator in 1..=4 {
            let r = ctx.add(2, creator, &[1, 2, 3, 4]);
            assert_eq!(election.process_root(&r, Frame::ZERO, &ctx), None);
            // Tie goes to yes, without a quorum
            let vote = election.vote(&r.id, &ValidatorId(1)).unwrap();
            assert!(vote.yes && !vote.decided);
        }
        assert!(!election.is_decided(&ValidatorId(1)));

        // The next round sees unanimous yes from frame 2
        let r = ctx.add(3, 1, &[1, 2, 3, 4]);
        let decision = election.process_root(&r, Frame::ZERO, &ctx).unwrap();
        assert_eq!(decision.frame, Frame::ZERO);
        assert_eq!(decision.atropos, MockContext::root(0, 1).id);
    }

    #[test]
    fn test_decided_no_is_skipped_for_atropos() {
        let mut ctx = MockContext::new(4);
        ctx.add_frame_zero();
        let mut election = Election::new();
        // Nobody observed validator 1's frame-0 root
        for creator in 1..=4 {
            let r = ctx.add(1, creator, &[2, 3, 4]);
            election.process_root(&r, Frame::ZERO, &ctx);
        }

        let r = ctx.add(2, 2, &[1, 2, 3, 4]);
        let decision = election.process_root(&r, Frame::ZERO, &ctx).unwrap();
        assert_eq!(decision.atropos, MockContext::root(0, 2).id);

        let first = election.vote(&r.id, &ValidatorId(1)).unwrap();
        assert!(first.decided && !first.yes);
    }

    #[test]
    fn test_forked_weight_lowers_decision_quorum() {
        let mut ctx = MockContext::new(5);
        ctx.add_frame_zero();
        let mut election = Election::new();
        for creator in 1..=3 {
            let r = ctx.add(1, creator, &[1, 2, 3]);
            election.process_root(&r, Frame::ZERO, &ctx);
        }

        // Validators 4 and 5 forked: quorum drops from 4 of 5 to 3 of 3
        let r = ctx.add(2, 1, &[1, 2]);
        ctx.forked.insert(r.id, 2);
        assert_eq!(election.process_root(&r, Frame::ZERO, &ctx), None);

        let r = ctx.add(2, 2, &[1, 2, 3]);
        ctx.forked.insert(r.id, 2);
        let decision = election.process_root(&r, Frame::ZERO, &ctx).unwrap();
        assert_eq!(decision.atropos, MockContext::root(0, 1).id);
    }

    #[test]
    fn test_roots_of_decided_frames_are_ignored() {
        let mut ctx = MockContext::new(4);
        ctx.add_frame_zero();
        let r = ctx.add(1, 1, &[1, 2, 3, 4]);

        let mut election = Election::new();
        assert_eq!(election.process_root(&r, Frame(1), &ctx), None);
        assert_eq!(election.process_root(&r, Frame(2), &ctx), None);
        assert!(election.vote(&r.id, &ValidatorId(1)).is_none());

        election.process_root(&r, Frame::ZERO, &ctx);
        assert!(election.vote(&r.id, &ValidatorId(1)).is_some());
        election.reset();
        assert!(election.vote(&r.id, &ValidatorId(1)).is_none());
    }
}
