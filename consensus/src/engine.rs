//! Main consensus engine implementation

use crate::election::{Decision, Election, ElectionContext};
use crate::forkless::ForklessCause;
use crate::frame::{FrameAssigner, Root};
use crate::validator::ValidatorSet;
use lachesis_core::{
    ConsensusConfig, EventId, Frame, LachesisError, LachesisResult, ValidatorId, Weight,
};
use lachesis_dag::{
    Event, EventStore, HighestObserved, LowestObserving, MemoryEventStore, VectorIndex,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events emitted by the consensus engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusEvent {
    /// An event became a root
    RootCreated(EventId, Frame),
    /// A frame got its Atropos
    FrameDecided(Decision),
    /// First observation of a validator forking
    ForkDetected(ValidatorId),
}

/// Report of a successful insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    pub frame: Frame,
    pub is_root: bool,
    /// Frames decided by this event, including cascaded decisions
    pub decided: Vec<Decision>,
}

/// The Lachesis consensus core: DAG vectors, frames and election.
///
/// Mutation takes `&mut self`; callers serialize insertions and only submit
/// events whose parents were inserted before.
pub struct Lachesis<S: EventStore = MemoryEventStore> {
    validators: ValidatorSet,
    store: S,
    index: VectorIndex,
    frames: FrameAssigner,
    election: Election,
    frame_to_decide: Frame,
    atropos: Vec<Decision>,
    cheaters: BTreeSet<ValidatorId>,
    event_tx: Option<mpsc::Sender<ConsensusEvent>>,
}

impl Lachesis<MemoryEventStore> {
    /// Create an engine over an in-memory store
    pub fn new() -> Self {
        Self::with_store(MemoryEventStore::new())
    }

    pub fn from_config(config: &ConsensusConfig) -> LachesisResult<Self> {
        let mut engine = Self::new();
        engine.validators = ValidatorSet::from_config(config)?;
        Ok(engine)
    }
}

impl Default for Lachesis<MemoryEventStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventStore> Lachesis<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            validators: ValidatorSet::new(),
            store,
            index: VectorIndex::new(),
            frames: FrameAssigner::new(),
            election: Election::new(),
            frame_to_decide: Frame::ZERO,
            atropos: Vec::new(),
            cheaters: BTreeSet::new(),
            event_tx: None,
        }
    }

    /// Set event channel
    pub fn set_event_channel(&mut self, tx: mpsc::Sender<ConsensusEvent>) {
        self.event_tx = Some(tx);
    }

    /// Add a validator; only allowed before the first event
    pub fn add_validator(&mut self, id: ValidatorId, weight: Weight) -> LachesisResult<()> {
        if !self.index.is_empty() {
            return Err(LachesisError::ValidatorSetSealed);
        }
        self.validators.add_validator(id, weight)
    }

    /// Insert an event whose parents are all known.
    ///
    /// Computes its vectors and frame, runs the election if it is a root and
    /// reports every frame decided as a result.
    pub fn insert_event(&mut self, event: Event) -> LachesisResult<Inserted> {
        if self.validators.is_empty() {
            return Err(LachesisError::EmptyValidatorSet);
        }

        let id = event.id();
        if self.index.contains(&id) {
            debug!("Duplicate event {}", id);
            return Err(LachesisError::DuplicateEvent(id));
        }
        if !self.validators.contains(&event.creator()) {
            return Err(LachesisError::InvalidValidator(event.creator()));
        }
        event.validate_structure()?;

        let update = self.index.insert(&event, &self.store)?;
        let event = Arc::new(event);
        self.store.put(event.clone());

        for creator in update.new_forks {
            if self.cheaters.insert(creator) {
                warn!("Fork detected: {} observed by event {}", creator, id);
                self.emit_event(ConsensusEvent::ForkDetected(creator));
            }
        }

        let cause = ForklessCause::new(&self.index, &self.validators);
        let assignment = self.frames.assign(&event, &cause)?;

        let mut decided = Vec::new();
        if assignment.is_root {
            debug!(
                "Event {} by {} is a root of {}",
                id,
                event.creator(),
                assignment.frame
            );
            self.emit_event(ConsensusEvent::RootCreated(id, assignment.frame));

            let root = Root {
                id,
                creator: event.creator(),
                frame: assignment.frame,
            };
            let mut result = self.elect(&root);
            while let Some(decision) = result.take() {
                self.on_decided(decision);
                decided.push(decision);
                // Known roots vote again for the next frame
                for known in self.frames.roots_above(self.frame_to_decide) {
                    result = self.elect(&known);
                    if result.is_some() {
                        break;
                    }
                }
            }
        }

        Ok(Inserted {
            frame: assignment.frame,
            is_root: assignment.is_root,
            decided,
        })
    }

    fn elect(&mut self, root: &Root) -> Option<Decision> {
        let ctx = EngineContext {
            validators: &self.validators,
            frames: &self.frames,
            cause: ForklessCause::new(&self.index, &self.validators),
        };
        self.election.process_root(root, self.frame_to_decide, &ctx)
    }

    fn on_decided(&mut self, decision: Decision) {
        info!(
            "Frame {} decided: atropos {}",
            decision.frame, decision.atropos
        );
        self.atropos.push(decision);
        self.frame_to_decide = decision.frame.next();
        self.election.reset();
        self.emit_event(ConsensusEvent::FrameDecided(decision));
    }

    fn emit_event(&self, event: ConsensusEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.try_send(event);
        }
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn roots(&self, frame: Frame) -> &[Root] {
        self.frames.roots(frame)
    }

    pub fn frame(&self, id: &EventId) -> Option<Frame> {
        self.frames.frame(id)
    }

    pub fn is_root(&self, id: &EventId) -> bool {
        self.frames.is_root(id)
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.frames.last_frame()
    }

    pub fn is_decided(&self, frame: Frame) -> bool {
        frame < self.frame_to_decide
    }

    /// Earliest frame without an Atropos
    pub fn frame_to_decide(&self) -> Frame {
        self.frame_to_decide
    }

    /// Decided frames in order
    pub fn atropos_sequence(&self) -> &[Decision] {
        &self.atropos
    }

    pub fn highest_observed(
        &self,
        id: &EventId,
        validator: &ValidatorId,
    ) -> Option<HighestObserved> {
        self.index.highest_observed(id, validator)
    }

    pub fn lowest_observing(
        &self,
        id: &EventId,
        validator: &ValidatorId,
    ) -> Option<LowestObserving> {
        self.index.lowest_observing(id, validator)
    }

    pub fn forkless_cause(&self, a: &EventId, b: &EventId) -> bool {
        ForklessCause::new(&self.index, &self.validators).check(a, b)
    }

    /// Validators seen forking, in validator set order
    pub fn cheaters(&self) -> Vec<ValidatorId> {
        self.validators
            .ids()
            .filter(|id| self.cheaters.contains(id))
            .collect()
    }

    pub fn event(&self, id: &EventId) -> Option<Arc<Event>> {
        self.store.get(id)
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.index.contains(id)
    }

    /// Number of inserted events
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Election view over the engine's DAG state
struct EngineContext<'a> {
    validators: &'a ValidatorSet,
    frames: &'a FrameAssigner,
    cause: ForklessCause<'a>,
}

impl ElectionContext for EngineContext<'_> {
    fn validators(&self) -> &ValidatorSet {
        self.validators
    }

    fn roots(&self, frame: Frame) -> &[Root] {
        self.frames.roots(frame)
    }

    fn forkless_cause(&self, a: &EventId, b: &EventId) -> bool {
        self.cause.check(a, b)
    }

    fn forked_weight(&self, root: &EventId) -> Weight {
        self.cause.forked_weight(root)
    }
}

/// Create consensus event channel
pub fn create_consensus_channel(
    capacity: usize,
) -> (mpsc::Sender<ConsensusEvent>, mpsc::Receiver<ConsensusEvent>) {
    mpsc::channel(capacity)
}
