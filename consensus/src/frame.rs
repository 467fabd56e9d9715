//! Frame assignment and root registry

use crate::forkless::ForklessCause;
use lachesis_core::{EventId, Frame, LachesisError, LachesisResult, ValidatorId};
use lachesis_dag::Event;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// An event that opened a frame for its creator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Root {
    pub id: EventId,
    pub creator: ValidatorId,
    pub frame: Frame,
}

/// Outcome of assigning a frame to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameAssignment {
    pub frame: Frame,
    pub is_root: bool,
}

/// Frames of all events and the roots of each frame, in insertion order
#[derive(Debug, Default)]
pub struct FrameAssigner {
    frames: HashMap<EventId, Frame>,
    roots: BTreeMap<Frame, Vec<Root>>,
    root_ids: HashSet<EventId>,
}

impl FrameAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a frame to `event`, whose self-parent must already have one.
    ///
    /// A first event starts at frame 0 as a root. Any other event inherits
    /// its self-parent's frame and moves one frame up when it forkless-causes
    /// a quorum of that frame's roots.
    pub fn assign(
        &mut self,
        event: &Event,
        cause: &ForklessCause<'_>,
    ) -> LachesisResult<FrameAssignment> {
        let id = event.id();
        if self.frames.contains_key(&id) {
            return Err(LachesisError::DuplicateEvent(id));
        }

        let assignment = match event.self_parent() {
            None => FrameAssignment {
                frame: Frame::ZERO,
                is_root: true,
            },
            Some(self_parent) => {
                let parent_frame = self
                    .frame(self_parent)
                    .ok_or(LachesisError::MissingParent(*self_parent))?;
                if cause.by_quorum_on(&id, self.roots(parent_frame)) {
                    FrameAssignment {
                        frame: parent_frame.next(),
                        is_root: true,
                    }
                } else {
                    FrameAssignment {
                        frame: parent_frame,
                        is_root: false,
                    }
                }
            }
        };

        self.frames.insert(id, assignment.frame);
        if assignment.is_root {
            self.roots.entry(assignment.frame).or_default().push(Root {
                id,
                creator: event.creator(),
                frame: assignment.frame,
            });
            self.root_ids.insert(id);
        }
        Ok(assignment)
    }

    pub fn frame(&self, id: &EventId) -> Option<Frame> {
        self.frames.get(id).copied()
    }

    pub fn roots(&self, frame: Frame) -> &[Root] {
        self.roots.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Roots of every frame above `frame`, lowest frame first
    pub fn roots_above(&self, frame: Frame) -> Vec<Root> {
        self.roots
            .range(frame.next()..)
            .flat_map(|(_, roots)| roots.iter().copied())
            .collect()
    }

    pub fn is_root(&self, id: &EventId) -> bool {
        self.root_ids.contains(id)
    }

    /// Highest frame holding a root
    pub fn last_frame(&self) -> Option<Frame> {
        self.roots.keys().next_back().copied()
    }
}
