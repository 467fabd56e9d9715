//! Ingest service serializing event insertion into the consensus core

use async_trait::async_trait;
use lachesis_consensus::{
    create_consensus_channel, ConsensusEvent, Decision, Inserted, Lachesis, Root,
};
use lachesis_core::{EventId, Frame, LachesisError, LachesisResult, NodeConfig, ValidatorId};
use lachesis_dag::Event;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pending::PendingPool;

/// An event inserted into the core as part of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedEvent {
    pub id: EventId,
    pub inserted: Inserted,
}

/// What happened to a submitted event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The event and every pending event it unblocked, in insertion order
    Admitted(Vec<AdmittedEvent>),
    /// Held until these parents are inserted
    Buffered { missing: Vec<EventId> },
    /// Already inserted or already pending
    Duplicate,
}

/// Async access to an event ingest pipeline
#[async_trait]
pub trait EventIngest: Send + Sync {
    /// Submit an event in any order relative to its parents
    async fn submit(&self, event: Event) -> LachesisResult<SubmitOutcome>;

    /// Decided frames so far
    async fn atropos_sequence(&self) -> Vec<Decision>;

    /// Check if a frame is decided
    async fn is_decided(&self, frame: Frame) -> bool;
}

enum Request {
    Submit {
        event: Event,
        reply: oneshot::Sender<LachesisResult<SubmitOutcome>>,
    },
    Shutdown,
}

/// Engine and pending pool, shared between the consumer task and handles
struct IngestState {
    engine: RwLock<Lachesis>,
    pending: Mutex<PendingPool>,
}

impl IngestState {
    /// Insert `event` if its parents are known, then every pending event
    /// that becomes insertable as a consequence.
    fn admit(&self, event: Event) -> LachesisResult<SubmitOutcome> {
        let mut engine = self.engine.write();
        let mut pending = self.pending.lock();

        let id = event.id();
        if engine.contains(&id) || pending.contains(&id) {
            debug!("Duplicate submission of event {}", id);
            return Ok(SubmitOutcome::Duplicate);
        }

        let missing: Vec<EventId> = event
            .parents()
            .iter()
            .filter(|parent| !engine.contains(parent))
            .copied()
            .collect();
        if !missing.is_empty() {
            pending.insert(event, missing.iter().copied())?;
            return Ok(SubmitOutcome::Buffered { missing });
        }

        let inserted = match engine.insert_event(event) {
            Ok(inserted) => inserted,
            Err(e) => {
                if !e.is_recoverable() {
                    let evicted = pending.evict_dependents(&id);
                    if evicted > 0 {
                        warn!(
                            "Event {} rejected: {} ({} dependents dropped)",
                            id, e, evicted
                        );
                    }
                }
                return Err(e);
            }
        };
        let mut admitted = vec![AdmittedEvent { id, inserted }];

        let mut queue: VecDeque<Event> = pending.release(&id).into();
        while let Some(child) = queue.pop_front() {
            let child_id = child.id();
            match engine.insert_event(child) {
                Ok(inserted) => {
                    debug!("Admitted pending event {}", child_id);
                    admitted.push(AdmittedEvent {
                        id: child_id,
                        inserted,
                    });
                    queue.extend(pending.release(&child_id));
                }
                Err(e) => {
                    let evicted = pending.evict_dependents(&child_id);
                    warn!(
                        "Pending event {} rejected: {} ({} dependents dropped)",
                        child_id, e, evicted
                    );
                }
            }
        }

        Ok(SubmitOutcome::Admitted(admitted))
    }
}

/// Cloneable handle to a running ingest service
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<Request>,
    state: Arc<IngestState>,
}

impl IngestHandle {
    pub async fn submit(&self, event: Event) -> LachesisResult<SubmitOutcome> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Request::Submit { event, reply })
            .await
            .map_err(|_| LachesisError::ServiceStopped)?;
        response.await.map_err(|_| LachesisError::ServiceStopped)?
    }

    pub fn atropos_sequence(&self) -> Vec<Decision> {
        self.state.engine.read().atropos_sequence().to_vec()
    }

    pub fn frame(&self, id: &EventId) -> Option<Frame> {
        self.state.engine.read().frame(id)
    }

    pub fn is_decided(&self, frame: Frame) -> bool {
        self.state.engine.read().is_decided(frame)
    }

    pub fn roots(&self, frame: Frame) -> Vec<Root> {
        self.state.engine.read().roots(frame).to_vec()
    }

    pub fn cheaters(&self) -> Vec<ValidatorId> {
        self.state.engine.read().cheaters()
    }

    /// Number of inserted events
    pub fn len(&self) -> usize {
        self.state.engine.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.engine.read().is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.state.pending.lock().len()
    }

    /// Parents that pending events still wait for
    pub fn missing_parents(&self) -> Vec<EventId> {
        self.state.pending.lock().missing_parents()
    }

    /// Ask the consumer task to stop after the requests queued so far
    pub async fn shutdown(&self) -> LachesisResult<()> {
        self.tx
            .send(Request::Shutdown)
            .await
            .map_err(|_| LachesisError::ServiceStopped)
    }
}

#[async_trait]
impl EventIngest for IngestHandle {
    async fn submit(&self, event: Event) -> LachesisResult<SubmitOutcome> {
        IngestHandle::submit(self, event).await
    }

    async fn atropos_sequence(&self) -> Vec<Decision> {
        IngestHandle::atropos_sequence(self)
    }

    async fn is_decided(&self, frame: Frame) -> bool {
        IngestHandle::is_decided(self, frame)
    }
}

/// Running ingest service: one consumer task owning all insertions
pub struct IngestService {
    handle: IngestHandle,
    events: Option<mpsc::Receiver<ConsensusEvent>>,
    task: JoinHandle<()>,
}

impl IngestService {
    /// Build the engine from `config` and spawn the consumer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: NodeConfig) -> LachesisResult<Self> {
        config.validate()?;
        let mut engine = Lachesis::from_config(&config.consensus)?;
        if engine.validators().is_empty() {
            return Err(LachesisError::EmptyValidatorSet);
        }

        let (event_tx, event_rx) = create_consensus_channel(config.ingest.event_channel_capacity);
        engine.set_event_channel(event_tx);

        let state = Arc::new(IngestState {
            engine: RwLock::new(engine),
            pending: Mutex::new(PendingPool::new(config.ingest.max_pending_events)),
        });
        let (tx, mut rx) = mpsc::channel(config.ingest.queue_capacity);

        let worker = state.clone();
        let name = config.name.clone();
        let task = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    Request::Submit { event, reply } => {
                        let _ = reply.send(worker.admit(event));
                    }
                    Request::Shutdown => break,
                }
            }
            info!("Ingest service {} stopped", name);
        });

        info!(
            "Ingest service {} started with {} validators",
            config.name,
            config.consensus.validators.len()
        );

        Ok(Self {
            handle: IngestHandle { tx, state },
            events: Some(event_rx),
            task,
        })
    }

    pub fn handle(&self) -> IngestHandle {
        self.handle.clone()
    }

    /// Receiver of consensus notifications; available once
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ConsensusEvent>> {
        self.events.take()
    }

    /// Stop the consumer task and wait for it to finish
    pub async fn shutdown(self) -> LachesisResult<()> {
        self.handle.shutdown().await?;
        self.task
            .await
            .map_err(|e| LachesisError::Other(anyhow::anyhow!("ingest task failed: {}", e)))
    }
}
