//! Tracing subscriber setup

use lachesis_consensus::ConsensusEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Returns false if a subscriber
/// was already installed, which leaves the existing one in place.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Log every consensus notification until the sending engine is dropped.
/// The task resolves to the number of notifications seen.
pub fn spawn_event_logger(mut events: mpsc::Receiver<ConsensusEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut seen = 0;
        while let Some(event) = events.recv().await {
            match event {
                ConsensusEvent::RootCreated(id, frame) => {
                    debug!("Root {} created in frame {}", id, frame)
                }
                ConsensusEvent::FrameDecided(decision) => {
                    info!("Frame {} atropos {}", decision.frame, decision.atropos)
                }
                ConsensusEvent::ForkDetected(validator) => {
                    warn!("Validator {} is forking", validator)
                }
            }
            seen += 1;
        }
        seen
    })
}
