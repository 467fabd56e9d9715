//! Lachesis Node
//!
//! Feeds events into the consensus core:
//! - Single-consumer ingest queue serializing insertions
//! - Pending pool holding events until their parents arrive
//! - Read access to frames and the Atropos sequence
//! - Logging setup

mod logging;
mod pending;
mod service;

pub use logging::*;
pub use pending::*;
pub use service::*;
