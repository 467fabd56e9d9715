//! Lachesis DAG
//!
//! Sealed events, keyed event storage and the per-event causal vectors
//! (highest observed / lowest observing per branch) that the consensus layer
//! builds on.

pub mod event;
pub mod hashing;
pub mod index;
pub mod store;
pub mod vector;

pub use event::*;
pub use hashing::*;
pub use index::*;
pub use store::*;
pub use vector::*;
