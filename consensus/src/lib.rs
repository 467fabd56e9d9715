//! Lachesis consensus
//!
//! Virtual voting over the event DAG:
//! - Weighted supermajority counting over a fixed validator set
//! - Fork-tolerant ForklessCause relation
//! - Frame assignment and root registration
//! - Atropos election per frame

pub mod election;
pub mod engine;
pub mod forkless;
pub mod frame;
pub mod validator;
pub mod vote;

pub use election::*;
pub use engine::*;
pub use forkless::*;
pub use frame::*;
pub use validator::*;
pub use vote::*;
