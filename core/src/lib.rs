//! Lachesis Core Library
//!
//! Identifiers, error taxonomy, configuration and shared traits used by the
//! DAG, consensus and node crates.

pub mod types;
pub mod traits;
pub mod error;
pub mod config;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use config::*;
