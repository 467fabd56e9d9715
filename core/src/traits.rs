//! Core traits shared across Lachesis crates

use crate::types::*;

/// Result type for Lachesis operations
pub type LachesisResult<T> = Result<T, crate::error::LachesisError>;

/// Trait for hashable types
pub trait Hashable {
    /// Compute the hash of this object
    fn hash(&self) -> Hash;
}
