//! Error types for Lachesis

use crate::types::{EventId, ValidatorId};
use thiserror::Error;

/// Main error type for Lachesis
///
/// Forks and undecided elections are deliberately absent: both are regular
/// consensus state, not failures.
#[derive(Error, Debug)]
pub enum LachesisError {
    // ============ Event Errors ============
    #[error("Missing parent event {0}")]
    MissingParent(EventId),

    #[error("Duplicate event {0}")]
    DuplicateEvent(EventId),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    // ============ Validator Errors ============
    #[error("Unknown validator {0}")]
    InvalidValidator(ValidatorId),

    #[error("Validator {0} is already registered")]
    DuplicateValidator(ValidatorId),

    #[error("Total weight overflows when adding validator {0}")]
    WeightOverflow(ValidatorId),

    #[error("Validator set is sealed once events are processed")]
    ValidatorSetSealed,

    #[error("Validator set is empty")]
    EmptyValidatorSet,

    // ============ Ingest Errors ============
    #[error("Pending pool is full ({0} events)")]
    PendingPoolFull(usize),

    #[error("Ingest service stopped")]
    ServiceStopped,

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization failed: {0}")]
    SerializationError(String),

    // ============ General Errors ============
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LachesisError {
    /// Whether the same input may succeed later (e.g. once parents arrive)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LachesisError::MissingParent(_))
    }
}

impl From<std::io::Error> for LachesisError {
    fn from(err: std::io::Error) -> Self {
        LachesisError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for LachesisError {
    fn from(err: serde_json::Error) -> Self {
        LachesisError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash;

    #[test]
    fn test_recoverable_errors() {
        assert!(LachesisError::MissingParent(Hash::ZERO).is_recoverable());
        assert!(!LachesisError::DuplicateEvent(Hash::ZERO).is_recoverable());
        assert!(!LachesisError::InvalidValidator(ValidatorId(9)).is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = LachesisError::InvalidValidator(ValidatorId(3));
        assert_eq!(err.to_string(), "Unknown validator validator:3");
    }
}
