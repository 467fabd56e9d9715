//! Configuration types for Lachesis

use crate::error::LachesisError;
use crate::traits::LachesisResult;
use crate::types::{ValidatorId, Weight};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name for logging
    pub name: String,

    /// Logging level (overridden by RUST_LOG)
    pub log_level: String,

    /// Consensus configuration
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Ingest queue configuration
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "lachesis-node".to_string(),
            log_level: "info".to_string(),
            consensus: ConsensusConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from JSON
    pub fn from_json(json: &str) -> LachesisResult<Self> {
        let config: NodeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: &Path) -> LachesisResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save to JSON
    pub fn to_json(&self) -> LachesisResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> LachesisResult<()> {
        if self.name.trim().is_empty() {
            return Err(LachesisError::ConfigError("node name is empty".into()));
        }
        self.consensus.validate()?;
        self.ingest.validate()
    }
}

/// Validator entry of the consensus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub id: ValidatorId,
    pub weight: Weight,
}

/// Consensus configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Fixed validator set, in order
    pub validators: Vec<ValidatorConfig>,
}

impl ConsensusConfig {
    /// Equal-weight validators with ids `1..=count`
    pub fn uniform(count: u32, weight: Weight) -> Self {
        Self {
            validators: (1..=count)
                .map(|id| ValidatorConfig {
                    id: ValidatorId(id),
                    weight,
                })
                .collect(),
        }
    }

    pub fn validate(&self) -> LachesisResult<()> {
        let mut seen = HashSet::new();
        for v in &self.validators {
            if !seen.insert(v.id) {
                return Err(LachesisError::ConfigError(format!(
                    "validator {} listed twice",
                    v.id
                )));
            }
        }
        Ok(())
    }
}

/// Ingest queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Capacity of the submission queue
    pub queue_capacity: usize,

    /// Maximum events waiting for parents
    pub max_pending_events: usize,

    /// Capacity of the consensus notification channel
    pub event_channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_pending_events: 10_000,
            event_channel_capacity: 100,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> LachesisResult<()> {
        if self.queue_capacity == 0 {
            return Err(LachesisError::ConfigError("queue_capacity must be > 0".into()));
        }
        if self.max_pending_events == 0 {
            return Err(LachesisError::ConfigError(
                "max_pending_events must be > 0".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(LachesisError::ConfigError(
                "event_channel_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}
