//! Validator set management

use crate::vote::WeightCounter;
use lachesis_core::{ConsensusConfig, LachesisError, LachesisResult, ValidatorId, Weight};
use std::collections::HashMap;

/// Validator information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorInfo {
    pub id: ValidatorId,
    pub weight: Weight,
}

impl ValidatorInfo {
    pub fn new(id: ValidatorId, weight: Weight) -> Self {
        Self { id, weight }
    }
}

/// Strict supermajority of `total`: more than two thirds
pub fn quorum_of(total: Weight) -> Weight {
    (total as u128 * 2 / 3) as Weight + 1
}

/// Ordered, weighted validator set.
///
/// Iteration follows insertion order, which makes every weighted decision
/// that walks the set deterministic.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: Vec<ValidatorInfo>,
    index: HashMap<ValidatorId, usize>,
    total_weight: Weight,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial validators
    pub fn with_validators(validators: Vec<ValidatorInfo>) -> LachesisResult<Self> {
        let mut set = Self::new();
        for v in validators {
            set.add_validator(v.id, v.weight)?;
        }
        Ok(set)
    }

    pub fn from_config(config: &ConsensusConfig) -> LachesisResult<Self> {
        Self::with_validators(
            config
                .validators
                .iter()
                .map(|v| ValidatorInfo::new(v.id, v.weight))
                .collect(),
        )
    }

    /// Add a validator; fails if the id is already present or the total
    /// weight would overflow. The set is unchanged on failure.
    pub fn add_validator(&mut self, id: ValidatorId, weight: Weight) -> LachesisResult<()> {
        if self.index.contains_key(&id) {
            return Err(LachesisError::DuplicateValidator(id));
        }
        let total = self
            .total_weight
            .checked_add(weight)
            .ok_or(LachesisError::WeightOverflow(id))?;
        self.index.insert(id, self.validators.len());
        self.validators.push(ValidatorInfo::new(id, weight));
        self.total_weight = total;
        Ok(())
    }

    pub fn contains(&self, id: &ValidatorId) -> bool {
        self.index.contains_key(id)
    }

    /// Weight of a validator, zero if unknown
    pub fn weight_of(&self, id: &ValidatorId) -> Weight {
        self.index
            .get(id)
            .map(|&i| self.validators[i].weight)
            .unwrap_or(0)
    }

    pub fn total_weight(&self) -> Weight {
        self.total_weight
    }

    /// Weight required for a supermajority of the whole set
    pub fn quorum(&self) -> Weight {
        quorum_of(self.total_weight)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidatorInfo> {
        self.validators.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.validators.iter().map(|v| v.id)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Fresh counter against the full set's quorum
    pub fn new_counter(&self) -> WeightCounter<'_> {
        WeightCounter::new(self, self.quorum())
    }

    /// Fresh counter against a reduced total (forked weight excluded)
    pub fn counter_with_total(&self, total: Weight) -> WeightCounter<'_> {
        WeightCounter::new(self, quorum_of(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lachesis_core::ValidatorConfig;

    fn v(n: u32) -> ValidatorId {
        ValidatorId(n)
    }

    #[test]
    fn test_validator_set() {
        let set = ValidatorSet::with_validators(vec![
            ValidatorInfo::new(v(1), 1000),
            ValidatorInfo::new(v(2), 2000),
            ValidatorInfo::new(v(3), 3000),
        ])
        .unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.total_weight(), 6000);
        assert_eq!(set.quorum(), 4001);
        assert_eq!(set.weight_of(&v(2)), 2000);
        assert_eq!(set.weight_of(&v(9)), 0);
        assert!(set.contains(&v(1)));
        assert_eq!(set.ids().collect::<Vec<_>>(), vec![v(1), v(2), v(3)]);
    }

    #[test]
    fn test_quorum_rule() {
        assert_eq!(quorum_of(4), 3);
        assert_eq!(quorum_of(3), 3);
        assert_eq!(quorum_of(6), 5);
        assert_eq!(quorum_of(0), 1);
        assert_eq!(quorum_of(Weight::MAX), Weight::MAX / 3 * 2 + 1);
    }

    #[test]
    fn test_duplicate_validator_rejected() {
        let mut set = ValidatorSet::new();
        set.add_validator(v(1), 1).unwrap();
        assert!(matches!(
            set.add_validator(v(1), 5),
            Err(LachesisError::DuplicateValidator(id)) if id == v(1)
        ));
        assert_eq!(set.total_weight(), 1);
    }

    #[test]
    fn test_weight_overflow_rejected() {
        let mut set = ValidatorSet::new();
        set.add_validator(v(1), Weight::MAX).unwrap();
        assert!(matches!(
            set.add_validator(v(2), 1),
            Err(LachesisError::WeightOverflow(id)) if id == v(2)
        ));
        assert_eq!(set.len(), 1);
        assert!(!set.contains(&v(2)));
        assert_eq!(set.total_weight(), Weight::MAX);

        let config = ConsensusConfig {
            validators: vec![
                ValidatorConfig { id: v(1), weight: Weight::MAX },
                ValidatorConfig { id: v(2), weight: 1 },
            ],
        };
        assert!(matches!(
            ValidatorSet::from_config(&config),
            Err(LachesisError::WeightOverflow(_))
        ));
    }

    #[test]
    fn test_from_config_keeps_order() {
        let config = ConsensusConfig {
            validators: vec![
                ValidatorConfig { id: v(7), weight: 2 },
                ValidatorConfig { id: v(3), weight: 1 },
            ],
        };
        let set = ValidatorSet::from_config(&config).unwrap();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec![v(7), v(3)]);
    }
}
