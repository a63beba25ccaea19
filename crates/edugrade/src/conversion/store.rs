use chrono::NaiveDate;

use super::domain::{ConversionRule, CountryScope, Direction, RuleId, SystemCode};

/// Backing storage for conversion rules so the engine can be exercised in isolation.
pub trait RuleStore: Send + Sync {
    /// All rules for `system` and `direction` whose country is either `country`
    /// itself or the `ANY` wildcard. Ordering is not significant.
    fn find_rules(
        &self,
        system: &SystemCode,
        country: &CountryScope,
        direction: Direction,
    ) -> Result<Vec<ConversionRule>, StoreError>;

    fn insert_rule(&self, rule: ConversionRule) -> Result<ConversionRule, StoreError>;

    fn update_rule_validity(
        &self,
        id: &RuleId,
        valid_to: Option<NaiveDate>,
    ) -> Result<(), StoreError>;
}

/// Error enumeration for rule storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("rule already exists")]
    Conflict,
    #[error("rule not found")]
    NotFound,
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
}
