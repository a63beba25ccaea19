use chrono::NaiveDate;

use super::domain::{CountryScope, Direction, LevelStage, RuleId, SystemCode};
use super::store::StoreError;
use crate::catalog::CatalogError;

/// Failures surfaced by the conversion engine. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error(
        "no conversion rule for {system} ({country}, {direction}) at level {level_stage} on {as_of}"
    )]
    NoApplicableRule {
        system: SystemCode,
        country: CountryScope,
        direction: Direction,
        level_stage: LevelStage,
        as_of: NaiveDate,
    },
    #[error(
        "conflicting active rules for {system} ({country}, {direction}) on {as_of}: {}",
        join_ids(.rules)
    )]
    AmbiguousRule {
        system: SystemCode,
        country: CountryScope,
        direction: Direction,
        as_of: NaiveDate,
        rules: Vec<RuleId>,
    },
    #[error("value '{value}' is not convertible by rule {rule} ({system})")]
    UnmappedGrade {
        value: String,
        system: SystemCode,
        rule: RuleId,
    },
    #[error("grading system {system} is not recognized for country {country}")]
    UnsupportedSystem {
        system: SystemCode,
        country: CountryScope,
    },
    #[error("rule version overlaps {existing} for {system} ({country}, {direction})")]
    OverlappingRuleVersion {
        system: SystemCode,
        country: CountryScope,
        direction: Direction,
        existing: RuleId,
    },
    #[error("invalid conversion rule: {0}")]
    InvalidRule(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

fn join_ids(ids: &[RuleId]) -> String {
    ids.iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
