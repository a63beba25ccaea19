//! Effective-dated, bidirectional grade conversion through the reference scale.
//!
//! Rules are looked up from a [`RuleStore`], narrowed by one pure selection
//! function, and applied as plain token maps. Registration keeps the versions
//! of each `(system, country, direction)` tuple from overlapping.

mod config;
pub mod domain;
mod engine;
mod error;
mod projection;
pub(crate) mod selection;
pub mod store;
pub(crate) mod validation;

#[cfg(test)]
mod tests;

pub use config::{ConversionConfig, DEFAULT_REFERENCE_SYSTEM};
pub use domain::{
    ConversionRule, CountryCode, CountryScope, Direction, GradeRange, LevelStage, RuleCriteria,
    RuleDraft, RuleId, RuleKey, SystemCode, ANY_COUNTRY,
};
pub use engine::{AppliedConversion, ConversionEngine, RuleRegistration};
pub use error::ConversionError;
pub use projection::{Projection, ProjectionRequest};
pub use store::{RuleStore, StoreError};
