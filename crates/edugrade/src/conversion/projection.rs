use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{CountryScope, Direction, LevelStage, RuleCriteria, SystemCode};
use super::engine::{map_value, ConversionEngine};
use super::error::ConversionError;
use super::store::RuleStore;
use crate::catalog::OptionsCatalog;

/// A stored reference-scale grade to be shown in another grading system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionRequest {
    pub reference_value: String,
    pub country: CountryScope,
    pub level_stage: LevelStage,
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub display_value: String,
    pub display_system: SystemCode,
}

impl<S, C> ConversionEngine<S, C>
where
    S: RuleStore + 'static,
    C: OptionsCatalog + 'static,
{
    /// Display a reference-scale value in `target`.
    pub fn project(
        &self,
        request: &ProjectionRequest,
        target: &SystemCode,
    ) -> Result<Projection, ConversionError> {
        if target == self.reference_system() {
            return Ok(identity(request, target));
        }

        let criteria = projection_criteria(target, &request.country, request.level_stage)
            .on(request.as_of);
        let rule = self.resolve_rule(&criteria)?;
        Ok(Projection {
            display_value: map_value(&rule, &request.reference_value)?,
            display_system: target.clone(),
        })
    }

    /// Project a batch, resolving one rule per `(country, level, date)` group.
    /// Output order matches `requests`; the first failure aborts the batch.
    pub fn project_many(
        &self,
        requests: &[ProjectionRequest],
        target: &SystemCode,
    ) -> Result<Vec<Projection>, ConversionError> {
        if target == self.reference_system() {
            return Ok(requests
                .iter()
                .map(|request| identity(request, target))
                .collect());
        }

        let mut groups: BTreeMap<(&CountryScope, LevelStage, NaiveDate), Vec<usize>> =
            BTreeMap::new();
        for (index, request) in requests.iter().enumerate() {
            groups
                .entry((&request.country, request.level_stage, request.as_of))
                .or_default()
                .push(index);
        }

        let mut projected: Vec<Option<String>> = vec![None; requests.len()];
        for ((country, level_stage, as_of), indices) in groups {
            let criteria = projection_criteria(target, country, level_stage).on(as_of);
            let rule = self.resolve_rule(&criteria)?;

            for index in indices {
                projected[index] = Some(map_value(&rule, &requests[index].reference_value)?);
            }
        }

        Ok(projected
            .into_iter()
            .flatten()
            .map(|display_value| Projection {
                display_value,
                display_system: target.clone(),
            })
            .collect())
    }
}

fn projection_criteria(
    target: &SystemCode,
    country: &CountryScope,
    level_stage: LevelStage,
) -> RuleCriteria {
    RuleCriteria::new(
        target.clone(),
        country.clone(),
        Direction::FromReference,
        level_stage,
    )
}

fn identity(request: &ProjectionRequest, target: &SystemCode) -> Projection {
    Projection {
        display_value: request.reference_value.trim().to_string(),
        display_system: target.clone(),
    }
}
