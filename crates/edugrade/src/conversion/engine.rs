use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::config::ConversionConfig;
use super::domain::{
    ConversionRule, CountryScope, Direction, LevelStage, RuleCriteria, RuleDraft, RuleId, RuleKey,
    SystemCode,
};
use super::error::ConversionError;
use super::selection::{select_current, select_rule, Selection};
use super::store::RuleStore;
use super::validation::{plan_registration, validate_draft, Supersession};
use crate::catalog::OptionsCatalog;

/// Resolves grades between grading systems through the reference scale.
///
/// Conversions are pure lookups against whatever the store returns and may run
/// concurrently. Registration and closing are serialized per rule tuple.
pub struct ConversionEngine<S, C> {
    store: Arc<S>,
    catalog: Arc<C>,
    config: ConversionConfig,
    write_locks: Mutex<HashMap<RuleKey, Arc<Mutex<()>>>>,
}

static RULE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_rule_id() -> RuleId {
    let id = RULE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RuleId(format!("rule-{id:06}"))
}

/// A converted value together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedConversion {
    pub value: String,
    pub rule: ConversionRule,
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRegistration {
    pub rule: ConversionRule,
    pub superseded: Option<RuleId>,
}

impl<S, C> ConversionEngine<S, C>
where
    S: RuleStore + 'static,
    C: OptionsCatalog + 'static,
{
    pub fn new(store: Arc<S>, catalog: Arc<C>, config: ConversionConfig) -> Self {
        Self {
            store,
            catalog,
            config,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn reference_system(&self) -> &SystemCode {
        &self.config.reference_system
    }

    /// Convert `value` with the single rule matching `criteria`.
    pub fn convert(&self, value: &str, criteria: &RuleCriteria) -> Result<String, ConversionError> {
        self.convert_with_rule(value, criteria)
            .map(|applied| applied.value)
    }

    /// Like [`convert`](Self::convert), but also returns the rule that was
    /// applied, from the same store read.
    pub fn convert_with_rule(
        &self,
        value: &str,
        criteria: &RuleCriteria,
    ) -> Result<AppliedConversion, ConversionError> {
        let rule = self.resolve_rule(criteria)?;
        let value = map_value(&rule, value)?;
        Ok(AppliedConversion { value, rule })
    }

    /// Convert into the reference scale and straight back out again.
    ///
    /// The result is deterministic but not necessarily `value`: several source
    /// grades may share one reference grade.
    pub fn round_trip(
        &self,
        value: &str,
        system: &SystemCode,
        country: &CountryScope,
        level_stage: LevelStage,
        as_of: Option<NaiveDate>,
    ) -> Result<String, ConversionError> {
        let as_of = as_of.unwrap_or_else(today);
        let to_reference = RuleCriteria::new(
            system.clone(),
            country.clone(),
            Direction::ToReference,
            level_stage,
        )
        .on(as_of);

        let reference_value = self.convert(value, &to_reference)?;
        self.convert(
            &reference_value,
            &to_reference.with_direction(Direction::FromReference),
        )
    }

    /// The rule `convert` would apply for `criteria`.
    pub fn resolve_rule(&self, criteria: &RuleCriteria) -> Result<ConversionRule, ConversionError> {
        self.ensure_supported(&criteria.system, &criteria.country)?;

        let as_of = criteria.as_of.unwrap_or_else(today);
        let candidates =
            self.store
                .find_rules(&criteria.system, &criteria.country, criteria.direction)?;

        match select_rule(&candidates, criteria, as_of) {
            Selection::Selected(rule) => {
                debug!(
                    rule = %rule.id,
                    system = %criteria.system,
                    country = %criteria.country,
                    direction = %criteria.direction,
                    %as_of,
                    "conversion rule selected"
                );
                Ok(rule.clone())
            }
            Selection::NoMatch => Err(ConversionError::NoApplicableRule {
                system: criteria.system.clone(),
                country: criteria.country.clone(),
                direction: criteria.direction,
                level_stage: criteria.level_stage,
                as_of,
            }),
            Selection::Ambiguous(rules) => Err(ambiguous(criteria, as_of, rules)),
        }
    }

    /// The open-ended version covering `level_stage`, if one exists.
    pub fn current_rule(
        &self,
        system: &SystemCode,
        country: &CountryScope,
        direction: Direction,
        level_stage: LevelStage,
    ) -> Result<Option<ConversionRule>, ConversionError> {
        let criteria = RuleCriteria::new(system.clone(), country.clone(), direction, level_stage);
        let candidates = self.store.find_rules(system, country, direction)?;

        match select_current(&candidates, &criteria) {
            Selection::Selected(rule) => Ok(Some(rule.clone())),
            Selection::NoMatch => Ok(None),
            Selection::Ambiguous(rules) => Err(ambiguous(&criteria, today(), rules)),
        }
    }

    /// Every stored version for the tuple, oldest first.
    pub fn rule_history(
        &self,
        system: &SystemCode,
        country: &CountryScope,
        direction: Direction,
    ) -> Result<Vec<ConversionRule>, ConversionError> {
        let mut rules: Vec<ConversionRule> = self
            .store
            .find_rules(system, country, direction)?
            .into_iter()
            .filter(|rule| {
                &rule.system == system
                    && rule.direction == direction
                    && rule.country.serves(country)
            })
            .collect();

        rules.sort_by(|a, b| {
            a.valid_from
                .cmp(&b.valid_from)
                .then_with(|| a.grade_range.cmp(&b.grade_range))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rules)
    }

    /// Validate and insert a new rule version, superseding the version of the
    /// same tuple and grade range when the new one starts later and outlasts it.
    /// A failed insert reopens the superseded version.
    pub fn register_rule(&self, draft: RuleDraft) -> Result<RuleRegistration, ConversionError> {
        if let Err(err) = validate_draft(&draft) {
            warn!(key = %draft.key(), error = %err, "rejected conversion rule draft");
            return Err(err);
        }
        self.ensure_supported(&draft.system, &draft.country)?;

        let key = draft.key();
        let lock = self.key_lock(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self
            .store
            .find_rules(&draft.system, &draft.country, draft.direction)?;
        let plan = plan_registration(&existing, &draft)?;

        if let Some(superseded) = &plan.supersedes {
            self.store
                .update_rule_validity(&superseded.rule, Some(draft.valid_from))?;
            info!(
                %key,
                rule = %superseded.rule,
                valid_to = %draft.valid_from,
                "closed superseded conversion rule"
            );
        }

        let rule = ConversionRule::from_draft(next_rule_id(), draft, Utc::now());
        let stored = match self.store.insert_rule(rule) {
            Ok(stored) => stored,
            Err(err) => {
                if let Some(superseded) = &plan.supersedes {
                    self.reopen(&key, superseded);
                }
                return Err(err.into());
            }
        };
        info!(
            %key,
            rule = %stored.id,
            range = %stored.grade_range,
            valid_from = %stored.valid_from,
            "registered conversion rule"
        );

        Ok(RuleRegistration {
            rule: stored,
            superseded: plan.supersedes.map(|superseded| superseded.rule),
        })
    }

    /// Undo a supersession whose successor never made it into the store.
    fn reopen(&self, key: &RuleKey, superseded: &Supersession) {
        match self
            .store
            .update_rule_validity(&superseded.rule, superseded.previous_valid_to)
        {
            Ok(()) => warn!(
                %key,
                rule = %superseded.rule,
                "restored superseded conversion rule after failed insert"
            ),
            Err(err) => error!(
                target: "edugrade::integrity",
                %key,
                rule = %superseded.rule,
                error = %err,
                "superseded conversion rule left closed after failed insert"
            ),
        }
    }

    /// Close the open version for the tuple and level at `valid_to` without
    /// registering a successor.
    pub fn close_rule(
        &self,
        system: &SystemCode,
        country: &CountryScope,
        direction: Direction,
        level_stage: LevelStage,
        valid_to: NaiveDate,
    ) -> Result<ConversionRule, ConversionError> {
        let key = RuleKey {
            system: system.clone(),
            country: country.clone(),
            direction,
        };
        let lock = self.key_lock(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let candidates: Vec<ConversionRule> = self
            .store
            .find_rules(system, country, direction)?
            .into_iter()
            .filter(|rule| &rule.country == country)
            .collect();
        let criteria = RuleCriteria::new(system.clone(), country.clone(), direction, level_stage);

        let mut rule = match select_current(&candidates, &criteria) {
            Selection::Selected(rule) => rule.clone(),
            Selection::NoMatch => {
                return Err(ConversionError::NoApplicableRule {
                    system: system.clone(),
                    country: country.clone(),
                    direction,
                    level_stage,
                    as_of: valid_to,
                })
            }
            Selection::Ambiguous(rules) => return Err(ambiguous(&criteria, valid_to, rules)),
        };

        if valid_to <= rule.valid_from {
            return Err(ConversionError::InvalidRule(format!(
                "validTo {valid_to} must be after validFrom {}",
                rule.valid_from
            )));
        }

        self.store.update_rule_validity(&rule.id, Some(valid_to))?;
        rule.valid_to = Some(valid_to);
        info!(%key, rule = %rule.id, %valid_to, "closed conversion rule");
        Ok(rule)
    }

    pub(crate) fn ensure_supported(
        &self,
        system: &SystemCode,
        country: &CountryScope,
    ) -> Result<(), ConversionError> {
        let systems = self.catalog.system_catalog()?;
        if systems.supports(country, system) {
            Ok(())
        } else {
            Err(ConversionError::UnsupportedSystem {
                system: system.clone(),
                country: country.clone(),
            })
        }
    }

    fn key_lock(&self, key: &RuleKey) -> Arc<Mutex<()>> {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.clone()).or_default().clone()
    }
}

fn ambiguous(
    criteria: &RuleCriteria,
    as_of: NaiveDate,
    rules: Vec<&ConversionRule>,
) -> ConversionError {
    let rules: Vec<RuleId> = rules.into_iter().map(|rule| rule.id.clone()).collect();
    error!(
        target: "edugrade::integrity",
        system = %criteria.system,
        country = %criteria.country,
        direction = %criteria.direction,
        %as_of,
        rules = ?rules,
        "overlapping active conversion rules"
    );
    ConversionError::AmbiguousRule {
        system: criteria.system.clone(),
        country: criteria.country.clone(),
        direction: criteria.direction,
        as_of,
        rules,
    }
}

pub(crate) fn map_value(rule: &ConversionRule, value: &str) -> Result<String, ConversionError> {
    rule.lookup(value)
        .map(str::to_string)
        .ok_or_else(|| ConversionError::UnmappedGrade {
            value: value.trim().to_string(),
            system: rule.system.clone(),
            rule: rule.id.clone(),
        })
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
