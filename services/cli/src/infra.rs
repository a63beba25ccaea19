use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use edugrade::catalog::CatalogKey;
use edugrade::conversion::{
    ConversionRule, CountryScope, Direction, LevelStage, RuleId, RuleStore, StoreError, SystemCode,
};

/// Process-local rule storage populated from the seed on startup.
#[derive(Default, Clone)]
pub(crate) struct InMemoryRuleStore {
    rules: Arc<Mutex<Vec<ConversionRule>>>,
}

impl InMemoryRuleStore {
    fn guard(&self) -> Result<MutexGuard<'_, Vec<ConversionRule>>, StoreError> {
        self.rules
            .lock()
            .map_err(|_| StoreError::Unavailable("rule store mutex poisoned".to_string()))
    }
}

impl RuleStore for InMemoryRuleStore {
    fn find_rules(
        &self,
        system: &SystemCode,
        country: &CountryScope,
        direction: Direction,
    ) -> Result<Vec<ConversionRule>, StoreError> {
        let guard = self.guard()?;
        Ok(guard
            .iter()
            .filter(|rule| {
                &rule.system == system
                    && rule.direction == direction
                    && (&rule.country == country || rule.country == CountryScope::Any)
            })
            .cloned()
            .collect())
    }

    fn insert_rule(&self, rule: ConversionRule) -> Result<ConversionRule, StoreError> {
        let mut guard = self.guard()?;
        if guard.iter().any(|existing| existing.id == rule.id) {
            return Err(StoreError::Conflict);
        }
        guard.push(rule.clone());
        Ok(rule)
    }

    fn update_rule_validity(
        &self,
        id: &RuleId,
        valid_to: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        let mut guard = self.guard()?;
        let rule = guard
            .iter_mut()
            .find(|rule| &rule.id == id)
            .ok_or(StoreError::NotFound)?;
        rule.valid_to = valid_to;
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_direction(raw: &str) -> Result<Direction, String> {
    Direction::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not a direction (expected TO_REFERENCE or FROM_REFERENCE)"))
}

pub(crate) fn parse_level(raw: &str) -> Result<LevelStage, String> {
    LevelStage::parse(raw).ok_or_else(|| format!("'{raw}' is not a numeric level stage"))
}

pub(crate) fn parse_country(raw: &str) -> Result<CountryScope, String> {
    Ok(CountryScope::parse(raw))
}

pub(crate) fn parse_system(raw: &str) -> Result<SystemCode, String> {
    let system = SystemCode::new(raw);
    if system.is_blank() {
        Err("grading system must not be empty".to_string())
    } else {
        Ok(system)
    }
}

pub(crate) fn parse_catalog_key(raw: &str) -> Result<CatalogKey, String> {
    CatalogKey::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not a catalog (expected grade, system or country)"))
}
