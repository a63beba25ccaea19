use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, TimeZone, Utc};

use crate::catalog::{OptionsSnapshot, SystemCatalog};
use crate::conversion::{
    ConversionConfig, ConversionEngine, ConversionRule, CountryCode, CountryScope, Direction,
    GradeRange, LevelStage, RuleCriteria, RuleDraft, RuleId, RuleStore, StoreError, SystemCode,
};

pub(super) type MemoryEngine = ConversionEngine<MemoryRuleStore, OptionsSnapshot>;

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn system(code: &str) -> SystemCode {
    SystemCode::new(code)
}

pub(super) fn country(code: &str) -> CountryScope {
    CountryScope::parse(code)
}

pub(super) fn criteria(
    system_code: &str,
    country_code: &str,
    direction: Direction,
    level: u32,
    as_of: NaiveDate,
) -> RuleCriteria {
    RuleCriteria::new(
        system(system_code),
        country(country_code),
        direction,
        LevelStage(level),
    )
    .on(as_of)
}

pub(super) fn draft(
    direction: Direction,
    system_code: &str,
    country_code: &str,
    range: (u32, u32),
    valid_from: NaiveDate,
    pairs: &[(&str, &str)],
) -> RuleDraft {
    RuleDraft {
        direction,
        system: system(system_code),
        country: country(country_code),
        grade_range: GradeRange::new(LevelStage(range.0), LevelStage(range.1)),
        valid_from,
        valid_to: None,
        map: pairs
            .iter()
            .map(|(source, target)| (source.to_string(), target.to_string()))
            .collect(),
    }
}

/// Stored rule built directly, bypassing registration checks.
pub(super) fn stored(id: &str, draft: RuleDraft) -> ConversionRule {
    let created_at = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp");
    ConversionRule::from_draft(RuleId(id.to_string()), draft, created_at)
}

pub(super) const LETTER_TO_REFERENCE: &[(&str, &str)] = &[
    ("A", "7"),
    ("A-", "6.5"),
    ("B+", "6"),
    ("B", "5.5"),
    ("C", "4"),
    ("F", "1"),
];

pub(super) const LETTER_FROM_REFERENCE: &[(&str, &str)] = &[
    ("7", "A"),
    ("6.5", "A-"),
    ("6", "B+"),
    ("5.5", "B"),
    ("4", "C"),
    ("1", "F"),
];

pub(super) const GERMAN_TO_REFERENCE: &[(&str, &str)] =
    &[("1.0", "7"), ("1.3", "6.5"), ("2.0", "5.5"), ("5.0", "1")];

pub(super) const GERMAN_FROM_REFERENCE: &[(&str, &str)] =
    &[("7", "1.0"), ("6.5", "1.3"), ("5.5", "2.0"), ("1", "5.0")];

/// GCSE 8 and 9 share the top reference grade, which maps back to 9.
pub(super) const GCSE_TO_REFERENCE: &[(&str, &str)] =
    &[("9", "7"), ("8", "7"), ("7", "6"), ("4", "4"), ("U", "1")];

pub(super) const GCSE_FROM_REFERENCE: &[(&str, &str)] =
    &[("7", "9"), ("6", "7"), ("4", "4"), ("1", "U")];

pub(super) fn catalog() -> OptionsSnapshot {
    let mut systems = BTreeMap::new();
    systems.insert(
        CountryCode::new("USA"),
        BTreeSet::from([system("USA_LETTER_A_F"), system("USA_GPA_0_4")]),
    );
    systems.insert(
        CountryCode::new("DEU"),
        BTreeSet::from([system("DEU_1_6_INVERTED")]),
    );
    systems.insert(CountryCode::new("GBR"), BTreeSet::from([system("GBR_GCSE")]));
    systems.insert(CountryCode::new("ZAF"), BTreeSet::from([system("ZA")]));
    OptionsSnapshot::default().with_systems(SystemCatalog::new(systems))
}

pub(super) fn engine_with(store: MemoryRuleStore) -> (MemoryEngine, Arc<MemoryRuleStore>) {
    let store = Arc::new(store);
    let engine = ConversionEngine::new(
        store.clone(),
        Arc::new(catalog()),
        ConversionConfig::default(),
    );
    (engine, store)
}

pub(super) fn engine() -> (MemoryEngine, Arc<MemoryRuleStore>) {
    engine_with(MemoryRuleStore::default())
}

/// Engine with wildcard rules for every test system, valid from 2000-01-01
/// across all level stages.
pub(super) fn seeded_engine() -> (MemoryEngine, Arc<MemoryRuleStore>) {
    let (engine, store) = engine();
    let from = date(2000, 1, 1);
    let drafts = [
        (Direction::ToReference, "USA_LETTER_A_F", LETTER_TO_REFERENCE),
        (Direction::FromReference, "USA_LETTER_A_F", LETTER_FROM_REFERENCE),
        (Direction::ToReference, "DEU_1_6_INVERTED", GERMAN_TO_REFERENCE),
        (Direction::FromReference, "DEU_1_6_INVERTED", GERMAN_FROM_REFERENCE),
        (Direction::ToReference, "GBR_GCSE", GCSE_TO_REFERENCE),
        (Direction::FromReference, "GBR_GCSE", GCSE_FROM_REFERENCE),
    ];
    for (direction, system_code, pairs) in drafts {
        engine
            .register_rule(draft(direction, system_code, "ANY", (0, 99), from, pairs))
            .expect("seed rule registers");
    }
    (engine, store)
}

#[derive(Default)]
pub(super) struct MemoryRuleStore {
    pub(super) rules: Arc<Mutex<Vec<ConversionRule>>>,
}

impl MemoryRuleStore {
    pub(super) fn with_rules(rules: Vec<ConversionRule>) -> Self {
        Self {
            rules: Arc::new(Mutex::new(rules)),
        }
    }

    pub(super) fn snapshot(&self) -> Vec<ConversionRule> {
        self.rules.lock().expect("store mutex poisoned").clone()
    }
}

impl RuleStore for MemoryRuleStore {
    fn find_rules(
        &self,
        system: &SystemCode,
        country: &CountryScope,
        direction: Direction,
    ) -> Result<Vec<ConversionRule>, StoreError> {
        let guard = self.rules.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|rule| {
                &rule.system == system
                    && rule.direction == direction
                    && (rule.country == *country || rule.country == CountryScope::Any)
            })
            .cloned()
            .collect())
    }

    fn insert_rule(&self, rule: ConversionRule) -> Result<ConversionRule, StoreError> {
        let mut guard = self.rules.lock().expect("store mutex poisoned");
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
        let mut guard = self.rules.lock().expect("store mutex poisoned");
        let rule = guard
            .iter_mut()
            .find(|rule| &rule.id == id)
            .ok_or(StoreError::NotFound)?;
        rule.valid_to = valid_to;
        Ok(())
    }
}

pub(super) struct UnavailableStore;

impl RuleStore for UnavailableStore {
    fn find_rules(
        &self,
        _system: &SystemCode,
        _country: &CountryScope,
        _direction: Direction,
    ) -> Result<Vec<ConversionRule>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert_rule(&self, _rule: ConversionRule) -> Result<ConversionRule, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update_rule_validity(
        &self,
        _id: &RuleId,
        _valid_to: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Reads and validity updates reach the inner store; inserts always fail.
pub(super) struct RejectingInsertStore {
    pub(super) inner: MemoryRuleStore,
}

impl RuleStore for RejectingInsertStore {
    fn find_rules(
        &self,
        system: &SystemCode,
        country: &CountryScope,
        direction: Direction,
    ) -> Result<Vec<ConversionRule>, StoreError> {
        self.inner.find_rules(system, country, direction)
    }

    fn insert_rule(&self, _rule: ConversionRule) -> Result<ConversionRule, StoreError> {
        Err(StoreError::Unavailable("insert timed out".to_string()))
    }

    fn update_rule_validity(
        &self,
        id: &RuleId,
        valid_to: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        self.inner.update_rule_validity(id, valid_to)
    }
}

/// No two versions of one tuple may be valid on the same day for overlapping
/// grade ranges.
pub(super) fn assert_no_overlapping_versions(rules: &[ConversionRule]) {
    for (index, left) in rules.iter().enumerate() {
        for right in &rules[index + 1..] {
            if left.key() != right.key() || !left.grade_range.overlaps(&right.grade_range) {
                continue;
            }
            assert!(
                !left.overlaps_period(right.valid_from, right.valid_to),
                "{} and {} overlap",
                left.id,
                right.id
            );
        }
    }
}
