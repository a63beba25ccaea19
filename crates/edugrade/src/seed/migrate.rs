use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use tracing::debug;

use super::document::{RawGradeRange, RawOption, RawRule, RawToken};
use super::SeedError;
use crate::catalog::{CatalogKey, CountryCatalog, GradeLabels, OptionsSnapshot, SystemCatalog};
use crate::conversion::{
    CountryCode, CountryScope, Direction, GradeRange, LevelStage, RuleDraft, SystemCode,
};

/// Rewrites legacy encodings into the canonical rule schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyMigration {
    system_aliases: BTreeMap<String, SystemCode>,
}

impl LegacyMigration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename `legacy` to `canonical` wherever a system code appears.
    pub fn with_alias(mut self, legacy: &str, canonical: &str) -> Self {
        self.system_aliases
            .insert(legacy.trim().to_string(), SystemCode::new(canonical));
        self
    }

    pub fn system(&self, raw: &str) -> SystemCode {
        let trimmed = raw.trim();
        match self.system_aliases.get(trimmed) {
            Some(canonical) => {
                debug!(legacy = trimmed, canonical = %canonical, "renamed legacy system code");
                canonical.clone()
            }
            None => SystemCode::new(trimmed),
        }
    }

    pub(crate) fn rule(&self, raw: RawRule) -> Result<RuleDraft, SeedError> {
        let direction =
            Direction::parse(&raw.direction).ok_or_else(|| invalid("direction", &raw.direction))?;

        let system = self.system(&raw.system);
        if system.is_blank() {
            return Err(invalid("system", &raw.system));
        }

        let country = raw
            .country
            .as_deref()
            .map(CountryScope::parse)
            .unwrap_or(CountryScope::Any);

        let grade_range = match raw.grade_range {
            Some(RawGradeRange::Bounds { min, max }) => {
                GradeRange::new(level("gradeRange.min", &min)?, level("gradeRange.max", &max)?)
            }
            Some(RawGradeRange::Single(value)) => GradeRange::single(level("grade", &value)?),
            None => return Err(invalid("gradeRange", "<missing>")),
        };

        let valid_from = parse_date(raw.valid_from.as_str())
            .ok_or_else(|| invalid("validFrom", raw.valid_from.as_str()))?;
        let valid_to = match &raw.valid_to {
            Some(value) => {
                Some(parse_date(value.as_str()).ok_or_else(|| invalid("validTo", value.as_str()))?)
            }
            None => None,
        };

        let mut map = BTreeMap::new();
        for (source, target) in raw.map {
            let source = source.trim().to_string();
            if map.contains_key(&source) {
                return Err(invalid("map", &source));
            }
            map.insert(source, target.to_string());
        }

        Ok(RuleDraft {
            direction,
            system,
            country,
            grade_range,
            valid_from,
            valid_to,
            map,
        })
    }

    pub(crate) fn options(&self, raw: &[RawOption]) -> Result<OptionsSnapshot, SeedError> {
        let mut snapshot = OptionsSnapshot::default();

        for option in raw {
            let Some(key) = CatalogKey::parse(&option.key) else {
                debug!(key = %option.key, "skipping unrecognized option document");
                continue;
            };
            let Some(payload) = option.payload() else {
                return Err(invalid("options.response", &option.key));
            };

            match key {
                CatalogKey::Grade => snapshot.grade = Some(grade_labels(payload)?),
                CatalogKey::System => snapshot.system = Some(self.system_catalog(payload)?),
                CatalogKey::Country => snapshot.country = Some(country_catalog(payload)?),
            }
        }

        Ok(snapshot)
    }

    fn system_catalog(&self, payload: &Value) -> Result<SystemCatalog, SeedError> {
        let entries = payload
            .as_object()
            .ok_or_else(|| invalid("options.system", &payload.to_string()))?;

        let mut systems = BTreeMap::new();
        for (country, listed) in entries {
            let listed = listed
                .as_array()
                .ok_or_else(|| invalid("options.system", &listed.to_string()))?;
            let mut codes = BTreeSet::new();
            for code in listed {
                let code = code
                    .as_str()
                    .ok_or_else(|| invalid("options.system", &code.to_string()))?;
                codes.insert(self.system(code));
            }
            systems.insert(CountryCode::new(country), codes);
        }

        Ok(SystemCatalog::new(systems))
    }
}

fn grade_labels(payload: &Value) -> Result<GradeLabels, SeedError> {
    let entries = payload
        .as_object()
        .ok_or_else(|| invalid("options.grade", &payload.to_string()))?;

    let mut labels = BTreeMap::new();
    for (level, label) in entries {
        let stage = LevelStage::parse(level).ok_or_else(|| invalid("options.grade", level))?;
        let label = match label {
            Value::String(text) => text.trim().to_string(),
            other => other.to_string(),
        };
        labels.insert(stage, label);
    }

    Ok(GradeLabels::new(labels))
}

/// Accepts a code-to-name object or a bare list of codes.
fn country_catalog(payload: &Value) -> Result<CountryCatalog, SeedError> {
    let mut countries = BTreeMap::new();

    match payload {
        Value::Object(entries) => {
            for (code, name) in entries {
                let name = name
                    .as_str()
                    .ok_or_else(|| invalid("options.country", &name.to_string()))?;
                countries.insert(CountryCode::new(code), name.trim().to_string());
            }
        }
        Value::Array(codes) => {
            for code in codes {
                let code = code
                    .as_str()
                    .ok_or_else(|| invalid("options.country", &code.to_string()))?;
                let code = CountryCode::new(code);
                countries.insert(code.clone(), code.as_str().to_string());
            }
        }
        other => return Err(invalid("options.country", &other.to_string())),
    }

    Ok(CountryCatalog::new(countries))
}

fn level(field: &'static str, token: &RawToken) -> Result<LevelStage, SeedError> {
    let rendered = token.to_string();
    LevelStage::parse(&rendered).ok_or_else(|| invalid(field, &rendered))
}

/// RFC 3339 timestamps are truncated to their UTC date; plain dates pass through.
pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc().date());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

pub(crate) fn invalid(field: &'static str, value: &str) -> SeedError {
    SeedError::InvalidField {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_rule(json: &str) -> RawRule {
        serde_json::from_str(json).expect("raw rule parses")
    }

    #[test]
    fn legacy_rule_shapes_are_migrated() {
        let migration = LegacyMigration::new().with_alias("AR_1_10", "ARG_1_10");
        let raw = raw_rule(
            r#"{
                "direction": "TO_ZA",
                "system": "AR_1_10",
                "grade": "12",
                "validFrom": {"$date": "2000-01-01T00:00:00.000Z"},
                "validTo": null,
                "map": {"10": "7", " 4 ": 2.5}
            }"#,
        );

        let draft = migration.rule(raw).expect("migrates");
        assert_eq!(draft.direction, Direction::ToReference);
        assert_eq!(draft.system, SystemCode::new("ARG_1_10"));
        assert_eq!(draft.country, CountryScope::Any);
        assert_eq!(draft.grade_range, GradeRange::single(LevelStage(12)));
        assert_eq!(
            draft.valid_from,
            NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid")
        );
        assert_eq!(draft.valid_to, None);
        assert_eq!(draft.map.get("4").map(String::as_str), Some("2.5"));
    }

    #[test]
    fn canonical_bounds_accept_numbers_and_strings() {
        let raw = raw_rule(
            r#"{
                "direction": "FROM_REFERENCE",
                "system": "GBR_GCSE",
                "country": "gbr",
                "gradeRange": {"min": "9", "max": 12},
                "validFrom": "2017-09-01",
                "validTo": "2030-01-01T12:30:00+02:00",
                "map": {"7": "9"}
            }"#,
        );

        let draft = LegacyMigration::new().rule(raw).expect("migrates");
        assert_eq!(draft.country, CountryScope::parse("GBR"));
        assert_eq!(
            draft.grade_range,
            GradeRange::new(LevelStage(9), LevelStage(12))
        );
        assert_eq!(
            draft.valid_to,
            NaiveDate::from_ymd_opt(2030, 1, 1)
        );
    }

    #[test]
    fn invalid_fields_name_the_offender() {
        let raw = raw_rule(
            r#"{
                "direction": "SIDEWAYS",
                "system": "GBR_GCSE",
                "gradeRange": {"min": "0", "max": "99"},
                "validFrom": "2000-01-01",
                "map": {"9": "7"}
            }"#,
        );

        match LegacyMigration::new().rule(raw) {
            Err(SeedError::InvalidField { field, value }) => {
                assert_eq!(field, "direction");
                assert_eq!(value, "SIDEWAYS");
            }
            other => panic!("expected invalid field, got {other:?}"),
        }

        let raw = raw_rule(
            r#"{
                "direction": "TO_ZA",
                "system": "GBR_GCSE",
                "gradeRange": {"min": "first", "max": "99"},
                "validFrom": "2000-01-01",
                "map": {"9": "7"}
            }"#,
        );
        assert!(matches!(
            LegacyMigration::new().rule(raw),
            Err(SeedError::InvalidField { field: "gradeRange.min", .. })
        ));
    }

    #[test]
    fn keys_equal_after_trimming_are_duplicates() {
        let raw = raw_rule(
            r#"{
                "direction": "TO_ZA",
                "system": "USA_LETTER_A_F",
                "gradeRange": {"min": "0", "max": "99"},
                "validFrom": "2000-01-01",
                "map": {"A": "7", " A ": "1"}
            }"#,
        );

        match LegacyMigration::new().rule(raw) {
            Err(SeedError::InvalidField { field, value }) => {
                assert_eq!(field, "map");
                assert_eq!(value, "A");
            }
            other => panic!("expected duplicate map key, got {other:?}"),
        }
    }

    #[test]
    fn country_options_accept_lists() {
        let catalog = country_catalog(&serde_json::json!(["zaf", "USA"])).expect("parses");
        assert_eq!(catalog.name(&CountryCode::new("ZAF")), Some("ZAF"));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn parse_date_supports_rfc3339_and_plain_dates() {
        assert_eq!(
            parse_date("2000-01-01T00:00:00.000Z"),
            NaiveDate::from_ymd_opt(2000, 1, 1)
        );
        assert_eq!(parse_date("2024-09-01"), NaiveDate::from_ymd_opt(2024, 9, 1));
        assert_eq!(parse_date("  "), None);
        assert_eq!(parse_date("next tuesday"), None);
    }
}
