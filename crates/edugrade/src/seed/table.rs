use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use serde::{Deserialize, Deserializer};

use super::migrate::{invalid, parse_date, LegacyMigration};
use super::SeedError;
use crate::conversion::{CountryScope, Direction, GradeRange, LevelStage, RuleDraft};

/// One map entry of a flat rule table.
#[derive(Debug, Deserialize)]
struct RuleRow {
    direction: String,
    system: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    country: Option<String>,
    grade_min: String,
    grade_max: String,
    valid_from: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    valid_to: Option<String>,
    source: String,
    target: String,
}

/// Parse a CSV rule table into drafts, one per distinct
/// `(direction, system, country, range, validity)` group, in first-seen order.
pub(crate) fn parse_rule_table<R: Read>(
    reader: R,
    migration: &LegacyMigration,
) -> Result<Vec<RuleDraft>, SeedError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut drafts: Vec<RuleDraft> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for record in csv_reader.deserialize::<RuleRow>() {
        let row = record?;
        let draft = row_header(&row, migration)?;
        let key = GroupKey::of(&draft);

        let position = *index.entry(key).or_insert_with(|| {
            drafts.push(draft);
            drafts.len() - 1
        });

        let source = row.source.trim().to_string();
        if drafts[position]
            .map
            .insert(source.clone(), row.target.trim().to_string())
            .is_some()
        {
            return Err(invalid("source", &source));
        }
    }

    Ok(drafts)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    direction: Direction,
    system: String,
    country: CountryScope,
    grade_range: GradeRange,
    valid_from: chrono::NaiveDate,
    valid_to: Option<chrono::NaiveDate>,
}

impl GroupKey {
    fn of(draft: &RuleDraft) -> Self {
        Self {
            direction: draft.direction,
            system: draft.system.as_str().to_string(),
            country: draft.country.clone(),
            grade_range: draft.grade_range,
            valid_from: draft.valid_from,
            valid_to: draft.valid_to,
        }
    }
}

fn row_header(row: &RuleRow, migration: &LegacyMigration) -> Result<RuleDraft, SeedError> {
    let direction =
        Direction::parse(&row.direction).ok_or_else(|| invalid("direction", &row.direction))?;
    let system = migration.system(&row.system);
    if system.is_blank() {
        return Err(invalid("system", &row.system));
    }

    let min = LevelStage::parse(&row.grade_min).ok_or_else(|| invalid("grade_min", &row.grade_min))?;
    let max = LevelStage::parse(&row.grade_max).ok_or_else(|| invalid("grade_max", &row.grade_max))?;
    let valid_from =
        parse_date(&row.valid_from).ok_or_else(|| invalid("valid_from", &row.valid_from))?;
    let valid_to = match row.valid_to.as_deref() {
        Some(value) => Some(parse_date(value).ok_or_else(|| invalid("valid_to", value))?),
        None => None,
    };

    Ok(RuleDraft {
        direction,
        system,
        country: row
            .country
            .as_deref()
            .map(CountryScope::parse)
            .unwrap_or(CountryScope::Any),
        grade_range: GradeRange::new(min, max),
        valid_from,
        valid_to,
        map: BTreeMap::new(),
    })
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
