use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Country scope value matching every country.
pub const ANY_COUNTRY: &str = "ANY";

/// Identifier assigned to a rule version when it is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Grading-system identifier such as `USA_LETTER_A_F` or `DEU_1_6_INVERTED`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemCode(String);

impl SystemCode {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SystemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Three-letter country code (`USA`, `DEU`, `ZAF`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Country a rule is scoped to, or the `ANY` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CountryScope {
    Any,
    Country(CountryCode),
}

impl CountryScope {
    /// Blank input and `ANY` (any casing) both mean the wildcard.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ANY_COUNTRY) {
            Self::Any
        } else {
            Self::Country(CountryCode::new(trimmed))
        }
    }

    pub fn code(&self) -> Option<&CountryCode> {
        match self {
            Self::Any => None,
            Self::Country(code) => Some(code),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => ANY_COUNTRY,
            Self::Country(code) => code.as_str(),
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Country(_))
    }

    /// Whether a rule scoped to `self` may answer a request made for `requested`.
    ///
    /// Wildcard rules serve every request; country rules only serve their own
    /// country, never a wildcard request.
    pub fn serves(&self, requested: &CountryScope) -> bool {
        match (self, requested) {
            (Self::Any, _) => true,
            (Self::Country(rule), Self::Country(request)) => rule == request,
            (Self::Country(_), Self::Any) => false,
        }
    }
}

impl From<String> for CountryScope {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<CountryScope> for String {
    fn from(value: CountryScope) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for CountryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a rule moves a grade into the reference scale or out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[serde(alias = "TO_ZA")]
    ToReference,
    #[serde(alias = "FROM_ZA")]
    FromReference,
}

impl Direction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ToReference => "TO_REFERENCE",
            Self::FromReference => "FROM_REFERENCE",
        }
    }

    /// Accepts the canonical labels, the legacy `TO_ZA`/`FROM_ZA` names and
    /// the short `to`/`from` forms, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "TO_REFERENCE" | "TO_ZA" | "TO" => Some(Self::ToReference),
            "FROM_REFERENCE" | "FROM_ZA" | "FROM" => Some(Self::FromReference),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Numeric education-level identifier (1-12 school grades, 13-18 TVET, 19+ tertiary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelStage(pub u32);

impl LevelStage {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u32>().ok().map(Self)
    }
}

impl fmt::Display for LevelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive bounds over level stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GradeRange {
    pub min: LevelStage,
    pub max: LevelStage,
}

impl GradeRange {
    pub const fn new(min: LevelStage, max: LevelStage) -> Self {
        Self { min, max }
    }

    pub const fn single(level: LevelStage) -> Self {
        Self {
            min: level,
            max: level,
        }
    }

    pub fn contains(&self, level: LevelStage) -> bool {
        self.min <= level && level <= self.max
    }

    pub fn overlaps(&self, other: &GradeRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    pub fn is_well_formed(&self) -> bool {
        self.min <= self.max
    }
}

impl fmt::Display for GradeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Whether `[a_from, a_to)` and `[b_from, b_to)` share at least one day.
/// `None` as an upper bound is open-ended.
pub(crate) fn periods_overlap(
    a_from: NaiveDate,
    a_to: Option<NaiveDate>,
    b_from: NaiveDate,
    b_to: Option<NaiveDate>,
) -> bool {
    let a_starts_before_b_ends = b_to.map_or(true, |end| a_from < end);
    let b_starts_before_a_ends = a_to.map_or(true, |end| b_from < end);
    a_starts_before_b_ends && b_starts_before_a_ends
}

/// The tuple that owns a sequence of rule versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub system: SystemCode,
    pub country: CountryScope,
    pub direction: Direction,
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.system, self.country, self.direction)
    }
}

/// Rule version as submitted for registration, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    pub direction: Direction,
    pub system: SystemCode,
    pub country: CountryScope,
    pub grade_range: GradeRange,
    pub valid_from: NaiveDate,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
    pub map: BTreeMap<String, String>,
}

impl RuleDraft {
    pub fn key(&self) -> RuleKey {
        RuleKey {
            system: self.system.clone(),
            country: self.country.clone(),
            direction: self.direction,
        }
    }
}

/// Canonical, effective-dated conversion table between one grading system and
/// the reference scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRule {
    pub id: RuleId,
    pub direction: Direction,
    pub system: SystemCode,
    pub country: CountryScope,
    pub grade_range: GradeRange,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub map: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl ConversionRule {
    pub fn from_draft(id: RuleId, draft: RuleDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            direction: draft.direction,
            system: draft.system,
            country: draft.country,
            grade_range: draft.grade_range,
            valid_from: draft.valid_from,
            valid_to: draft.valid_to,
            map: draft.map,
            created_at,
        }
    }

    pub fn key(&self) -> RuleKey {
        RuleKey {
            system: self.system.clone(),
            country: self.country.clone(),
            direction: self.direction,
        }
    }

    pub fn is_open_ended(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Half-open validity check: `valid_from <= date < valid_to`.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && self.valid_to.map_or(true, |end| date < end)
    }

    pub fn overlaps_period(&self, from: NaiveDate, to: Option<NaiveDate>) -> bool {
        periods_overlap(self.valid_from, self.valid_to, from, to)
    }

    /// Map lookup with surrounding whitespace ignored.
    pub fn lookup(&self, value: &str) -> Option<&str> {
        self.map.get(normalize_token(value)).map(String::as_str)
    }
}

pub(crate) fn normalize_token(value: &str) -> &str {
    value.trim()
}

/// Matching criteria for one conversion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCriteria {
    pub system: SystemCode,
    pub country: CountryScope,
    pub direction: Direction,
    pub level_stage: LevelStage,
    /// Date the conversion must be valid for; today when absent.
    pub as_of: Option<NaiveDate>,
}

impl RuleCriteria {
    pub fn new(
        system: SystemCode,
        country: CountryScope,
        direction: Direction,
        level_stage: LevelStage,
    ) -> Self {
        Self {
            system,
            country,
            direction,
            level_stage,
            as_of: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    pub fn with_direction(&self, direction: Direction) -> Self {
        Self {
            direction,
            ..self.clone()
        }
    }
}
