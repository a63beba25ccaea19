use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// Seed document as exported from the reference-data store, before migration.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSeedDocument {
    #[serde(default)]
    pub(crate) options: Vec<RawOption>,
    #[serde(default, rename = "conversionRules", alias = "conversion_rules")]
    pub(crate) conversion_rules: Vec<RawRule>,
}

/// `options` collection entry. Older exports carry the payload under
/// `values`, newer ones under `response`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawOption {
    pub(crate) key: String,
    #[serde(default)]
    pub(crate) response: Option<Value>,
    #[serde(default)]
    pub(crate) values: Option<Value>,
}

impl RawOption {
    pub(crate) fn payload(&self) -> Option<&Value> {
        self.response.as_ref().or(self.values.as_ref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawRule {
    pub(crate) direction: String,
    pub(crate) system: String,
    #[serde(default)]
    pub(crate) country: Option<String>,
    #[serde(default, alias = "grade")]
    pub(crate) grade_range: Option<RawGradeRange>,
    pub(crate) valid_from: RawDate,
    #[serde(default)]
    pub(crate) valid_to: Option<RawDate>,
    pub(crate) map: BTreeMap<String, RawToken>,
}

/// `{min, max}` is canonical; a bare value is the deprecated single-level form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawGradeRange {
    Bounds { min: RawToken, max: RawToken },
    Single(RawToken),
}

/// Dates appear as ISO strings or as extended-JSON `{"$date": ...}` wrappers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawDate {
    Text(String),
    Extended {
        #[serde(rename = "$date")]
        date: String,
    },
}

impl RawDate {
    pub(crate) fn as_str(&self) -> &str {
        match self {
            RawDate::Text(value) => value,
            RawDate::Extended { date } => date,
        }
    }
}

/// Grade tokens are strings in current data; older exports used bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawToken {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawToken::Text(value) => f.write_str(value.trim()),
            RawToken::Number(value) => write!(f, "{value}"),
        }
    }
}
