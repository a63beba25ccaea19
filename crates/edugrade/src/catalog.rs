//! Reference option catalogs: grade-level labels, grading systems per
//! country, and country display names.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conversion::{CountryCode, CountryScope, LevelStage, SystemCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKey {
    Grade,
    System,
    Country,
}

impl CatalogKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grade => "grade",
            Self::System => "system",
            Self::Country => "country",
        }
    }

    /// `countries` is the plural key some seed documents use.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "grade" | "grades" => Some(Self::Grade),
            "system" | "systems" => Some(Self::System),
            "country" | "countries" => Some(Self::Country),
            _ => None,
        }
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level-stage id to human-readable label. Display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeLabels(BTreeMap<LevelStage, String>);

impl GradeLabels {
    pub fn new(labels: BTreeMap<LevelStage, String>) -> Self {
        Self(labels)
    }

    pub fn label(&self, level: LevelStage) -> Option<&str> {
        self.0.get(&level).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LevelStage, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Grading systems recognized for each country.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemCatalog(BTreeMap<CountryCode, BTreeSet<SystemCode>>);

impl SystemCatalog {
    pub fn new(systems: BTreeMap<CountryCode, BTreeSet<SystemCode>>) -> Self {
        Self(systems)
    }

    /// A country request needs the system listed under that country; the
    /// wildcard accepts a system listed under any country.
    pub fn supports(&self, country: &CountryScope, system: &SystemCode) -> bool {
        match country {
            CountryScope::Country(code) => self
                .0
                .get(code)
                .map_or(false, |systems| systems.contains(system)),
            CountryScope::Any => self.0.values().any(|systems| systems.contains(system)),
        }
    }

    pub fn systems_for(&self, country: &CountryCode) -> impl Iterator<Item = &SystemCode> {
        self.0.get(country).into_iter().flatten()
    }

    pub fn country_of(&self, system: &SystemCode) -> Option<&CountryCode> {
        self.0
            .iter()
            .find(|(_, systems)| systems.contains(system))
            .map(|(country, _)| country)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CountryCode, &BTreeSet<SystemCode>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Country code to display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCatalog(BTreeMap<CountryCode, String>);

impl CountryCatalog {
    pub fn new(countries: BTreeMap<CountryCode, String>) -> Self {
        Self(countries)
    }

    pub fn name(&self, code: &CountryCode) -> Option<&str> {
        self.0.get(code).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CountryCode, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Catalog {
    Grade(GradeLabels),
    System(SystemCatalog),
    Country(CountryCatalog),
}

impl Catalog {
    pub fn key(&self) -> CatalogKey {
        match self {
            Catalog::Grade(_) => CatalogKey::Grade,
            Catalog::System(_) => CatalogKey::System,
            Catalog::Country(_) => CatalogKey::Country,
        }
    }
}

/// Read access to the option catalogs.
pub trait OptionsCatalog: Send + Sync {
    fn get_catalog(&self, key: CatalogKey) -> Result<Catalog, CatalogError>;

    fn system_catalog(&self) -> Result<SystemCatalog, CatalogError> {
        match self.get_catalog(CatalogKey::System)? {
            Catalog::System(systems) => Ok(systems),
            other => Err(CatalogError::Mismatched {
                requested: CatalogKey::System,
                found: other.key(),
            }),
        }
    }

    fn grade_labels(&self) -> Result<GradeLabels, CatalogError> {
        match self.get_catalog(CatalogKey::Grade)? {
            Catalog::Grade(labels) => Ok(labels),
            other => Err(CatalogError::Mismatched {
                requested: CatalogKey::Grade,
                found: other.key(),
            }),
        }
    }

    fn country_catalog(&self) -> Result<CountryCatalog, CatalogError> {
        match self.get_catalog(CatalogKey::Country)? {
            Catalog::Country(countries) => Ok(countries),
            other => Err(CatalogError::Mismatched {
                requested: CatalogKey::Country,
                found: other.key(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("option catalog '{0}' not found")]
    Missing(CatalogKey),
    #[error("option catalog '{requested}' returned '{found}' data")]
    Mismatched {
        requested: CatalogKey,
        found: CatalogKey,
    },
    #[error("option catalog unavailable: {0}")]
    Unavailable(String),
}

/// In-memory catalogs, typically loaded from a seed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsSnapshot {
    pub grade: Option<GradeLabels>,
    pub system: Option<SystemCatalog>,
    pub country: Option<CountryCatalog>,
}

impl OptionsSnapshot {
    pub fn with_grade_labels(mut self, labels: GradeLabels) -> Self {
        self.grade = Some(labels);
        self
    }

    pub fn with_systems(mut self, systems: SystemCatalog) -> Self {
        self.system = Some(systems);
        self
    }

    pub fn with_countries(mut self, countries: CountryCatalog) -> Self {
        self.country = Some(countries);
        self
    }
}

impl OptionsCatalog for OptionsSnapshot {
    fn get_catalog(&self, key: CatalogKey) -> Result<Catalog, CatalogError> {
        let catalog = match key {
            CatalogKey::Grade => self.grade.clone().map(Catalog::Grade),
            CatalogKey::System => self.system.clone().map(Catalog::System),
            CatalogKey::Country => self.country.clone().map(Catalog::Country),
        };
        catalog.ok_or(CatalogError::Missing(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn systems() -> SystemCatalog {
        let mut map = BTreeMap::new();
        map.insert(
            CountryCode::new("USA"),
            BTreeSet::from([
                SystemCode::new("USA_LETTER_A_F"),
                SystemCode::new("USA_GPA_0_4"),
            ]),
        );
        map.insert(
            CountryCode::new("DEU"),
            BTreeSet::from([SystemCode::new("DEU_1_6_INVERTED")]),
        );
        SystemCatalog::new(map)
    }

    #[test]
    fn supports_checks_the_requested_country() {
        let catalog = systems();
        let usa = CountryScope::parse("USA");
        let deu = CountryScope::parse("DEU");
        let letters = SystemCode::new("USA_LETTER_A_F");

        assert!(catalog.supports(&usa, &letters));
        assert!(!catalog.supports(&deu, &letters));
        assert!(catalog.supports(&CountryScope::Any, &letters));
        assert!(!catalog.supports(&CountryScope::Any, &SystemCode::new("FRA_0_20")));
        assert!(!catalog.supports(&CountryScope::parse("FRA"), &letters));
    }

    #[test]
    fn country_of_finds_the_owning_country() {
        let catalog = systems();
        assert_eq!(
            catalog.country_of(&SystemCode::new("DEU_1_6_INVERTED")),
            Some(&CountryCode::new("DEU"))
        );
        assert_eq!(catalog.country_of(&SystemCode::new("ZA")), None);
    }

    #[test]
    fn snapshot_reports_missing_catalogs() {
        let snapshot = OptionsSnapshot::default().with_systems(systems());
        assert!(snapshot.system_catalog().is_ok());
        match snapshot.grade_labels() {
            Err(CatalogError::Missing(CatalogKey::Grade)) => {}
            other => panic!("expected missing grade catalog, got {other:?}"),
        }
    }

    #[test]
    fn catalog_key_accepts_plural_forms() {
        assert_eq!(CatalogKey::parse("countries"), Some(CatalogKey::Country));
        assert_eq!(CatalogKey::parse(" Grade "), Some(CatalogKey::Grade));
        assert_eq!(CatalogKey::parse("subjects"), None);
    }
}
