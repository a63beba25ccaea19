//! Loading reference data into the canonical schema.
//!
//! Seed documents mirror the `options` and `conversionRules` collections of
//! the reference-data store, legacy encodings included. Everything is
//! normalized here so the engine only ever sees [`RuleDraft`] values.

mod document;
mod migrate;
mod table;

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::catalog::{OptionsCatalog, OptionsSnapshot};
use crate::conversion::{ConversionEngine, ConversionError, RuleDraft, RuleStore};
use document::RawSeedDocument;

pub use migrate::LegacyMigration;

#[derive(Debug)]
pub enum SeedError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    InvalidField { field: &'static str, value: String },
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Io(err) => write!(f, "failed to read seed data: {}", err),
            SeedError::Json(err) => write!(f, "invalid seed document: {}", err),
            SeedError::Csv(err) => write!(f, "invalid rule table: {}", err),
            SeedError::InvalidField { field, value } => {
                write!(f, "invalid value '{}' for field '{}'", value, field)
            }
        }
    }
}

impl std::error::Error for SeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedError::Io(err) => Some(err),
            SeedError::Json(err) => Some(err),
            SeedError::Csv(err) => Some(err),
            SeedError::InvalidField { .. } => None,
        }
    }
}

impl From<std::io::Error> for SeedError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SeedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<csv::Error> for SeedError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Catalogs and rule drafts ready to hand to an engine.
#[derive(Debug, Clone, Default)]
pub struct SeedBundle {
    pub catalog: OptionsSnapshot,
    pub rules: Vec<RuleDraft>,
}

/// Counts from registering a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    pub superseded: usize,
}

impl SeedBundle {
    /// Register every draft, oldest `validFrom` first so later versions
    /// supersede earlier ones. Stops at the first rejected draft.
    pub fn register_into<S, C>(
        &self,
        engine: &ConversionEngine<S, C>,
    ) -> Result<SeedReport, ConversionError>
    where
        S: RuleStore + 'static,
        C: OptionsCatalog + 'static,
    {
        let mut drafts: Vec<&RuleDraft> = self.rules.iter().collect();
        drafts.sort_by_key(|draft| draft.valid_from);

        let mut report = SeedReport::default();
        for draft in drafts {
            let registration = engine.register_rule(draft.clone())?;
            report.inserted += 1;
            if registration.superseded.is_some() {
                report.superseded += 1;
            }
        }

        info!(
            inserted = report.inserted,
            superseded = report.superseded,
            "seed rules registered"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeedLoader {
    migration: LegacyMigration,
}

impl SeedLoader {
    pub fn new(migration: LegacyMigration) -> Self {
        Self { migration }
    }

    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<SeedBundle, SeedError> {
        let file = std::fs::File::open(path)?;
        self.from_reader(file)
    }

    pub fn from_reader<R: Read>(&self, reader: R) -> Result<SeedBundle, SeedError> {
        let document: RawSeedDocument = serde_json::from_reader(reader)?;
        self.bundle(document)
    }

    pub fn parse_str(&self, raw: &str) -> Result<SeedBundle, SeedError> {
        let document: RawSeedDocument = serde_json::from_str(raw)?;
        self.bundle(document)
    }

    /// Read a CSV rule table with the columns
    /// `direction,system,country,grade_min,grade_max,valid_from,valid_to,source,target`.
    /// Rows sharing everything but `source`/`target` become one draft.
    pub fn rule_table_from_reader<R: Read>(&self, reader: R) -> Result<Vec<RuleDraft>, SeedError> {
        table::parse_rule_table(reader, &self.migration)
    }

    pub fn rule_table_from_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<Vec<RuleDraft>, SeedError> {
        let file = std::fs::File::open(path)?;
        self.rule_table_from_reader(file)
    }

    fn bundle(&self, document: RawSeedDocument) -> Result<SeedBundle, SeedError> {
        let catalog = self.migration.options(&document.options)?;
        let rules = document
            .conversion_rules
            .into_iter()
            .map(|raw| self.migration.rule(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SeedBundle { catalog, rules })
    }
}
