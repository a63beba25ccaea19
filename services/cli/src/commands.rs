use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::Args;
use edugrade::catalog::{Catalog, CatalogKey, OptionsCatalog, OptionsSnapshot};
use edugrade::config::AppConfig;
use edugrade::conversion::{
    ConversionConfig, ConversionEngine, ConversionError, ConversionRule, CountryScope, Direction,
    LevelStage, ProjectionRequest, RuleCriteria, RuleId, SystemCode,
};
use edugrade::error::AppError;
use edugrade::seed::{LegacyMigration, SeedBundle, SeedLoader, SeedReport};
use serde::Serialize;
use tracing::info;

use crate::infra::{
    parse_catalog_key, parse_country, parse_date, parse_direction, parse_level, parse_system,
    InMemoryRuleStore,
};

pub(crate) type Engine = ConversionEngine<InMemoryRuleStore, OptionsSnapshot>;

/// Engine loaded with one seed document.
pub(crate) struct Session {
    engine: Engine,
    catalog: OptionsSnapshot,
    migration: LegacyMigration,
    source: PathBuf,
    seeded: SeedReport,
}

impl Session {
    pub(crate) fn load(path: &Path, config: &AppConfig) -> Result<Self, AppError> {
        let migration = config.seed.migration();
        let bundle = SeedLoader::new(migration.clone()).from_path(path)?;
        Self::from_bundle(bundle, config.conversion.clone(), migration, path.to_path_buf())
    }

    pub(crate) fn from_bundle(
        bundle: SeedBundle,
        config: ConversionConfig,
        migration: LegacyMigration,
        source: PathBuf,
    ) -> Result<Self, AppError> {
        let engine = ConversionEngine::new(
            Arc::new(InMemoryRuleStore::default()),
            Arc::new(bundle.catalog.clone()),
            config,
        );
        let seeded = bundle.register_into(&engine)?;
        info!(
            source = %source.display(),
            rules = seeded.inserted,
            "seed loaded"
        );

        Ok(Self {
            engine,
            catalog: bundle.catalog,
            migration,
            source,
            seeded,
        })
    }
}

pub(crate) fn emit<T>(report: &T, json: bool) -> Result<(), AppError>
where
    T: Serialize + fmt::Display,
{
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, report).map_err(io::Error::from)?;
        writeln!(out)?;
    } else {
        write!(out, "{report}")?;
    }
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Args, Debug)]
pub(crate) struct ConvertArgs {
    /// Grade token to convert, e.g. `A`, `1.0`, `7`
    pub(crate) value: String,
    /// Grading system the rule belongs to
    #[arg(long, value_parser = parse_system)]
    pub(crate) system: SystemCode,
    /// Country code, or ANY for wildcard rules
    #[arg(long, default_value = "ANY", value_parser = parse_country)]
    pub(crate) country: CountryScope,
    /// TO_REFERENCE or FROM_REFERENCE (legacy TO_ZA/FROM_ZA accepted)
    #[arg(long, value_parser = parse_direction)]
    pub(crate) direction: Direction,
    /// Education level stage
    #[arg(long, value_parser = parse_level)]
    pub(crate) level: LevelStage,
    /// Conversion date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConversionReport {
    pub(crate) value: String,
    pub(crate) system: SystemCode,
    pub(crate) country: CountryScope,
    pub(crate) direction: Direction,
    pub(crate) level_stage: LevelStage,
    pub(crate) as_of: NaiveDate,
    pub(crate) result: String,
    pub(crate) rule: RuleId,
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) -> {} [{}, level {}, {}, {}, {}]",
            self.value,
            self.system,
            self.result,
            self.direction,
            self.level_stage,
            self.country,
            self.as_of,
            self.rule
        )
    }
}

pub(crate) fn convert(session: &Session, args: ConvertArgs) -> Result<ConversionReport, AppError> {
    let as_of = args.as_of.unwrap_or_else(today);
    let criteria = RuleCriteria::new(
        args.system.clone(),
        args.country.clone(),
        args.direction,
        args.level,
    )
    .on(as_of);

    let applied = session.engine.convert_with_rule(&args.value, &criteria)?;

    Ok(ConversionReport {
        value: args.value.trim().to_string(),
        system: args.system,
        country: args.country,
        direction: args.direction,
        level_stage: args.level,
        as_of,
        result: applied.value,
        rule: applied.rule.id,
    })
}

#[derive(Args, Debug)]
pub(crate) struct RoundTripArgs {
    /// Grade token in the source system
    pub(crate) value: String,
    #[arg(long, value_parser = parse_system)]
    pub(crate) system: SystemCode,
    #[arg(long, default_value = "ANY", value_parser = parse_country)]
    pub(crate) country: CountryScope,
    #[arg(long, value_parser = parse_level)]
    pub(crate) level: LevelStage,
    /// Conversion date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RoundTripReport {
    pub(crate) value: String,
    pub(crate) system: SystemCode,
    pub(crate) reference_value: String,
    pub(crate) result: String,
    pub(crate) preserved: bool,
    pub(crate) as_of: NaiveDate,
}

impl fmt::Display for RoundTripReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) -> {} (reference) -> {}",
            self.value, self.system, self.reference_value, self.result
        )?;
        if !self.preserved {
            writeln!(f, "note: round trip does not return the original grade")?;
        }
        Ok(())
    }
}

pub(crate) fn round_trip(
    session: &Session,
    args: RoundTripArgs,
) -> Result<RoundTripReport, AppError> {
    let as_of = args.as_of.unwrap_or_else(today);
    let to_reference = RuleCriteria::new(
        args.system.clone(),
        args.country.clone(),
        Direction::ToReference,
        args.level,
    )
    .on(as_of);

    let reference_value = session.engine.convert(&args.value, &to_reference)?;
    let result = session.engine.round_trip(
        &args.value,
        &args.system,
        &args.country,
        args.level,
        Some(as_of),
    )?;
    let value = args.value.trim().to_string();

    Ok(RoundTripReport {
        preserved: value == result,
        value,
        system: args.system,
        reference_value,
        result,
        as_of,
    })
}

#[derive(Args, Debug)]
pub(crate) struct ProjectArgs {
    /// Reference-scale values to display
    #[arg(required = true, num_args = 1..)]
    pub(crate) values: Vec<String>,
    /// Grading system to display the values in
    #[arg(long, value_parser = parse_system)]
    pub(crate) target: SystemCode,
    #[arg(long, default_value = "ANY", value_parser = parse_country)]
    pub(crate) country: CountryScope,
    #[arg(long, value_parser = parse_level)]
    pub(crate) level: LevelStage,
    /// Date the grades were recorded (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectionRow {
    pub(crate) reference_value: String,
    pub(crate) display_value: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectionReport {
    pub(crate) target: SystemCode,
    pub(crate) as_of: NaiveDate,
    pub(crate) rows: Vec<ProjectionRow>,
}

impl fmt::Display for ProjectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Projected into {} as of {}", self.target, self.as_of)?;
        for row in &self.rows {
            writeln!(f, "- {} -> {}", row.reference_value, row.display_value)?;
        }
        Ok(())
    }
}

pub(crate) fn project(session: &Session, args: ProjectArgs) -> Result<ProjectionReport, AppError> {
    let as_of = args.as_of.unwrap_or_else(today);
    let requests: Vec<ProjectionRequest> = args
        .values
        .iter()
        .map(|value| ProjectionRequest {
            reference_value: value.clone(),
            country: args.country.clone(),
            level_stage: args.level,
            as_of,
        })
        .collect();

    let projections = session.engine.project_many(&requests, &args.target)?;
    let rows = requests
        .into_iter()
        .zip(projections)
        .map(|(request, projection)| ProjectionRow {
            reference_value: request.reference_value.trim().to_string(),
            display_value: projection.display_value,
        })
        .collect();

    Ok(ProjectionReport {
        target: args.target,
        as_of,
        rows,
    })
}

#[derive(Args, Debug)]
pub(crate) struct HistoryArgs {
    #[arg(long, value_parser = parse_system)]
    pub(crate) system: SystemCode,
    #[arg(long, default_value = "ANY", value_parser = parse_country)]
    pub(crate) country: CountryScope,
    #[arg(long, value_parser = parse_direction)]
    pub(crate) direction: Direction,
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryReport {
    pub(crate) system: SystemCode,
    pub(crate) country: CountryScope,
    pub(crate) direction: Direction,
    pub(crate) rules: Vec<ConversionRule>,
}

impl fmt::Display for HistoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}, {}): {} version(s)",
            self.system,
            self.country,
            self.direction,
            self.rules.len()
        )?;
        for rule in &self.rules {
            let until = rule
                .valid_to
                .map_or_else(|| "open".to_string(), |date| date.to_string());
            writeln!(
                f,
                "- {} [{}] levels {} from {} until {} ({} entries)",
                rule.id,
                rule.country,
                rule.grade_range,
                rule.valid_from,
                until,
                rule.map.len()
            )?;
        }
        Ok(())
    }
}

pub(crate) fn history(session: &Session, args: HistoryArgs) -> Result<HistoryReport, AppError> {
    let rules = session
        .engine
        .rule_history(&args.system, &args.country, args.direction)?;

    Ok(HistoryReport {
        system: args.system,
        country: args.country,
        direction: args.direction,
        rules,
    })
}

#[derive(Args, Debug)]
pub(crate) struct CatalogArgs {
    /// grade, system or country
    #[arg(value_parser = parse_catalog_key)]
    pub(crate) key: CatalogKey,
}

#[derive(Debug, Serialize)]
pub(crate) struct CatalogReport {
    pub(crate) key: CatalogKey,
    pub(crate) catalog: Catalog,
}

impl fmt::Display for CatalogReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.catalog {
            Catalog::Grade(labels) => {
                for (level, label) in labels.iter() {
                    writeln!(f, "{level}: {label}")?;
                }
            }
            Catalog::System(systems) => {
                for (country, codes) in systems.iter() {
                    let codes: Vec<&str> = codes.iter().map(SystemCode::as_str).collect();
                    writeln!(f, "{country}: {}", codes.join(", "))?;
                }
            }
            Catalog::Country(countries) => {
                for (code, name) in countries.iter() {
                    writeln!(f, "{code}: {name}")?;
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn show_catalog(session: &Session, args: CatalogArgs) -> Result<CatalogReport, AppError> {
    let catalog = session
        .catalog
        .get_catalog(args.key)
        .map_err(ConversionError::from)?;

    Ok(CatalogReport {
        key: args.key,
        catalog,
    })
}

#[derive(Args, Debug, Default)]
pub(crate) struct CheckSeedArgs {
    /// CSV rule tables to register on top of the seed, in order
    #[arg(long = "rules")]
    pub(crate) rule_tables: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TableReport {
    pub(crate) path: PathBuf,
    pub(crate) inserted: usize,
    pub(crate) superseded: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct SeedCheckReport {
    pub(crate) source: PathBuf,
    pub(crate) inserted: usize,
    pub(crate) superseded: usize,
    pub(crate) systems: usize,
    pub(crate) grade_labels: usize,
    pub(crate) tables: Vec<TableReport>,
}

impl fmt::Display for SeedCheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Seed {}", self.source.display())?;
        writeln!(
            f,
            "- {} rule(s) registered, {} superseded",
            self.inserted, self.superseded
        )?;
        writeln!(
            f,
            "- {} grading system(s), {} grade label(s)",
            self.systems, self.grade_labels
        )?;
        for table in &self.tables {
            writeln!(
                f,
                "- {}: {} rule(s) registered, {} superseded",
                table.path.display(),
                table.inserted,
                table.superseded
            )?;
        }
        Ok(())
    }
}

pub(crate) fn check_seed(
    session: &Session,
    args: CheckSeedArgs,
) -> Result<SeedCheckReport, AppError> {
    let loader = SeedLoader::new(session.migration.clone());

    let mut tables = Vec::with_capacity(args.rule_tables.len());
    for path in args.rule_tables {
        let bundle = SeedBundle {
            catalog: session.catalog.clone(),
            rules: loader.rule_table_from_path(&path)?,
        };
        let report = bundle.register_into(&session.engine)?;
        tables.push(TableReport {
            path,
            inserted: report.inserted,
            superseded: report.superseded,
        });
    }

    let systems = session
        .catalog
        .system
        .as_ref()
        .map_or(0, |catalog| catalog.iter().map(|(_, codes)| codes.len()).sum::<usize>());
    let grade_labels = session.catalog.grade.as_ref().map_or(0, |labels| labels.len());

    Ok(SeedCheckReport {
        source: session.source.clone(),
        inserted: session.seeded.inserted,
        superseded: session.seeded.superseded,
        systems,
        grade_labels,
        tables,
    })
}
