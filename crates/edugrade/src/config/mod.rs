use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::conversion::{ConversionConfig, SystemCode, DEFAULT_REFERENCE_SYSTEM};
use crate::seed::LegacyMigration;

const DEFAULT_SEED_PATH: &str = "crates/edugrade/data/seed.json";
const DEFAULT_SYSTEM_ALIASES: &str = "AR_1_10=ARG_1_10";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub conversion: ConversionConfig,
    pub seed: SeedConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let reference_system = SystemCode::new(
            &env::var("EDUGRADE_REFERENCE_SYSTEM")
                .unwrap_or_else(|_| DEFAULT_REFERENCE_SYSTEM.to_string()),
        );
        if reference_system.is_blank() {
            return Err(ConfigError::EmptyReferenceSystem);
        }

        let path = env::var("EDUGRADE_SEED_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SEED_PATH));
        let system_aliases = parse_aliases(
            &env::var("EDUGRADE_SYSTEM_ALIASES")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_ALIASES.to_string()),
        )?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            conversion: ConversionConfig { reference_system },
            seed: SeedConfig {
                path,
                system_aliases,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Where reference data comes from and how legacy codes are renamed on load.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub path: PathBuf,
    pub system_aliases: Vec<(String, String)>,
}

impl SeedConfig {
    pub fn migration(&self) -> LegacyMigration {
        self.system_aliases
            .iter()
            .fold(LegacyMigration::new(), |migration, (legacy, canonical)| {
                migration.with_alias(legacy, canonical)
            })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

fn parse_aliases(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((legacy, canonical))
                if !legacy.trim().is_empty() && !canonical.trim().is_empty() =>
            {
                Ok((legacy.trim().to_string(), canonical.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidAlias {
                entry: entry.to_string(),
            }),
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidAlias { entry: String },
    EmptyReferenceSystem,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAlias { entry } => write!(
                f,
                "EDUGRADE_SYSTEM_ALIASES entry '{}' must look like OLD=NEW",
                entry
            ),
            ConfigError::EmptyReferenceSystem => {
                write!(f, "EDUGRADE_REFERENCE_SYSTEM must not be empty")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
