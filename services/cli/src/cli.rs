use std::path::PathBuf;

use clap::{Parser, Subcommand};
use edugrade::config::AppConfig;
use edugrade::error::AppError;
use edugrade::telemetry;

use crate::commands::{
    check_seed, convert, emit, history, project, round_trip, show_catalog, CatalogArgs,
    CheckSeedArgs, ConvertArgs, HistoryArgs, ProjectArgs, RoundTripArgs, Session,
};

#[derive(Parser, Debug)]
#[command(
    name = "edugrade",
    about = "Convert grades between grading systems through the reference scale",
    version
)]
struct Cli {
    /// Seed document to load (overrides EDUGRADE_SEED_PATH)
    #[arg(long, global = true)]
    seed: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one grade into or out of the reference scale
    Convert(ConvertArgs),
    /// Convert into the reference scale and back again
    RoundTrip(RoundTripArgs),
    /// Display stored reference grades in another grading system
    Project(ProjectArgs),
    /// List every version of a conversion rule
    History(HistoryArgs),
    /// Print an option catalog
    Catalog(CatalogArgs),
    /// Load the seed (and optional rule tables) and report what registered
    CheckSeed(CheckSeedArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let seed_path = cli.seed.unwrap_or_else(|| config.seed.path.clone());
    let session = Session::load(&seed_path, &config)?;

    match cli.command {
        Command::Convert(args) => emit(&convert(&session, args)?, cli.json),
        Command::RoundTrip(args) => emit(&round_trip(&session, args)?, cli.json),
        Command::Project(args) => emit(&project(&session, args)?, cli.json),
        Command::History(args) => emit(&history(&session, args)?, cli.json),
        Command::Catalog(args) => emit(&show_catalog(&session, args)?, cli.json),
        Command::CheckSeed(args) => emit(&check_seed(&session, args)?, cli.json),
    }
}
