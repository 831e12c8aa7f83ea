pub mod address;
pub mod bands;
pub mod cache;
pub mod candidates;
pub mod cli;
pub mod config;
pub mod csv_input;
pub mod db;
pub mod errors;
pub mod geocode;
pub mod outcome;
pub mod store;
pub mod venues;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use once_cell::sync::OnceCell;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{BandArgs, Cli, Command, CsvArgs, VenueArgs};

pub use crate::bands::{import_bands, BandImportOptions};
pub use crate::cache::GeocodeCache;
pub use crate::config::{AppConfig, RegionProfile, ViewBox};
pub use crate::csv_input::{CsvOptions, TextEncoding};
pub use crate::db::{bootstrap, DatabaseContext};
pub use crate::errors::{AppError, AppResult};
pub use crate::geocode::{
    Coordinate, GazetteerLookup, GeocodeLookup, LookupPolicy, OfflineLookup, Pacer, RegionBias,
    SystemPacer,
};
pub use crate::outcome::{ImportOutcome, RecordOutcome};
pub use crate::venues::{import_venues, VenueImportOptions, VenueImportReport};

/// Binary entry point: parses arguments, runs one import and prints its
/// summary line on stdout.
pub fn run() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match execute(cli, &config) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "import aborted");
            ExitCode::from(err.exit_code())
        }
    }
}

fn execute(cli: Cli, config: &AppConfig) -> AppResult<String> {
    let database_path = cli
        .database
        .unwrap_or_else(|| config.database_path.clone());

    match cli.command {
        Command::Venues(args) => {
            let options = venue_options(&args, config)?;
            require_input(&options.csv_path)?;
            let gazetteer = args.gazetteer.as_deref().or(config.gazetteer_path.as_deref());
            let lookup = select_lookup(gazetteer)?;
            let mut ctx = bootstrap(&database_path)?;
            let report = import_venues(&mut ctx.connection, &options, lookup, SystemPacer)?;
            info!(
                queries = report.queries_issued,
                cache_added = report.cache_entries_added,
                cache_written = report.cache_written,
                "geocoding totals"
            );
            Ok(report.summary())
        }
        Command::Bands(BandArgs { csv }) => {
            let options = BandImportOptions {
                csv_path: csv.csv_path.clone(),
                csv: csv_options(&csv)?,
                dry_run: csv.dry_run,
            };
            require_input(&options.csv_path)?;
            let mut ctx = bootstrap(&database_path)?;
            let outcome = import_bands(&mut ctx.connection, &options)?;
            Ok(outcome.band_summary(options.dry_run))
        }
    }
}

fn csv_options(args: &CsvArgs) -> AppResult<CsvOptions> {
    Ok(CsvOptions {
        encoding: TextEncoding::parse(&args.encoding)?,
        delimiter: csv_input::parse_delimiter(&args.delimiter)?,
    })
}

fn venue_options(args: &VenueArgs, config: &AppConfig) -> AppResult<VenueImportOptions> {
    let min_interval = Duration::try_from_secs_f64(args.sleep).map_err(|_| {
        AppError::Config(format!(
            "--sleep must be a non-negative number of seconds, got {}",
            args.sleep
        ))
    })?;
    Ok(VenueImportOptions {
        csv_path: args.csv.csv_path.clone(),
        csv: csv_options(&args.csv)?,
        dry_run: args.csv.dry_run,
        cache_path: args.cache.clone(),
        region: config.region.clone(),
        policy: LookupPolicy {
            min_interval,
            attempts: config.geocode_retries,
            retry_delay: config.geocode_retry_delay,
        },
    })
}

// Runs before bootstrap; a missing input must not create the database file.
fn require_input(path: &Path) -> AppResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AppError::InputNotFound(path.to_path_buf()))
    }
}

fn select_lookup(gazetteer: Option<&Path>) -> AppResult<Box<dyn GeocodeLookup>> {
    match gazetteer {
        Some(path) => {
            let table = GazetteerLookup::load(path)?;
            info!(path = %path.display(), entries = table.len(), "using gazetteer lookup");
            Ok(Box::new(table))
        }
        None => {
            warn!("no geocoding backend configured; only cached addresses will resolve");
            Ok(Box::new(OfflineLookup))
        }
    }
}

fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
