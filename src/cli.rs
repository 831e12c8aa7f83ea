use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Import venues and bands from CSV into the gig guide database",
    long_about = "Import venues (with geocoded coordinates) and bands from CSV into the gig guide database.\n\nEnvironment:\n  DATABASE_PATH           SQLite file (default bali_gigs.db)\n  GEOCODE_GAZETTEER       Offline lookup table used to resolve addresses\n  GEOCODE_VIEWBOX         south,west,north,east bounds for a non-Bali region\n  GEOCODE_RETRIES         Attempts per candidate (default 2)\n  GEOCODE_RETRY_DELAY_MS  Pause between attempts (default 800)\n  RUST_LOG                Log filter (default info)\n"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "SQLite database to import into (overrides DATABASE_PATH)"
    )]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import venues, geocoding each address.
    Venues(VenueArgs),
    /// Import bands.
    Bands(BandArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CsvArgs {
    #[arg(value_name = "CSV", help = "Input CSV file")]
    pub csv_path: PathBuf,

    #[arg(long, default_value = "utf-8", help = "Input encoding (utf-8, utf-8-sig, latin-1)")]
    pub encoding: String,

    #[arg(long, default_value = ",", help = "Field delimiter")]
    pub delimiter: String,

    #[arg(long, default_value_t = false, help = "Report what would change, then roll back")]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct VenueArgs {
    #[command(flatten)]
    pub csv: CsvArgs,

    #[arg(
        long,
        default_value = "geocode_cache.json",
        value_name = "PATH",
        help = "Geocode cache file"
    )]
    pub cache: PathBuf,

    #[arg(
        long,
        default_value_t = 1.0,
        value_name = "SECONDS",
        help = "Minimum interval between geocoding requests"
    )]
    pub sleep: f64,

    #[arg(
        long,
        value_name = "PATH",
        help = "Offline lookup table (overrides GEOCODE_GAZETTEER)"
    )]
    pub gazetteer: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BandArgs {
    #[command(flatten)]
    pub csv: CsvArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_venue_defaults() {
        let cli = Cli::try_parse_from(["gigs-importer", "venues", "venues.csv"]).unwrap();
        assert!(cli.database.is_none());
        match cli.command {
            Command::Venues(args) => {
                assert_eq!(args.csv.csv_path, PathBuf::from("venues.csv"));
                assert_eq!(args.csv.encoding, "utf-8");
                assert_eq!(args.csv.delimiter, ",");
                assert!(!args.csv.dry_run);
                assert_eq!(args.cache, PathBuf::from("geocode_cache.json"));
                assert_eq!(args.sleep, 1.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn database_flag_is_global() {
        let cli = Cli::try_parse_from([
            "gigs-importer",
            "bands",
            "bands.csv",
            "--dry-run",
            "--delimiter",
            ";",
            "--database",
            "/tmp/gigs.db",
        ])
        .unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/gigs.db")));
        match cli.command {
            Command::Bands(args) => {
                assert!(args.csv.dry_run);
                assert_eq!(args.csv.delimiter, ";");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn csv_path_is_required() {
        assert!(Cli::try_parse_from(["gigs-importer", "venues"]).is_err());
    }
}
