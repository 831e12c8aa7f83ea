use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use tracing::{debug, warn};

const DEFAULT_DATABASE_PATH: &str = "bali_gigs.db";
const DEFAULT_GEOCODE_RETRIES: u32 = 2;
const DEFAULT_GEOCODE_RETRY_DELAY_MS: u64 = 800;

/// Bounding box in degrees, south/west corner to north/east corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl ViewBox {
    /// Accepts every coordinate.
    pub const WORLD: ViewBox = ViewBox {
        south: -90.0,
        west: -180.0,
        north: 90.0,
        east: 180.0,
    };

    /// Parses `"south,west,north,east"`.
    pub fn parse(value: &str) -> Option<Self> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?;
        match parts.as_slice() {
            &[south, west, north, east] if south <= north && west <= east => Some(Self {
                south,
                west,
                north,
                east,
            }),
            _ => None,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }
}

/// The region every address is biased towards.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionProfile {
    pub region: String,
    pub country: String,
    pub country_code: String,
    pub viewbox: ViewBox,
}

impl RegionProfile {
    pub fn bali() -> Self {
        Self {
            region: "Bali".into(),
            country: "Indonesia".into(),
            country_code: "id".into(),
            viewbox: ViewBox {
                south: -8.90,
                west: 114.25,
                north: -8.00,
                east: 115.90,
            },
        }
    }

    /// `"<region>, <country>"`, appended to the coarsest candidate.
    pub fn suffix(&self) -> String {
        format!("{}, {}", self.region, self.country)
    }
}

impl Default for RegionProfile {
    fn default() -> Self {
        Self::bali()
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub region: RegionProfile,
    pub geocode_retries: u32,
    pub geocode_retry_delay: Duration,
    pub gazetteer_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        let defaults = RegionProfile::bali();
        let region = parse_string("GEOCODE_REGION", &defaults.region);
        let viewbox = parse_viewbox(&region, &defaults);
        Self {
            database_path: env::var("DATABASE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            region: RegionProfile {
                region,
                country: parse_string("GEOCODE_COUNTRY", &defaults.country),
                country_code: parse_string("GEOCODE_COUNTRY_CODE", &defaults.country_code),
                viewbox,
            },
            geocode_retries: parse_u32("GEOCODE_RETRIES", DEFAULT_GEOCODE_RETRIES).max(1),
            geocode_retry_delay: Duration::from_millis(parse_u64(
                "GEOCODE_RETRY_DELAY_MS",
                DEFAULT_GEOCODE_RETRY_DELAY_MS,
            )),
            gazetteer_path: env::var("GEOCODE_GAZETTEER")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            region: RegionProfile::bali(),
            geocode_retries: DEFAULT_GEOCODE_RETRIES,
            geocode_retry_delay: Duration::from_millis(DEFAULT_GEOCODE_RETRY_DELAY_MS),
            gazetteer_path: None,
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

// The built-in box only fits the built-in region; any other region needs its
// own GEOCODE_VIEWBOX or runs unbounded.
fn parse_viewbox(region: &str, defaults: &RegionProfile) -> ViewBox {
    let raw = env::var("GEOCODE_VIEWBOX")
        .ok()
        .filter(|v| !v.trim().is_empty());
    match raw {
        Some(raw) => ViewBox::parse(&raw).unwrap_or_else(|| {
            warn!(
                value = %raw,
                "GEOCODE_VIEWBOX is not south,west,north,east; not bounding results"
            );
            ViewBox::WORLD
        }),
        None if region.eq_ignore_ascii_case(&defaults.region) => defaults.viewbox,
        None => {
            warn!(region, "no GEOCODE_VIEWBOX for this region; not bounding results");
            ViewBox::WORLD
        }
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}
