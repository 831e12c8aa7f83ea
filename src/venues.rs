use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, info, trace, warn};

use crate::address::AddressNormalizer;
use crate::cache::GeocodeCache;
use crate::candidates;
use crate::config::RegionProfile;
use crate::csv_input::{ColumnSpec, CsvOptions, CsvTable};
use crate::errors::AppResult;
use crate::geocode::{
    Coordinate, GeocodeLookup, LookupPolicy, Pacer, RateLimitedLookupClient, RegionBias,
};
use crate::outcome::{ImportOutcome, RecordOutcome};
use crate::store::{NewVenue, SqliteStore, StoreTransaction, VenueChanges, VenueRecord, VenueStore};

pub const VENUE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        canonical: "Venue",
        aliases: &["venue name", "name"],
    },
    ColumnSpec {
        canonical: "Address / Notes",
        aliases: &["address", "address/notes", "address & notes"],
    },
    ColumnSpec {
        canonical: "Instagram name",
        aliases: &["instagram", "instagram handle"],
    },
    ColumnSpec {
        canonical: "Instgram link",
        aliases: &["instagram link", "link", "website"],
    },
];

static WEB_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("scheme pattern"));

/// One venue row after field clean-up.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueRow {
    pub name: String,
    pub address: String,
    pub instagram: Option<String>,
    pub website: Option<String>,
}

impl VenueRow {
    /// `fields` follows [`VENUE_COLUMNS`].
    pub fn parse(fields: &[String]) -> Self {
        let field = |index: usize| fields.get(index).map(String::as_str).unwrap_or_default();
        Self {
            name: field(0).trim().to_string(),
            address: field(1).trim().to_string(),
            instagram: clean_instagram(field(2)),
            website: resolve_website(field(3)),
        }
    }
}

/// Strips whitespace, a leading `@` and trailing slashes from a handle.
pub fn clean_instagram(handle: &str) -> Option<String> {
    let handle = handle.trim();
    let handle = handle.strip_prefix('@').unwrap_or(handle);
    let handle = handle.trim_end_matches('/');
    (!handle.is_empty()).then(|| handle.to_string())
}

/// Keeps a link only when it carries an http(s) scheme.
pub fn resolve_website(link: &str) -> Option<String> {
    let link = link.trim();
    WEB_SCHEME.is_match(link).then(|| link.to_string())
}

/// Address to coordinate resolution: cache first, then the rate limited
/// lookup over the generated candidates.
pub struct VenueGeocoder<L, P> {
    normalizer: AddressNormalizer,
    region: RegionProfile,
    client: RateLimitedLookupClient<L, P>,
    cache: GeocodeCache,
}

impl<L: GeocodeLookup, P: Pacer> VenueGeocoder<L, P> {
    pub fn new(
        region: RegionProfile,
        policy: LookupPolicy,
        lookup: L,
        pacer: P,
        cache: GeocodeCache,
    ) -> Self {
        let bias = RegionBias::from(&region);
        Self {
            normalizer: AddressNormalizer::new(&region),
            client: RateLimitedLookupClient::new(lookup, pacer, policy, bias),
            region,
            cache,
        }
    }

    pub fn locate(&mut self, raw_address: &str) -> Option<Coordinate> {
        if let Some(hit) = self.cache.get(raw_address) {
            trace!(address = raw_address, "geocode cache hit");
            return Some(hit);
        }

        let normalized = self.normalizer.normalize(raw_address);
        let candidates = candidates::generate(&normalized, &self.region);
        debug!(address = raw_address, ?candidates, "geocoding address");

        let found = self.client.resolve(&candidates)?;
        self.cache.insert(raw_address, found);
        Some(found)
    }

    pub fn queries_issued(&self) -> u64 {
        self.client.queries_issued()
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn into_cache(self) -> GeocodeCache {
        self.cache
    }
}

/// Drives each row through validate, geocode and reconcile.
pub struct VenueReconciler<'s, S, L, P> {
    store: &'s S,
    geocoder: VenueGeocoder<L, P>,
    outcome: ImportOutcome,
}

impl<'s, S: VenueStore, L: GeocodeLookup, P: Pacer> VenueReconciler<'s, S, L, P> {
    pub fn new(store: &'s S, geocoder: VenueGeocoder<L, P>) -> Self {
        Self {
            store,
            geocoder,
            outcome: ImportOutcome::default(),
        }
    }

    /// Store failures abort the run; everything else is tallied.
    pub fn process(&mut self, row: VenueRow) -> AppResult<RecordOutcome> {
        if row.name.is_empty() || row.address.is_empty() {
            debug!(name = %row.name, "skipping row without name or address");
            return Ok(self.outcome.record(RecordOutcome::Skipped));
        }

        let Some(coordinate) = self.geocoder.locate(&row.address) else {
            warn!(name = %row.name, address = %row.address, "could not geocode venue");
            return Ok(self.outcome.record(RecordOutcome::Failed));
        };

        let outcome = match self.store.find_venue_by_name(&row.name)? {
            None => {
                let id = self.store.insert_venue(&NewVenue {
                    name: row.name.clone(),
                    address: row.address,
                    coordinate,
                    instagram: row.instagram,
                    website: row.website,
                })?;
                debug!(id, name = %row.name, "venue created");
                RecordOutcome::Created
            }
            Some(existing) => {
                let changes = venue_changes(&existing, &row, coordinate);
                if changes.is_empty() {
                    trace!(id = existing.id, name = %row.name, "venue unchanged");
                    RecordOutcome::Skipped
                } else {
                    self.store.update_venue(existing.id, &changes)?;
                    debug!(id = existing.id, name = %row.name, ?changes, "venue updated");
                    RecordOutcome::Updated
                }
            }
        };
        Ok(self.outcome.record(outcome))
    }

    pub fn record_failure(&mut self) {
        self.outcome.record(RecordOutcome::Failed);
    }

    pub fn outcome(&self) -> ImportOutcome {
        self.outcome
    }

    pub fn into_parts(self) -> (ImportOutcome, VenueGeocoder<L, P>) {
        (self.outcome, self.geocoder)
    }
}

/// Differences worth writing. The coordinate pair is compared and written
/// as one value; a missing website never clears a stored one.
pub fn venue_changes(
    existing: &VenueRecord,
    row: &VenueRow,
    coordinate: Coordinate,
) -> VenueChanges {
    let mut changes = VenueChanges::default();
    if existing.address.as_deref() != Some(row.address.as_str()) {
        changes.address = Some(row.address.clone());
    }
    if existing.coordinate() != coordinate {
        changes.coordinate = Some(coordinate);
    }
    if existing.instagram != row.instagram {
        changes.instagram = Some(row.instagram.clone());
    }
    if let Some(website) = &row.website {
        if existing.website.as_ref() != Some(website) {
            changes.website = Some(website.clone());
        }
    }
    changes
}

#[derive(Debug, Clone)]
pub struct VenueImportOptions {
    pub csv_path: PathBuf,
    pub csv: CsvOptions,
    pub dry_run: bool,
    pub cache_path: PathBuf,
    pub region: RegionProfile,
    pub policy: LookupPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VenueImportReport {
    pub outcome: ImportOutcome,
    pub dry_run: bool,
    pub queries_issued: u64,
    pub cache_entries_added: usize,
    pub cache_written: bool,
}

impl VenueImportReport {
    pub fn summary(&self) -> String {
        self.outcome.venue_summary(self.dry_run)
    }
}

/// Imports venues from a CSV file in one transaction.
///
/// Dry runs make the same decisions and populate the cache the same way, then
/// roll the transaction back. The cache is written after the store is settled
/// and a failed write only logs a warning.
pub fn import_venues<L: GeocodeLookup, P: Pacer>(
    connection: &mut Connection,
    options: &VenueImportOptions,
    lookup: L,
    pacer: P,
) -> AppResult<VenueImportReport> {
    let table = CsvTable::open(&options.csv_path, &options.csv, VENUE_COLUMNS)?;
    let cache = GeocodeCache::load(&options.cache_path);
    info!(
        path = %options.csv_path.display(),
        rows = table.len(),
        dry_run = options.dry_run,
        "importing venues"
    );

    let geocoder = VenueGeocoder::new(
        options.region.clone(),
        options.policy,
        lookup,
        pacer,
        cache,
    );
    let store = SqliteStore::begin(connection)?;
    let mut reconciler = VenueReconciler::new(&store, geocoder);

    for (index, row) in table.rows().enumerate() {
        match row {
            Ok(fields) => {
                reconciler.process(VenueRow::parse(&fields))?;
            }
            Err(err) => {
                warn!(?err, row = index + 1, "unreadable CSV record");
                reconciler.record_failure();
            }
        }
    }

    let (outcome, geocoder) = reconciler.into_parts();
    let queries_issued = geocoder.queries_issued();
    let cache = geocoder.into_cache();

    let settled = if options.dry_run {
        store.rollback()
    } else {
        store.commit()
    };

    let cache_written = match cache.flush() {
        Ok(()) => true,
        Err(err) => {
            warn!(?err, path = %cache.path().display(), "failed to write geocode cache");
            false
        }
    };
    settled?;

    info!(
        created = outcome.created,
        updated = outcome.updated,
        skipped = outcome.skipped,
        failed = outcome.failed,
        queries_issued,
        "venue import finished"
    );
    Ok(VenueImportReport {
        outcome,
        dry_run: options.dry_run,
        queries_issued,
        cache_entries_added: cache.inserted(),
        cache_written,
    })
}
