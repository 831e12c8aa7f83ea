use std::path::PathBuf;

use rusqlite::Connection;
use tracing::{debug, info, trace, warn};

use crate::csv_input::{ColumnSpec, CsvOptions, CsvTable};
use crate::errors::AppResult;
use crate::outcome::{ImportOutcome, RecordOutcome};
use crate::store::{BandChanges, BandRecord, BandStore, NewBand, SqliteStore, StoreTransaction};

pub const BAND_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        canonical: "band",
        aliases: &["name", "band name"],
    },
    ColumnSpec {
        canonical: "genre",
        aliases: &[],
    },
    ColumnSpec {
        canonical: "country",
        aliases: &[],
    },
    ColumnSpec {
        canonical: "city",
        aliases: &[],
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct BandRow {
    pub name: String,
    pub genre: Option<String>,
    pub city: Option<String>,
}

impl BandRow {
    /// `fields` follows [`BAND_COLUMNS`]. The country stands in for a blank city.
    pub fn parse(fields: &[String]) -> Self {
        let field = |index: usize| {
            let value = fields.get(index).map(|f| f.trim()).unwrap_or_default();
            (!value.is_empty()).then(|| value.to_string())
        };
        Self {
            name: field(0).unwrap_or_default(),
            genre: field(1),
            city: field(3).or_else(|| field(2)),
        }
    }
}

/// Genre and city are only overwritten by a non-empty value that differs.
pub fn band_changes(existing: &BandRecord, row: &BandRow) -> BandChanges {
    let changed = |incoming: &Option<String>, stored: &Option<String>| match incoming {
        Some(value) if stored.as_ref() != Some(value) => Some(value.clone()),
        _ => None,
    };
    BandChanges {
        genre: changed(&row.genre, &existing.genre),
        city: changed(&row.city, &existing.city),
    }
}

pub fn reconcile_band<S: BandStore>(store: &S, row: BandRow) -> AppResult<RecordOutcome> {
    if row.name.is_empty() {
        debug!("skipping band row without a name");
        return Ok(RecordOutcome::Skipped);
    }

    match store.find_band_by_name(&row.name)? {
        None => {
            let id = store.insert_band(&NewBand {
                name: row.name.clone(),
                genre: row.genre,
                city: row.city,
            })?;
            debug!(id, name = %row.name, "band created");
            Ok(RecordOutcome::Created)
        }
        Some(existing) => {
            let changes = band_changes(&existing, &row);
            if changes.is_empty() {
                trace!(id = existing.id, name = %row.name, "band unchanged");
                return Ok(RecordOutcome::Skipped);
            }
            store.update_band(existing.id, &changes)?;
            debug!(id = existing.id, name = %row.name, ?changes, "band updated");
            Ok(RecordOutcome::Updated)
        }
    }
}

#[derive(Debug, Clone)]
pub struct BandImportOptions {
    pub csv_path: PathBuf,
    pub csv: CsvOptions,
    pub dry_run: bool,
}

pub fn import_bands(
    connection: &mut Connection,
    options: &BandImportOptions,
) -> AppResult<ImportOutcome> {
    let table = CsvTable::open(&options.csv_path, &options.csv, BAND_COLUMNS)?;
    info!(
        path = %options.csv_path.display(),
        rows = table.len(),
        dry_run = options.dry_run,
        "importing bands"
    );

    let store = SqliteStore::begin(connection)?;
    let mut outcome = ImportOutcome::default();
    for (index, row) in table.rows().enumerate() {
        match row {
            Ok(fields) => {
                outcome.record(reconcile_band(&store, BandRow::parse(&fields))?);
            }
            Err(err) => {
                warn!(?err, row = index + 1, "unreadable CSV record");
                outcome.record(RecordOutcome::Failed);
            }
        }
    }

    if options.dry_run {
        store.rollback()?;
    } else {
        store.commit()?;
    }

    info!(
        created = outcome.created,
        updated = outcome.updated,
        skipped = outcome.skipped,
        failed = outcome.failed,
        "band import finished"
    );
    Ok(outcome)
}
