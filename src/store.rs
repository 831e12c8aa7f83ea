use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};

use crate::errors::AppResult;
use crate::geocode::Coordinate;

#[derive(Debug, Clone, PartialEq)]
pub struct VenueRecord {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub district: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub instagram: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

impl VenueRecord {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVenue {
    pub name: String,
    pub address: String,
    pub coordinate: Coordinate,
    pub instagram: Option<String>,
    pub website: Option<String>,
}

/// Fields to rewrite on an existing venue; `None` leaves a column alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VenueChanges {
    pub address: Option<String>,
    pub coordinate: Option<Coordinate>,
    /// `Some(None)` clears the handle.
    pub instagram: Option<Option<String>>,
    pub website: Option<String>,
}

impl VenueChanges {
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.coordinate.is_none()
            && self.instagram.is_none()
            && self.website.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandRecord {
    pub id: i64,
    pub name: String,
    pub genre: Option<String>,
    pub city: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBand {
    pub name: String,
    pub genre: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandChanges {
    pub genre: Option<String>,
    pub city: Option<String>,
}

impl BandChanges {
    pub fn is_empty(&self) -> bool {
        self.genre.is_none() && self.city.is_none()
    }
}

pub trait VenueStore {
    fn find_venue_by_name(&self, name: &str) -> AppResult<Option<VenueRecord>>;
    fn insert_venue(&self, venue: &NewVenue) -> AppResult<i64>;
    fn update_venue(&self, id: i64, changes: &VenueChanges) -> AppResult<()>;
}

pub trait BandStore {
    fn find_band_by_name(&self, name: &str) -> AppResult<Option<BandRecord>>;
    fn insert_band(&self, band: &NewBand) -> AppResult<i64>;
    fn update_band(&self, id: i64, changes: &BandChanges) -> AppResult<()>;
}

/// The run's single unit of work: everything is committed or nothing is.
pub trait StoreTransaction {
    fn commit(self) -> AppResult<()>;
    fn rollback(self) -> AppResult<()>;
}

/// Store collaborator backed by one SQLite transaction.
pub struct SqliteStore<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> SqliteStore<'conn> {
    pub fn begin(connection: &'conn mut Connection) -> AppResult<Self> {
        let tx = connection.transaction()?;
        Ok(Self { tx })
    }
}

impl StoreTransaction for SqliteStore<'_> {
    fn commit(self) -> AppResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> AppResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

impl VenueStore for SqliteStore<'_> {
    fn find_venue_by_name(&self, name: &str) -> AppResult<Option<VenueRecord>> {
        let venue = self
            .tx
            .query_row(
                "SELECT id, name, address, district, lat, lon, instagram, website, notes
                FROM venues
                WHERE name = ?1",
                [name],
                parse_venue,
            )
            .optional()?;
        Ok(venue)
    }

    fn insert_venue(&self, venue: &NewVenue) -> AppResult<i64> {
        self.tx.execute(
            "INSERT INTO venues (name, address, district, lat, lon, instagram, website, notes)
            VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, NULL)",
            params![
                venue.name,
                venue.address,
                venue.coordinate.lat,
                venue.coordinate.lon,
                venue.instagram,
                venue.website,
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    fn update_venue(&self, id: i64, changes: &VenueChanges) -> AppResult<()> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(address) = &changes.address {
            assignments.push("address = ?");
            values.push(Value::Text(address.clone()));
        }
        if let Some(coordinate) = changes.coordinate {
            assignments.push("lat = ?");
            values.push(Value::Real(coordinate.lat));
            assignments.push("lon = ?");
            values.push(Value::Real(coordinate.lon));
        }
        if let Some(instagram) = &changes.instagram {
            assignments.push("instagram = ?");
            values.push(instagram.clone().map(Value::Text).unwrap_or(Value::Null));
        }
        if let Some(website) = &changes.website {
            assignments.push("website = ?");
            values.push(Value::Text(website.clone()));
        }
        if assignments.is_empty() {
            return Ok(());
        }

        values.push(Value::Integer(id));
        let sql = format!("UPDATE venues SET {} WHERE id = ?", assignments.join(", "));
        self.tx.execute(&sql, params_from_iter(values))?;
        Ok(())
    }
}

impl BandStore for SqliteStore<'_> {
    fn find_band_by_name(&self, name: &str) -> AppResult<Option<BandRecord>> {
        let band = self
            .tx
            .query_row(
                "SELECT id, name, genre, city, instagram, youtube, description
                FROM bands
                WHERE name = ?1",
                [name],
                parse_band,
            )
            .optional()?;
        Ok(band)
    }

    fn insert_band(&self, band: &NewBand) -> AppResult<i64> {
        self.tx.execute(
            "INSERT INTO bands (name, genre, city, instagram, youtube, description)
            VALUES (?1, ?2, ?3, NULL, NULL, NULL)",
            params![band.name, band.genre, band.city],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    fn update_band(&self, id: i64, changes: &BandChanges) -> AppResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.tx.execute(
            "UPDATE bands
            SET genre = COALESCE(?1, genre),
                city = COALESCE(?2, city)
            WHERE id = ?3",
            params![changes.genre, changes.city, id],
        )?;
        Ok(())
    }
}

fn parse_venue(row: &Row<'_>) -> rusqlite::Result<VenueRecord> {
    Ok(VenueRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        district: row.get(3)?,
        lat: row.get(4)?,
        lon: row.get(5)?,
        instagram: row.get(6)?,
        website: row.get(7)?,
        notes: row.get(8)?,
    })
}

fn parse_band(row: &Row<'_>) -> rusqlite::Result<BandRecord> {
    Ok(BandRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        genre: row.get(2)?,
        city: row.get(3)?,
        instagram: row.get(4)?,
        youtube: row.get(5)?,
        description: row.get(6)?,
    })
}
