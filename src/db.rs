use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::info;

use crate::errors::AppResult;

pub struct DatabaseContext {
    pub connection: Connection,
    pub path: PathBuf,
}

/// Opens (creating if needed) the gig guide database and makes sure the
/// tables the importers write to exist.
pub fn bootstrap<P: AsRef<Path>>(db_path: P) -> AppResult<DatabaseContext> {
    let db_path = db_path.as_ref();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let connection = Connection::open_with_flags(db_path, flags)?;
    configure(&connection)?;
    run_migrations(&connection)?;

    info!(
        target: "database_bootstrap",
        path = %db_path.display(),
        "database ready"
    );
    Ok(DatabaseContext {
        connection,
        path: db_path.to_path_buf(),
    })
}

fn configure(connection: &Connection) -> AppResult<()> {
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;
        "#,
    )?;
    Ok(())
}

fn run_migrations(connection: &Connection) -> AppResult<()> {
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS bands (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            genre TEXT,
            city TEXT,
            instagram TEXT,
            youtube TEXT,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS venues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            address TEXT,
            district TEXT,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            instagram TEXT,
            website TEXT,
            notes TEXT
        );
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn runs_migrations_and_creates_tables() {
        let dir = tempdir().unwrap();
        let ctx = bootstrap(dir.path().join("gigs.db")).unwrap();

        let mut stmt = ctx
            .connection
            .prepare(
                "SELECT name FROM sqlite_master
                WHERE type = 'table' AND name IN ('bands', 'venues')",
            )
            .unwrap();
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .count();
        assert_eq!(rows, 2);
        assert!(ctx.path.ends_with("gigs.db"));
    }

    #[test]
    fn bootstrap_is_idempotent_and_keeps_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("gigs.db");
        {
            let ctx = bootstrap(&path).unwrap();
            ctx.connection
                .execute(
                    "INSERT INTO venues (name, lat, lon) VALUES ('Twice Bar', -8.71, 115.17)",
                    [],
                )
                .unwrap();
        }

        let ctx = bootstrap(&path).unwrap();
        let count: i64 = ctx
            .connection
            .query_row("SELECT COUNT(*) FROM venues", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn venue_names_are_unique() {
        let dir = tempdir().unwrap();
        let ctx = bootstrap(dir.path().join("gigs.db")).unwrap();
        let insert = "INSERT INTO venues (name, lat, lon) VALUES ('Twice Bar', 0.0, 0.0)";
        ctx.connection.execute(insert, []).unwrap();
        assert!(ctx.connection.execute(insert, []).is_err());
    }
}
