use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::IdentityHash;

use super::migrations::MIGRATIONS;

/// How long a writer waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Row counts per catalog table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub artists: u64,
    pub albums: u64,
    pub tracks: u64,
}

impl CatalogCounts {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.artists + self.albums + self.tracks
    }
}

/// A connection to the catalog mirror.
///
/// Artists own albums and albums own tracks; foreign keys are enforced on
/// every connection and deleting a parent cascades to its subtree.
#[derive(Debug)]
pub struct Database {
    pub(super) conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Per-connection setting; it is not persisted with the schema.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Whole-catalog operations
impl Database {
    /// Remove every artist, album and track.
    pub fn clear_catalog(&self) -> Result<()> {
        log::warn!("Clearing all catalog tables");
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM tracks", [])?;
        tx.execute("DELETE FROM albums", [])?;
        tx.execute("DELETE FROM artists", [])?;
        tx.commit()?;
        Ok(())
    }

    pub fn counts(&self) -> Result<CatalogCounts> {
        let count = |table: &str| -> Result<u64> {
            let n: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
            Ok(n as u64)
        };

        Ok(CatalogCounts {
            artists: count("artists")?,
            albums: count("albums")?,
            tracks: count("tracks")?,
        })
    }

    /// Every identity hash in the catalog, sorted.
    pub fn all_hashes(&self) -> Result<Vec<IdentityHash>> {
        let mut stmt = self.conn.prepare(
            "SELECT hash FROM artists
             UNION ALL SELECT hash FROM albums
             UNION ALL SELECT hash FROM tracks
             ORDER BY 1",
        )?;
        let hashes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hashes)
    }
}

/// Convert a uniqueness violation into [`Error::DuplicateEntity`].
pub(super) fn map_unique_violation(
    err: rusqlite::Error,
    entity: &'static str,
    name: &str,
) -> Error {
    if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return Error::DuplicateEntity {
                entity,
                detail: format!(
                    "{name:?}: {}",
                    message.as_deref().unwrap_or("unique constraint failed")
                ),
            };
        }
    }
    Error::Database(err)
}

/// The identity hash matched a row whose natural key is different.
pub(super) fn hash_collision(entity: &'static str, stored: &str, incoming: &str) -> Error {
    log::error!(
        "Identity hash collision between {entity} {stored:?} and {incoming:?}"
    );
    Error::DuplicateEntity {
        entity,
        detail: format!("identity hash of {incoming:?} collides with {stored:?}"),
    }
}
