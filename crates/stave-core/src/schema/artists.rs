use rusqlite::OptionalExtension;

use crate::error::Result;
use crate::model::{Artist, ArtistId, IdentityHash, NativeKey, NewArtist, Upsert};

use super::db::{hash_collision, map_unique_violation, Database};

const ARTIST_COLUMNS: &str = "id, name, sort_name, album_count, native_id, native_thumb, hash";

fn row_to_artist(row: &rusqlite::Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        name: row.get(1)?,
        sort_name: row.get(2)?,
        album_count: row.get(3)?,
        native_id: row.get(4)?,
        native_thumb: row.get(5)?,
        hash: row.get(6)?,
    })
}

// Artist CRUD
impl Database {
    fn query_artist(&self, filter: &str, param: &dyn rusqlite::ToSql) -> Result<Option<Artist>> {
        let artist = self
            .conn
            .query_row(
                &format!("SELECT {ARTIST_COLUMNS} FROM artists WHERE {filter} LIMIT 1"),
                [param],
                row_to_artist,
            )
            .optional()?;
        Ok(artist)
    }

    pub fn get_artist_by_id(&self, id: ArtistId) -> Result<Option<Artist>> {
        self.query_artist("id = ?1", &id)
    }

    pub fn get_artist_by_hash(&self, hash: IdentityHash) -> Result<Option<Artist>> {
        self.query_artist("hash = ?1", &hash)
    }

    pub fn get_artist_by_native_id(&self, key: NativeKey) -> Result<Option<Artist>> {
        self.query_artist("native_id = ?1", &key)
    }

    pub fn get_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        self.query_artist("name = ?1", &name)
    }

    /// List all artists in sort order.
    pub fn list_artists(&self) -> Result<Vec<Artist>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARTIST_COLUMNS} FROM artists
             ORDER BY COALESCE(sort_name, name) COLLATE NOCASE, id"
        ))?;
        let artists = stmt
            .query_map([], row_to_artist)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(artists)
    }

    /// Insert an artist unless one with the same identity hash exists.
    pub fn insert_artist(&self, artist: &NewArtist) -> Result<Upsert<Artist>> {
        let hash = artist.identity_hash();
        if let Some(existing) = self.get_artist_by_hash(hash)? {
            if existing.name != artist.name {
                return Err(hash_collision("artist", &existing.name, &artist.name));
            }
            return Ok(Upsert::Existing(existing));
        }

        self.conn
            .execute(
                "INSERT INTO artists (name, sort_name, album_count, native_id, native_thumb, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    artist.name,
                    artist.sort_name,
                    artist.album_count,
                    artist.native_id,
                    artist.native_thumb,
                    hash,
                ],
            )
            .map_err(|e| map_unique_violation(e, "artist", &artist.name))?;

        Ok(Upsert::Created(Artist {
            id: ArtistId::new(self.conn.last_insert_rowid()),
            name: artist.name.clone(),
            sort_name: artist.sort_name.clone(),
            album_count: artist.album_count,
            native_id: artist.native_id,
            native_thumb: artist.native_thumb,
            hash,
        }))
    }

    /// Delete the artist with the given upstream key. Its albums and tracks
    /// are removed by cascade. Returns the number of artist rows removed.
    pub fn delete_artist_by_native_id(&self, key: NativeKey) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM artists WHERE native_id = ?1", [key])?;
        Ok(removed)
    }
}
