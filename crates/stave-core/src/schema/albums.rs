use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::OptionalExtension;

use crate::error::Result;
use crate::model::album::{join_genres, split_genres};
use crate::model::{Album, AlbumId, Artist, ArtistId, IdentityHash, NativeKey, NewAlbum, Upsert};

use super::db::{hash_collision, map_unique_violation, Database};

const ALBUM_COLUMNS: &str = "id, name, sort_name, artist_id, artist_name, release_date, genres, \
                             track_count, native_id, native_thumb, hash";

fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<Album> {
    let release_date: Option<String> = row.get(5)?;
    let release_date = release_date
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    let genres: Option<String> = row.get(6)?;

    Ok(Album {
        id: row.get(0)?,
        name: row.get(1)?,
        sort_name: row.get(2)?,
        artist_id: row.get(3)?,
        artist_name: row.get(4)?,
        release_date,
        genres: split_genres(genres.as_deref()),
        track_count: row.get(7)?,
        native_id: row.get(8)?,
        native_thumb: row.get(9)?,
        hash: row.get(10)?,
    })
}

// Album CRUD
impl Database {
    fn query_albums(&self, filter: &str, params: impl rusqlite::Params) -> Result<Vec<Album>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE {filter}"
        ))?;
        let albums = stmt
            .query_map(params, row_to_album)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(albums)
    }

    fn query_album(&self, filter: &str, params: impl rusqlite::Params) -> Result<Option<Album>> {
        let album = self
            .conn
            .query_row(
                &format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE {filter} LIMIT 1"),
                params,
                row_to_album,
            )
            .optional()?;
        Ok(album)
    }

    pub fn get_album_by_id(&self, id: AlbumId) -> Result<Option<Album>> {
        self.query_album("id = ?1", [id])
    }

    pub fn get_album_by_hash(&self, hash: IdentityHash) -> Result<Option<Album>> {
        self.query_album("hash = ?1", [hash])
    }

    pub fn get_album_by_native_id(&self, key: NativeKey) -> Result<Option<Album>> {
        self.query_album("native_id = ?1", [key])
    }

    /// Find an album by its name and the name of its artist.
    pub fn get_album_by_name(&self, artist_name: &str, name: &str) -> Result<Option<Album>> {
        self.query_album("artist_name = ?1 AND name = ?2", [artist_name, name])
    }

    pub fn list_albums(&self) -> Result<Vec<Album>> {
        self.query_albums("1 = 1 ORDER BY artist_name COLLATE NOCASE, release_date, name", [])
    }

    /// Albums owned by an artist, oldest release first.
    pub fn list_albums_for_artist(&self, artist_id: ArtistId) -> Result<Vec<Album>> {
        self.query_albums(
            "artist_id = ?1 ORDER BY release_date, name COLLATE NOCASE",
            [artist_id],
        )
    }

    /// Insert an album under `artist` unless one with the same identity
    /// hash exists.
    pub fn insert_album(&self, album: &NewAlbum, artist: &Artist) -> Result<Upsert<Album>> {
        let hash = album.identity_hash(&artist.name);
        if let Some(existing) = self.get_album_by_hash(hash)? {
            if existing.name != album.name || existing.artist_name != artist.name {
                return Err(hash_collision(
                    "album",
                    &format!("{} / {}", existing.artist_name, existing.name),
                    &format!("{} / {}", artist.name, album.name),
                ));
            }
            return Ok(Upsert::Existing(existing));
        }

        let genres = join_genres(&album.genres);
        self.conn
            .execute(
                "INSERT INTO albums (
                    name, sort_name, artist_id, artist_name, release_date, genres,
                    track_count, native_id, native_thumb, hash
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    album.name,
                    album.sort_name,
                    artist.id,
                    artist.name,
                    album.release_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    genres,
                    album.track_count,
                    album.native_id,
                    album.native_thumb,
                    hash,
                ],
            )
            .map_err(|e| map_unique_violation(e, "album", &album.name))?;

        Ok(Upsert::Created(Album {
            id: AlbumId::new(self.conn.last_insert_rowid()),
            name: album.name.clone(),
            sort_name: album.sort_name.clone(),
            artist_id: artist.id,
            artist_name: artist.name.clone(),
            release_date: album.release_date,
            genres: split_genres(genres.as_deref()),
            track_count: album.track_count,
            native_id: album.native_id,
            native_thumb: album.native_thumb,
            hash,
        }))
    }

    /// Delete the album with the given upstream key (tracks cascade).
    /// Returns the number of album rows removed.
    pub fn delete_album_by_native_id(&self, key: NativeKey) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM albums WHERE native_id = ?1", [key])?;
        Ok(removed)
    }
}
