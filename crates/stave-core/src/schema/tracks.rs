use rusqlite::OptionalExtension;

use crate::error::{Error, Result};
use crate::model::{Album, AlbumId, IdentityHash, NativeKey, NewTrack, Track, TrackId, Upsert};

use super::db::{hash_collision, map_unique_violation, Database};

const TRACK_COLUMNS: &str = "id, name, sort_name, artist_id, artist_name, album_id, album_name, \
                             duration_ms, track_num, disc_num, location, bitrate, size, format, \
                             native_id, hash";

fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        name: row.get(1)?,
        sort_name: row.get(2)?,
        artist_id: row.get(3)?,
        artist_name: row.get(4)?,
        album_id: row.get(5)?,
        album_name: row.get(6)?,
        duration_ms: row.get(7)?,
        track_num: row.get(8)?,
        disc_num: row.get(9)?,
        location: row.get(10)?,
        bitrate: row.get(11)?,
        size: row
            .get::<_, Option<i64>>(12)?
            .map(|n| {
                u64::try_from(n).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(12, n))
            })
            .transpose()?,
        format: row.get(13)?,
        native_id: row.get(14)?,
        hash: row.get(15)?,
    })
}

// Track CRUD
impl Database {
    fn query_track(&self, filter: &str, params: impl rusqlite::Params) -> Result<Option<Track>> {
        let track = self
            .conn
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE {filter} LIMIT 1"),
                params,
                row_to_track,
            )
            .optional()?;
        Ok(track)
    }

    fn query_tracks(&self, filter: &str, params: impl rusqlite::Params) -> Result<Vec<Track>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE {filter}"
        ))?;
        let tracks = stmt
            .query_map(params, row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    pub fn get_track_by_id(&self, id: TrackId) -> Result<Option<Track>> {
        self.query_track("id = ?1", [id])
    }

    pub fn get_track_by_hash(&self, hash: IdentityHash) -> Result<Option<Track>> {
        self.query_track("hash = ?1", [hash])
    }

    pub fn get_track_by_native_id(&self, key: NativeKey) -> Result<Option<Track>> {
        self.query_track("native_id = ?1", [key])
    }

    /// Find a track by name within an album.
    pub fn get_track_by_name(&self, album_id: AlbumId, name: &str) -> Result<Option<Track>> {
        self.query_track(
            "album_id = ?1 AND name = ?2",
            rusqlite::params![album_id, name],
        )
    }

    pub fn list_tracks(&self) -> Result<Vec<Track>> {
        self.query_tracks("1 = 1 ORDER BY album_id, disc_num, track_num, id", [])
    }

    /// Tracks of an album in disc/track order.
    pub fn list_tracks_for_album(&self, album_id: AlbumId) -> Result<Vec<Track>> {
        self.query_tracks(
            "album_id = ?1 ORDER BY disc_num, track_num, name COLLATE NOCASE",
            [album_id],
        )
    }

    /// Insert a track under `album` unless one with the same identity hash
    /// exists. Artist fields are taken from the album.
    pub fn insert_track(&self, track: &NewTrack, album: &Album) -> Result<Upsert<Track>> {
        let hash = track.identity_hash(&album.name, &album.artist_name);
        if let Some(existing) = self.get_track_by_hash(hash)? {
            if existing.name != track.name
                || existing.album_name != album.name
                || existing.artist_name != album.artist_name
                || existing.location.as_deref().unwrap_or_default()
                    != track.location.as_deref().unwrap_or_default()
            {
                return Err(hash_collision("track", &existing.name, &track.name));
            }
            return Ok(Upsert::Existing(existing));
        }

        // SQLite integers are signed.
        let size = track
            .size
            .map(i64::try_from)
            .transpose()
            .map_err(|_| Error::InvalidData(format!("track {:?}: size out of range", track.name)))?;

        self.conn
            .execute(
                "INSERT INTO tracks (
                    name, sort_name, artist_id, artist_name, album_id, album_name,
                    duration_ms, track_num, disc_num, location, bitrate, size, format,
                    native_id, hash
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                rusqlite::params![
                    track.name,
                    track.sort_name,
                    album.artist_id,
                    album.artist_name,
                    album.id,
                    album.name,
                    track.duration_ms,
                    track.track_num,
                    track.disc_num,
                    track.location,
                    track.bitrate,
                    size,
                    track.format,
                    track.native_id,
                    hash,
                ],
            )
            .map_err(|e| map_unique_violation(e, "track", &track.name))?;

        Ok(Upsert::Created(Track {
            id: TrackId::new(self.conn.last_insert_rowid()),
            name: track.name.clone(),
            sort_name: track.sort_name.clone(),
            artist_id: album.artist_id,
            artist_name: album.artist_name.clone(),
            album_id: album.id,
            album_name: album.name.clone(),
            duration_ms: track.duration_ms,
            track_num: track.track_num,
            disc_num: track.disc_num,
            location: track.location.clone(),
            bitrate: track.bitrate,
            size: track.size,
            format: track.format.clone(),
            native_id: track.native_id,
            hash,
        }))
    }

    /// Delete the track with the given upstream key. Returns the number of
    /// rows removed.
    pub fn delete_track_by_native_id(&self, key: NativeKey) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM tracks WHERE native_id = ?1", [key])?;
        Ok(removed)
    }
}
