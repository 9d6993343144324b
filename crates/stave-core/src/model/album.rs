use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::identity;
use crate::model::ids::{AlbumId, ArtistId, IdentityHash, NativeKey};

/// A mirrored album row. Owned by exactly one artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    pub sort_name: Option<String>,
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub release_date: Option<NaiveDate>,
    pub genres: Vec<String>,
    pub track_count: u32,
    pub native_id: Option<NativeKey>,
    pub native_thumb: Option<i64>,
    pub hash: IdentityHash,
}

/// An album that has not been stored yet.
///
/// The owning artist is supplied at insert time so the row can only be
/// created against an artist that already exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlbum {
    pub name: String,
    pub sort_name: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub genres: Vec<String>,
    pub track_count: u32,
    pub native_id: Option<NativeKey>,
    pub native_thumb: Option<i64>,
}

impl NewAlbum {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort_name: None,
            release_date: None,
            genres: Vec::new(),
            track_count: 0,
            native_id: None,
            native_thumb: None,
        }
    }

    #[must_use]
    pub fn with_native_id(mut self, key: NativeKey) -> Self {
        self.native_id = Some(key);
        self
    }

    #[must_use]
    pub fn identity_hash(&self, artist_name: &str) -> IdentityHash {
        identity::album_hash(&self.name, artist_name)
    }
}

/// Join genres into the stored comma-separated form, dropping blanks and
/// duplicates while keeping first-seen order.
#[must_use]
pub fn join_genres(genres: &[String]) -> Option<String> {
    let mut seen: Vec<&str> = Vec::new();
    for genre in genres {
        let genre = genre.trim();
        if !genre.is_empty() && !seen.contains(&genre) {
            seen.push(genre);
        }
    }
    if seen.is_empty() {
        None
    } else {
        Some(seen.join(","))
    }
}

#[must_use]
pub fn split_genres(stored: Option<&str>) -> Vec<String> {
    stored
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
