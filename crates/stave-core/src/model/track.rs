use serde::{Deserialize, Serialize};

use crate::identity;
use crate::model::ids::{AlbumId, ArtistId, IdentityHash, NativeKey, TrackId};

/// A mirrored track row. Owned by exactly one album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub sort_name: Option<String>,
    pub artist_id: ArtistId,
    pub artist_name: String,
    pub album_id: AlbumId,
    pub album_name: String,
    pub duration_ms: Option<i64>,
    pub track_num: Option<u32>,
    pub disc_num: Option<u32>,

    /// Where the audio lives (absolute file path or upstream part path).
    pub location: Option<String>,
    /// Bitrate in kbps.
    pub bitrate: Option<u32>,
    /// Size in bytes.
    pub size: Option<u64>,
    /// Codec or file extension, lowercase (e.g. "flac").
    pub format: Option<String>,

    pub native_id: Option<NativeKey>,
    pub hash: IdentityHash,
}

/// A track that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewTrack {
    pub name: String,
    pub sort_name: Option<String>,
    pub duration_ms: Option<i64>,
    pub track_num: Option<u32>,
    pub disc_num: Option<u32>,
    pub location: Option<String>,
    pub bitrate: Option<u32>,
    pub size: Option<u64>,
    pub format: Option<String>,
    pub native_id: Option<NativeKey>,
}

impl NewTrack {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_native_id(mut self, key: NativeKey) -> Self {
        self.native_id = Some(key);
        self
    }

    #[must_use]
    pub fn identity_hash(&self, album_name: &str, artist_name: &str) -> IdentityHash {
        identity::track_hash(
            &self.name,
            album_name,
            artist_name,
            self.location.as_deref().unwrap_or_default(),
        )
    }
}
