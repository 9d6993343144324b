use serde::{Deserialize, Serialize};

use crate::identity;
use crate::model::ids::{ArtistId, IdentityHash, NativeKey};

/// A mirrored artist row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
    pub sort_name: Option<String>,
    pub album_count: u32,

    /// Upstream rating key, absent for sources without stable ids.
    pub native_id: Option<NativeKey>,
    pub native_thumb: Option<i64>,

    pub hash: IdentityHash,
}

/// An artist that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArtist {
    pub name: String,
    pub sort_name: Option<String>,
    pub album_count: u32,
    pub native_id: Option<NativeKey>,
    pub native_thumb: Option<i64>,
}

impl NewArtist {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort_name: None,
            album_count: 0,
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
    pub fn with_album_count(mut self, count: u32) -> Self {
        self.album_count = count;
        self
    }

    #[must_use]
    pub fn identity_hash(&self) -> IdentityHash {
        identity::artist_hash(&self.name)
    }
}
