pub mod album;
pub mod artist;
pub mod ids;
pub mod kind;
pub mod naming;
pub mod track;

pub use album::{Album, NewAlbum};
pub use artist::{Artist, NewArtist};
pub use ids::{AlbumId, ArtistId, IdentityHash, NativeKey, TrackId};
pub use kind::EntityKind;
pub use track::{NewTrack, Track};

/// Result of an insert-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert<T> {
    /// A new row was created.
    Created(T),
    /// A row with the same identity hash was already present; nothing changed.
    Existing(T),
}

impl<T> Upsert<T> {
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    #[must_use]
    pub const fn get(&self) -> &T {
        match self {
            Self::Created(row) | Self::Existing(row) => row,
        }
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Created(row) | Self::Existing(row) => row,
        }
    }
}
