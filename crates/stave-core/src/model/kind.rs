use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The level of an entity in the catalog tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Artist,
    Album,
    Track,
}

impl EntityKind {
    /// All kinds, root first.
    pub const ALL: [Self; 3] = [Self::Artist, Self::Album, Self::Track];

    /// Numeric metadata type used by Plex (`type` in API and notifications).
    #[must_use]
    pub const fn type_code(self) -> u32 {
        match self {
            Self::Artist => 8,
            Self::Album => 9,
            Self::Track => 10,
        }
    }

    #[must_use]
    pub const fn from_type_code(code: u32) -> Option<Self> {
        match code {
            8 => Some(Self::Artist),
            9 => Some(Self::Album),
            10 => Some(Self::Track),
            _ => None,
        }
    }

    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Artist => "artists",
            Self::Album => "albums",
            Self::Track => "tracks",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Track => "track",
        }
    }

    /// The kind one level up the tree, if any.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Artist => None,
            Self::Album => Some(Self::Artist),
            Self::Track => Some(Self::Album),
        }
    }

    /// The kind one level down the tree, if any.
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Artist => Some(Self::Album),
            Self::Album => Some(Self::Track),
            Self::Track => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "artist" => Ok(Self::Artist),
            "album" => Ok(Self::Album),
            "track" => Ok(Self::Track),
            other => Err(Error::InvalidData(format!("unknown entity kind: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_type_code(kind.type_code()), Some(kind));
        }
        assert_eq!(EntityKind::from_type_code(1), None);
    }

    #[test]
    fn test_tree_navigation() {
        assert_eq!(EntityKind::Track.parent(), Some(EntityKind::Album));
        assert_eq!(EntityKind::Artist.parent(), None);
        assert_eq!(EntityKind::Album.child(), Some(EntityKind::Track));
        assert_eq!(EntityKind::Track.child(), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Album".parse::<EntityKind>().unwrap(), EntityKind::Album);
        assert!("playlist".parse::<EntityKind>().is_err());
    }
}
