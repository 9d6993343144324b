//! Error taxonomy for synchronisation.

use stave_core::model::EntityKind;
use thiserror::Error;

/// Errors raised while mirroring a source into the catalog store.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source no longer knows the entity (it was removed upstream).
    #[error("{kind} {key} not found at source")]
    EntityNotFound { kind: EntityKind, key: String },

    /// The source cannot be reached at all.
    #[error("{source_name} unavailable: {message}")]
    AdapterUnavailable {
        source_name: String,
        message: String,
    },

    /// The source answered with something we could not interpret.
    #[error("unexpected response from {source_name}: {message}")]
    InvalidResponse {
        source_name: String,
        message: String,
    },

    /// A change notification did not have the expected shape.
    #[error("malformed notification: {0}")]
    MalformedNotification(String),

    /// The source does not provide this capability.
    #[error("{source_name} does not support {operation}")]
    Unsupported {
        source_name: String,
        operation: &'static str,
    },

    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store error: {0}")]
    Store(#[from] stave_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns `true` when the entity is gone upstream.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }

    /// Returns `true` when a whole pass must stop: the source is
    /// unreachable or the store itself is failing. Duplicate-entity
    /// signals and per-entity source failures only skip a subtree.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AdapterUnavailable { .. } | Self::Io(_) => true,
            Self::Store(e) => !e.is_duplicate(),
            _ => false,
        }
    }

    /// Returns `true` when retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

/// Convenience alias for synchronisation results.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let not_found = SyncError::EntityNotFound {
            kind: EntityKind::Track,
            key: "101".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_fatal());

        let down = SyncError::AdapterUnavailable {
            source_name: "plex".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(down.is_fatal());

        let duplicate = SyncError::Store(stave_core::Error::DuplicateEntity {
            entity: "album",
            detail: "X".to_string(),
        });
        assert!(!duplicate.is_fatal());

        let invalid = SyncError::Store(stave_core::Error::InvalidData("bad".to_string()));
        assert!(invalid.is_fatal());
    }

    #[test]
    fn test_display() {
        let err = SyncError::EntityNotFound {
            kind: EntityKind::Album,
            key: "10".to_string(),
        };
        assert_eq!(err.to_string(), "album 10 not found at source");
    }
}
