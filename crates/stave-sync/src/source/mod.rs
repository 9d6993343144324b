//! The source adapter seam.
//!
//! A source exposes one tree-shaped catalog (artists → albums → tracks).
//! The reconcilers only ever walk it through the [`Source`] trait, so a
//! remote media server and a local tag scan are interchangeable.

pub mod local;
pub mod plex;
pub mod tree;

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stave_core::model::{EntityKind, NativeKey};
use tokio::sync::mpsc;

use crate::error::{SyncError, SyncResult};
use crate::notify::ListenerEvent;

pub use local::scan_library;
pub use plex::{PlexSettings, PlexSource};
pub use tree::TreeSource;

/// Adapter-internal locator for a node (a rating key, a tree slot, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(String);

impl NodeHandle {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata a source reports for an entity. Which fields are meaningful
/// depends on the entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFields {
    pub name: String,
    pub sort_name: Option<String>,
    pub thumbnail: Option<i64>,
    /// Number of albums (artist) or tracks (album).
    pub child_count: Option<u32>,

    // Album
    pub release_date: Option<NaiveDate>,
    pub genres: Vec<String>,

    // Track
    pub duration_ms: Option<i64>,
    pub track_num: Option<u32>,
    pub disc_num: Option<u32>,
    pub bitrate: Option<u32>,
    pub size: Option<u64>,
    pub format: Option<String>,
    pub storage_path: Option<String>,
}

impl NodeFields {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<String>) -> Self {
        self.storage_path = Some(path.into());
        self
    }
}

/// One entity as seen by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    pub kind: EntityKind,
    pub handle: NodeHandle,
    /// Stable upstream id, when the source has one.
    pub native_key: Option<NativeKey>,
    pub fields: NodeFields,
}

impl SourceNode {
    /// Short description for log lines.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.native_key {
            Some(key) => format!("{} {:?} ({key})", self.kind, self.fields.name),
            None => format!("{} {:?}", self.kind, self.fields.name),
        }
    }
}

/// Capability set the reconcilers need from an external catalog.
#[async_trait]
pub trait Source: Send + Sync + fmt::Debug {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// All artists.
    async fn list_top_level(&self) -> SyncResult<Vec<SourceNode>>;

    /// Albums of an artist or tracks of an album. Tracks have no children.
    async fn list_children(&self, node: &SourceNode) -> SyncResult<Vec<SourceNode>>;

    /// The owning album or artist; `None` for artists.
    async fn get_parent(&self, node: &SourceNode) -> SyncResult<Option<SourceNode>>;

    /// Resolve an upstream key. Fails with [`SyncError::EntityNotFound`]
    /// once the entity no longer exists.
    async fn get_by_native_key(&self, kind: EntityKind, key: NativeKey) -> SyncResult<SourceNode>;

    /// Push change notifications into `events` until the connection ends.
    /// Sources without a live feed return [`SyncError::Unsupported`].
    async fn subscribe(&self, events: mpsc::Sender<ListenerEvent>) -> SyncResult<()> {
        drop(events);
        Err(SyncError::Unsupported {
            source_name: self.name().to_string(),
            operation: "change notifications",
        })
    }
}
