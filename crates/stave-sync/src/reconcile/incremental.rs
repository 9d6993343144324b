//! Incremental reconciliation of single upstream changes.
//!
//! A change names one entity by kind and native key. Refreshing it first
//! makes sure every ancestor has a row (root first), then walks the
//! entity's own subtree inserting whatever is missing. Deleting it removes
//! the row with that native key; descendants go with it through the
//! store's cascading foreign keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use stave_core::model::{Album, Artist, EntityKind, NativeKey, Upsert};
use stave_core::schema::Database;

use crate::error::{SyncError, SyncResult};
use crate::mirror::Mirror;
use crate::reconcile::skip_subtree;
use crate::source::{Source, SourceNode};

/// What happened to an entity upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeState {
    /// Created or updated and fully processed.
    Processed,
    Deleted,
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processed => f.write_str("processed"),
            Self::Deleted => f.write_str("deleted"),
        }
    }
}

/// One unit of incremental work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Change {
    pub kind: EntityKind,
    pub key: NativeKey,
    pub state: ChangeState,
}

impl Change {
    #[must_use]
    pub const fn processed(kind: EntityKind, key: NativeKey) -> Self {
        Self {
            kind,
            key,
            state: ChangeState::Processed,
        }
    }

    #[must_use]
    pub const fn deleted(kind: EntityKind, key: NativeKey) -> Self {
        Self {
            kind,
            key,
            state: ChangeState::Deleted,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.key, self.state)
    }
}

/// Row counts touched by one change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IncrementalOutcome {
    pub inserted: usize,
    pub removed: usize,
    pub skipped: usize,
}

impl IncrementalOutcome {
    fn record<T>(&mut self, upsert: &Upsert<T>) {
        if upsert.is_created() {
            self.inserted += 1;
        }
    }

    /// Accumulate another outcome into this one.
    pub fn merge(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.removed += other.removed;
        self.skipped += other.skipped;
    }
}

/// Rows an entity hangs under, resolved top-down.
#[derive(Debug, Clone, Default)]
struct Lineage {
    artist: Option<Artist>,
    album: Option<Album>,
}

/// Applies single changes against the store.
///
/// Callers serialise drains with [`SyncLock`](crate::reconcile::SyncLock);
/// this type does not take it so that a drain of many changes holds the
/// lock once.
#[derive(Debug)]
pub struct IncrementalReconciler<'a> {
    db: &'a Database,
    source: &'a dyn Source,
}

impl<'a> IncrementalReconciler<'a> {
    #[must_use]
    pub fn new(db: &'a Database, source: &'a dyn Source) -> Self {
        Self { db, source }
    }

    fn orphan(node: &SourceNode) -> SyncError {
        SyncError::InvalidResponse {
            source_name: "catalog".to_string(),
            message: format!("{} reached without its parent row", node.describe()),
        }
    }

    /// Apply one change.
    ///
    /// # Errors
    ///
    /// Fails if the source is unreachable or the store fails. Failures
    /// confined to one entity of a refreshed subtree are logged and counted
    /// in [`IncrementalOutcome::skipped`].
    pub async fn apply(&self, change: &Change) -> SyncResult<IncrementalOutcome> {
        log::debug!("Applying {change}");
        match change.state {
            ChangeState::Deleted => self.remove(change.kind, change.key),
            ChangeState::Processed => self.refresh(change.kind, change.key).await,
        }
    }

    /// Remove the row with this native key. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails if the store fails.
    pub fn remove(&self, kind: EntityKind, key: NativeKey) -> SyncResult<IncrementalOutcome> {
        let removed = match kind {
            EntityKind::Artist => self.db.delete_artist_by_native_id(key)?,
            EntityKind::Album => self.db.delete_album_by_native_id(key)?,
            EntityKind::Track => self.db.delete_track_by_native_id(key)?,
        };
        if removed == 0 {
            log::debug!("{kind} {key} is not mirrored, nothing to remove");
        } else {
            log::info!("Removed {kind} {key}");
        }
        Ok(IncrementalOutcome {
            removed,
            ..IncrementalOutcome::default()
        })
    }

    /// Bring the entity and everything below it into the store. If the
    /// source no longer knows the entity, this behaves like [`remove`].
    ///
    /// [`remove`]: Self::remove
    ///
    /// # Errors
    ///
    /// Fails if the source is unreachable, an ancestor cannot be resolved
    /// or the store fails.
    pub async fn refresh(&self, kind: EntityKind, key: NativeKey) -> SyncResult<IncrementalOutcome> {
        let node = match self.source.get_by_native_key(kind, key).await {
            Ok(node) => node,
            Err(e) if e.is_not_found() => {
                log::info!("{kind} {key} is gone upstream");
                return self.remove(kind, key);
            }
            Err(e) => return Err(e),
        };

        let mut outcome = IncrementalOutcome::default();
        let chain = self.ancestry(&node).await?;
        let lineage = self.ensure_lineage(&chain, &mut outcome)?;
        self.refresh_subtree(node, lineage, &mut outcome).await?;
        // A concurrent delete may have taken an ancestor while we walked.
        self.ensure_lineage(&chain, &mut outcome)?;

        if outcome.inserted > 0 {
            log::info!("{kind} {key}: {} rows added", outcome.inserted);
        }
        Ok(outcome)
    }

    /// Ancestors of `node`, root first.
    async fn ancestry(&self, node: &SourceNode) -> SyncResult<Vec<SourceNode>> {
        let mut chain = Vec::new();
        let mut current = self.source.get_parent(node).await?;
        while let Some(parent) = current {
            if chain.len() >= EntityKind::ALL.len() {
                return Err(SyncError::InvalidResponse {
                    source_name: self.source.name().to_string(),
                    message: format!("ancestor chain of {} does not end", node.describe()),
                });
            }
            current = self.source.get_parent(&parent).await?;
            chain.push(parent);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Ensure a row for each ancestor, matching by native key first.
    fn ensure_lineage(
        &self,
        chain: &[SourceNode],
        outcome: &mut IncrementalOutcome,
    ) -> SyncResult<Lineage> {
        let mirror = Mirror::new(self.db);
        let mut lineage = Lineage::default();

        for ancestor in chain {
            match ancestor.kind {
                EntityKind::Artist => {
                    let known = match ancestor.native_key {
                        Some(key) => self.db.get_artist_by_native_id(key)?,
                        None => None,
                    };
                    let artist = match known {
                        Some(artist) => artist,
                        None => {
                            let upsert = mirror.artist(ancestor)?;
                            outcome.record(&upsert);
                            upsert.into_inner()
                        }
                    };
                    lineage.artist = Some(artist);
                }
                EntityKind::Album => {
                    let known = match ancestor.native_key {
                        Some(key) => self.db.get_album_by_native_id(key)?,
                        None => None,
                    };
                    let album = match known {
                        Some(album) => album,
                        None => {
                            let artist = lineage
                                .artist
                                .as_ref()
                                .ok_or_else(|| Self::orphan(ancestor))?;
                            let upsert = mirror.album(ancestor, artist)?;
                            outcome.record(&upsert);
                            upsert.into_inner()
                        }
                    };
                    lineage.album = Some(album);
                }
                EntityKind::Track => {
                    return Err(SyncError::InvalidResponse {
                        source_name: self.source.name().to_string(),
                        message: format!("{} reported as a parent", ancestor.describe()),
                    });
                }
            }
        }
        Ok(lineage)
    }

    /// Insert the node's row under `lineage`, returning the lineage its
    /// children hang under.
    fn store_node(
        &self,
        node: &SourceNode,
        lineage: &Lineage,
        outcome: &mut IncrementalOutcome,
    ) -> SyncResult<Lineage> {
        let mirror = Mirror::new(self.db);
        match node.kind {
            EntityKind::Artist => {
                let upsert = mirror.artist(node)?;
                outcome.record(&upsert);
                Ok(Lineage {
                    artist: Some(upsert.into_inner()),
                    album: None,
                })
            }
            EntityKind::Album => {
                let artist = lineage.artist.as_ref().ok_or_else(|| Self::orphan(node))?;
                let upsert = mirror.album(node, artist)?;
                outcome.record(&upsert);
                Ok(Lineage {
                    artist: lineage.artist.clone(),
                    album: Some(upsert.into_inner()),
                })
            }
            EntityKind::Track => {
                let album = lineage.album.as_ref().ok_or_else(|| Self::orphan(node))?;
                let upsert = mirror.track(node, album)?;
                outcome.record(&upsert);
                Ok(lineage.clone())
            }
        }
    }

    /// Depth-first walk below `root`, parents always before children.
    async fn refresh_subtree(
        &self,
        root: SourceNode,
        lineage: Lineage,
        outcome: &mut IncrementalOutcome,
    ) -> SyncResult<()> {
        let mut pending = vec![(root, lineage)];

        while let Some((node, lineage)) = pending.pop() {
            let below = match self.store_node(&node, &lineage, outcome) {
                Ok(below) => below,
                Err(e) => {
                    skip_subtree(e, &node)?;
                    outcome.skipped += 1;
                    continue;
                }
            };
            if node.kind.child().is_none() {
                continue;
            }
            match self.source.list_children(&node).await {
                Ok(children) => {
                    // Reverse so children are visited in source order.
                    pending.extend(children.into_iter().rev().map(|c| (c, below.clone())));
                }
                Err(e) => {
                    skip_subtree(e, &node)?;
                    outcome.skipped += 1;
                }
            }
        }
        Ok(())
    }
}
