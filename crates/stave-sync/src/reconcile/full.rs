//! Full reconciliation: walk the whole source and insert what is missing.

use serde::Serialize;
use stave_core::model::{Album, Artist};
use stave_core::schema::Database;

use crate::error::SyncResult;
use crate::mirror::Mirror;
use crate::reconcile::{skip_subtree, SyncLock};
use crate::source::{Source, SourceNode};

/// Tuning for a full pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Descend into artists and albums that are already mirrored.
    /// Without it, only newly seen entities are expanded.
    pub deep: bool,
    /// Empty the catalog before walking.
    pub drop_old: bool,
}

/// What a full pass added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub artists: Vec<String>,
    /// `(artist, album)` pairs.
    pub albums: Vec<(String, String)>,
    /// `(artist, album, track)` triples.
    pub tracks: Vec<(String, String, String)>,
    /// Subtrees skipped after a non-fatal error.
    pub skipped: Vec<String>,
}

impl ReconcileReport {
    /// Total number of rows inserted.
    #[must_use]
    pub fn added(&self) -> usize {
        self.artists.len() + self.albums.len() + self.tracks.len()
    }
}

/// Mirrors an entire source into the store.
#[derive(Debug)]
pub struct FullReconciler<'a> {
    db: &'a Database,
    source: &'a dyn Source,
    lock: SyncLock,
}

impl<'a> FullReconciler<'a> {
    #[must_use]
    pub fn new(db: &'a Database, source: &'a dyn Source, lock: SyncLock) -> Self {
        Self { db, source, lock }
    }

    /// Walk every artist, album and track at the source and insert rows
    /// for those not yet mirrored. Existing rows are never modified.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot list its artists or the store fails.
    /// Errors confined to one entity skip that entity's subtree.
    pub async fn reconcile_all(&self, options: ReconcileOptions) -> SyncResult<ReconcileReport> {
        let _guard = self.lock.acquire().await;

        if options.drop_old {
            log::info!("Dropping existing catalog rows");
            self.db.clear_catalog()?;
        }

        let artists = self.source.list_top_level().await?;
        log::info!("{} reports {} artists", self.source.name(), artists.len());

        let mut report = ReconcileReport::default();
        for node in &artists {
            if let Err(e) = self.reconcile_artist(node, options, &mut report).await {
                skip_subtree(e, node)?;
                report.skipped.push(node.describe());
            }
        }

        log::info!(
            "Reconcile complete: {} artists, {} albums, {} tracks added ({} skipped)",
            report.artists.len(),
            report.albums.len(),
            report.tracks.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn reconcile_artist(
        &self,
        node: &SourceNode,
        options: ReconcileOptions,
        report: &mut ReconcileReport,
    ) -> SyncResult<()> {
        let upsert = Mirror::new(self.db).artist(node)?;
        let is_new = upsert.is_created();
        let artist = upsert.into_inner();
        if is_new {
            log::info!("New artist: {}", artist.name);
            report.artists.push(artist.name.clone());
        } else if !options.deep {
            return Ok(());
        }

        for album_node in self.source.list_children(node).await? {
            if let Err(e) = self.reconcile_album(&album_node, &artist, options, report).await {
                skip_subtree(e, &album_node)?;
                report.skipped.push(album_node.describe());
            }
        }
        Ok(())
    }

    async fn reconcile_album(
        &self,
        node: &SourceNode,
        artist: &Artist,
        options: ReconcileOptions,
        report: &mut ReconcileReport,
    ) -> SyncResult<()> {
        let mirror = Mirror::new(self.db);
        let upsert = mirror.album(node, artist)?;
        let is_new = upsert.is_created();
        let album: Album = upsert.into_inner();
        if is_new {
            report.albums.push((artist.name.clone(), album.name.clone()));
        } else if !options.deep {
            return Ok(());
        }

        for track_node in self.source.list_children(node).await? {
            match mirror.track(&track_node, &album) {
                Ok(upsert) if upsert.is_created() => report.tracks.push((
                    artist.name.clone(),
                    album.name.clone(),
                    upsert.into_inner().name,
                )),
                Ok(_) => {}
                Err(e) => {
                    skip_subtree(e, &track_node)?;
                    report.skipped.push(track_node.describe());
                }
            }
        }
        Ok(())
    }
}
