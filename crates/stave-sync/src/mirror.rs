//! Mapping from source nodes to catalog rows.
//!
//! Both reconcilers insert through [`Mirror`], which enforces that a child
//! is only ever written against a parent row that already exists.

use stave_core::model::naming::sort_name;
use stave_core::model::{
    Album, Artist, EntityKind, NewAlbum, NewArtist, NewTrack, Track, Upsert,
};
use stave_core::schema::Database;

use crate::error::{SyncError, SyncResult};
use crate::source::SourceNode;

fn expect_kind(node: &SourceNode, kind: EntityKind) -> SyncResult<()> {
    if node.kind == kind {
        Ok(())
    } else {
        Err(SyncError::InvalidResponse {
            source_name: "catalog".to_string(),
            message: format!("expected {kind}, got {}", node.describe()),
        })
    }
}

fn sort_name_of(node: &SourceNode) -> Option<String> {
    node.fields
        .sort_name
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| Some(sort_name(&node.fields.name)))
}

#[must_use]
pub fn new_artist(node: &SourceNode) -> NewArtist {
    NewArtist {
        name: node.fields.name.clone(),
        sort_name: sort_name_of(node),
        album_count: node.fields.child_count.unwrap_or(0),
        native_id: node.native_key,
        native_thumb: node.fields.thumbnail,
    }
}

#[must_use]
pub fn new_album(node: &SourceNode) -> NewAlbum {
    NewAlbum {
        name: node.fields.name.clone(),
        sort_name: sort_name_of(node),
        release_date: node.fields.release_date,
        genres: node.fields.genres.clone(),
        track_count: node.fields.child_count.unwrap_or(0),
        native_id: node.native_key,
        native_thumb: node.fields.thumbnail,
    }
}

#[must_use]
pub fn new_track(node: &SourceNode) -> NewTrack {
    NewTrack {
        name: node.fields.name.clone(),
        sort_name: sort_name_of(node),
        duration_ms: node.fields.duration_ms,
        track_num: node.fields.track_num,
        disc_num: node.fields.disc_num,
        location: node.fields.storage_path.clone(),
        bitrate: node.fields.bitrate,
        size: node.fields.size,
        format: node.fields.format.clone(),
        native_id: node.native_key,
    }
}

/// Insert-if-absent writes of source nodes into the store.
#[derive(Debug, Clone, Copy)]
pub struct Mirror<'a> {
    db: &'a Database,
}

impl<'a> Mirror<'a> {
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn artist(&self, node: &SourceNode) -> SyncResult<Upsert<Artist>> {
        expect_kind(node, EntityKind::Artist)?;
        let upsert = self.db.insert_artist(&new_artist(node))?;
        if upsert.is_created() {
            log::debug!("Added artist {:?}", node.fields.name);
        }
        Ok(upsert)
    }

    pub fn album(&self, node: &SourceNode, artist: &Artist) -> SyncResult<Upsert<Album>> {
        expect_kind(node, EntityKind::Album)?;
        let upsert = self.db.insert_album(&new_album(node), artist)?;
        if upsert.is_created() {
            log::debug!("Added album {:?} by {:?}", node.fields.name, artist.name);
        }
        Ok(upsert)
    }

    pub fn track(&self, node: &SourceNode, album: &Album) -> SyncResult<Upsert<Track>> {
        expect_kind(node, EntityKind::Track)?;
        let upsert = self.db.insert_track(&new_track(node), album)?;
        if upsert.is_created() {
            log::debug!(
                "Added track {:?} on {:?} by {:?}",
                node.fields.name,
                album.name,
                album.artist_name
            );
        }
        Ok(upsert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{NodeFields, NodeHandle};
    use stave_core::model::NativeKey;

    fn node(kind: EntityKind, fields: NodeFields) -> SourceNode {
        SourceNode {
            kind,
            handle: NodeHandle::new("h"),
            native_key: Some(NativeKey::new(5)),
            fields,
        }
    }

    #[test]
    fn test_sort_name_falls_back_to_derived() {
        let artist = new_artist(&node(EntityKind::Artist, NodeFields::named("The Band")));
        assert_eq!(artist.sort_name.as_deref(), Some("Band"));

        let mut fields = NodeFields::named("The Band");
        fields.sort_name = Some("Band, The".to_string());
        let artist = new_artist(&node(EntityKind::Artist, fields));
        assert_eq!(artist.sort_name.as_deref(), Some("Band, The"));
    }

    #[test]
    fn test_track_fields_are_carried() {
        let mut fields = NodeFields::named("T1").with_storage_path("/m/t1.flac");
        fields.duration_ms = Some(1000);
        fields.format = Some("flac".to_string());
        let track = new_track(&node(EntityKind::Track, fields));

        assert_eq!(track.location.as_deref(), Some("/m/t1.flac"));
        assert_eq!(track.duration_ms, Some(1000));
        assert_eq!(track.native_id, Some(NativeKey::new(5)));
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let mirror = Mirror::new(&db);
        let album_node = node(EntityKind::Album, NodeFields::named("X"));
        assert!(mirror.artist(&album_node).is_err());
        assert_eq!(db.counts().unwrap().total(), 0);
    }
}
