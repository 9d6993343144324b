//! Reconciliation against a source that fails below one entity.

use async_trait::async_trait;
use stave_core::model::{EntityKind, NativeKey};
use stave_core::schema::Database;
use stave_sync::source::NodeFields;
use stave_sync::{
    Change, FullReconciler, IncrementalReconciler, ReconcileOptions, Source, SourceNode,
    SyncError, SyncLock, SyncResult, TreeSource,
};

#[derive(Debug, Clone, Copy)]
enum Failure {
    Gone,
    Down,
}

/// Wraps a tree and fails `list_children` for one native key.
#[derive(Debug)]
struct FailingSource {
    tree: TreeSource,
    key: NativeKey,
    failure: Failure,
}

impl FailingSource {
    fn error(&self, node: &SourceNode) -> SyncError {
        match self.failure {
            Failure::Gone => SyncError::EntityNotFound {
                kind: node.kind,
                key: self.key.to_string(),
            },
            Failure::Down => SyncError::AdapterUnavailable {
                source_name: "failing".to_string(),
                message: "connection reset".to_string(),
            },
        }
    }
}

#[async_trait]
impl Source for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn list_top_level(&self) -> SyncResult<Vec<SourceNode>> {
        self.tree.list_top_level().await
    }

    async fn list_children(&self, node: &SourceNode) -> SyncResult<Vec<SourceNode>> {
        if node.native_key == Some(self.key) {
            return Err(self.error(node));
        }
        self.tree.list_children(node).await
    }

    async fn get_parent(&self, node: &SourceNode) -> SyncResult<Option<SourceNode>> {
        self.tree.get_parent(node).await
    }

    async fn get_by_native_key(&self, kind: EntityKind, key: NativeKey) -> SyncResult<SourceNode> {
        self.tree.get_by_native_key(kind, key).await
    }
}

/// "A" (1) → "X" (10) → "T1" (100) and "B" (2) → "Y" (20) → "T2" (200).
fn source(key: i64, failure: Failure) -> FailingSource {
    let tree = TreeSource::new("fixture");
    for (artist, album, track, base) in [("A", "X", "T1", 1), ("B", "Y", "T2", 2)] {
        let a = tree.add_artist(NodeFields::named(artist), Some(NativeKey::new(base)));
        let x = tree
            .add_child(&a, NodeFields::named(album), Some(NativeKey::new(base * 10)))
            .unwrap();
        tree.add_child(&x, NodeFields::named(track), Some(NativeKey::new(base * 100)))
            .unwrap();
    }
    FailingSource {
        tree,
        key: NativeKey::new(key),
        failure,
    }
}

fn counts(db: &Database) -> (u64, u64, u64) {
    let c = db.counts().unwrap();
    (c.artists, c.albums, c.tracks)
}

#[tokio::test]
async fn test_full_pass_skips_subtree_that_vanished() {
    let db = Database::open_in_memory().unwrap();
    let source = source(1, Failure::Gone);

    let report = FullReconciler::new(&db, &source, SyncLock::new())
        .reconcile_all(ReconcileOptions::default())
        .await
        .unwrap();

    assert_eq!(report.skipped, vec![r#"artist "A" (1)"#.to_string()]);
    assert_eq!(report.artists, vec!["A", "B"]);
    assert_eq!(report.albums, vec![("B".to_string(), "Y".to_string())]);
    assert_eq!(counts(&db), (2, 1, 1));
}

#[tokio::test]
async fn test_full_pass_aborts_when_source_goes_down() {
    let db = Database::open_in_memory().unwrap();
    let source = source(1, Failure::Down);

    let err = FullReconciler::new(&db, &source, SyncLock::new())
        .reconcile_all(ReconcileOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::AdapterUnavailable { .. }));
    // Rows written before the failure stay; artist "B" was never reached.
    assert_eq!(counts(&db), (1, 0, 0));
}

#[tokio::test]
async fn test_full_pass_album_failure_keeps_sibling_artists() {
    let db = Database::open_in_memory().unwrap();
    let source = source(20, Failure::Gone);

    let report = FullReconciler::new(&db, &source, SyncLock::new())
        .reconcile_all(ReconcileOptions::default())
        .await
        .unwrap();

    assert_eq!(report.skipped, vec![r#"album "Y" (20)"#.to_string()]);
    assert_eq!(counts(&db), (2, 2, 1));
    assert!(db
        .get_track_by_native_id(NativeKey::new(200))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_incremental_apply_skips_subtree_that_vanished() {
    let db = Database::open_in_memory().unwrap();
    let source = source(10, Failure::Gone);

    let outcome = IncrementalReconciler::new(&db, &source)
        .apply(&Change::processed(EntityKind::Album, NativeKey::new(10)))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(counts(&db), (1, 1, 0));
}

#[tokio::test]
async fn test_incremental_apply_fails_when_source_goes_down() {
    let db = Database::open_in_memory().unwrap();
    let source = source(10, Failure::Down);

    let err = IncrementalReconciler::new(&db, &source)
        .apply(&Change::processed(EntityKind::Album, NativeKey::new(10)))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, SyncError::AdapterUnavailable { .. }));
    // Ancestors and the album itself were stored before the walk failed.
    assert_eq!(counts(&db), (1, 1, 0));
}
