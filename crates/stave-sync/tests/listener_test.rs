//! The change listener on its own thread, fed through the event channel.

use std::sync::Arc;

use stave_core::model::{EntityKind, NativeKey};
use stave_core::schema::Database;
use stave_sync::notify::channel;
use stave_sync::source::NodeFields;
use stave_sync::{
    ChangeListener, FullReconciler, ListenerConfig, ListenerEvent, ReconcileOptions, Source,
    SyncLock, TreeSource,
};
use tempfile::TempDir;

fn timeline(entries: &str) -> ListenerEvent {
    ListenerEvent::Message(format!(
        r#"{{"NotificationContainer":{{"type":"timeline","size":1,"TimelineEntry":[{entries}]}}}}"#
    ))
}

fn entry(key: i64, kind: u32, state: i64, queue_size: i64) -> String {
    format!(
        r#"{{"itemID":"{key}","sectionID":"4","state":{state},"type":{kind},"queueSize":{queue_size}}}"#
    )
}

fn library() -> Arc<TreeSource> {
    let tree = TreeSource::new("fixture");
    let a = tree.add_artist(NodeFields::named("A"), Some(NativeKey::new(1)));
    let x = tree
        .add_child(&a, NodeFields::named("X"), Some(NativeKey::new(10)))
        .unwrap();
    tree.add_child(&x, NodeFields::named("T1"), Some(NativeKey::new(100)))
        .unwrap();
    Arc::new(tree)
}

#[test]
fn test_spawned_listener_applies_batches() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let tree = library();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let lock = SyncLock::new();
    {
        let db = Database::open(&db_path).unwrap();
        runtime
            .block_on(
                FullReconciler::new(&db, tree.as_ref(), lock.clone())
                    .reconcile_all(ReconcileOptions::default()),
            )
            .unwrap();
    }

    let x = runtime
        .block_on(tree.get_by_native_key(EntityKind::Album, NativeKey::new(10)))
        .unwrap();
    tree.add_child(&x.handle, NodeFields::named("T2"), Some(NativeKey::new(101)))
        .unwrap();

    let (tx, rx) = channel();
    let source: Arc<dyn Source> = tree.clone();
    let handle = ChangeListener::spawn(
        Database::open(&db_path).unwrap(),
        source,
        lock,
        ListenerConfig {
            section_id: Some("4".to_string()),
        },
        rx,
    )
    .unwrap();

    // Intermediate states, then the batch: the same track twice, ending
    // with queueSize 1.
    tx.blocking_send(timeline(&entry(101, 10, 1, 3))).unwrap();
    tx.blocking_send(timeline(&entry(101, 10, 5, 2))).unwrap();
    tx.blocking_send(ListenerEvent::Message("{not json".to_string()))
        .unwrap();
    tx.blocking_send(timeline(&entry(101, 10, 5, 1))).unwrap();
    drop(tx);

    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.messages, 4);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.drains, 1);
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.outcome.inserted, 1);

    let db = Database::open(&db_path).unwrap();
    assert_eq!(db.counts().unwrap().total(), 4);
}

#[test]
fn test_deletions_in_one_message() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let tree = library();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    {
        let db = Database::open(&db_path).unwrap();
        runtime
            .block_on(
                FullReconciler::new(&db, tree.as_ref(), SyncLock::new())
                    .reconcile_all(ReconcileOptions::default()),
            )
            .unwrap();
    }

    let (tx, rx) = channel();
    let handle = ChangeListener::spawn(
        Database::open(&db_path).unwrap(),
        tree,
        SyncLock::new(),
        ListenerConfig::default(),
        rx,
    )
    .unwrap();

    let both = format!("{},{}", entry(100, 10, 9, 2), entry(10, 9, 9, 1));
    tx.blocking_send(timeline(&both)).unwrap();
    tx.blocking_send(ListenerEvent::Closed("server restart".to_string()))
        .unwrap();
    drop(tx);

    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.drains, 1);
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.closed, 1);
    assert_eq!(stats.outcome.removed, 2);

    let counts = Database::open(&db_path).unwrap().counts().unwrap();
    assert_eq!((counts.artists, counts.albums, counts.tracks), (1, 0, 0));
}

#[test]
fn test_bad_entry_keeps_the_rest_of_the_message() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let tree = library();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    {
        let db = Database::open(&db_path).unwrap();
        runtime
            .block_on(
                FullReconciler::new(&db, tree.as_ref(), SyncLock::new())
                    .reconcile_all(ReconcileOptions::default()),
            )
            .unwrap();
    }
    let x = runtime
        .block_on(tree.get_by_native_key(EntityKind::Album, NativeKey::new(10)))
        .unwrap();
    tree.add_child(&x.handle, NodeFields::named("T2"), Some(NativeKey::new(101)))
        .unwrap();

    let (tx, rx) = channel();
    let handle = ChangeListener::spawn(
        Database::open(&db_path).unwrap(),
        tree,
        SyncLock::new(),
        ListenerConfig::default(),
        rx,
    )
    .unwrap();

    // The unreadable entry is the one that closes the batch.
    let mixed = format!(
        r#"{},{{"itemID":"bogus","sectionID":"4","state":5,"type":10,"queueSize":1}}"#,
        entry(101, 10, 5, 2)
    );
    tx.blocking_send(timeline(&mixed)).unwrap();
    tx.blocking_send(timeline(&entry(101, 10, 5, 1))).unwrap();
    drop(tx);

    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.messages, 2);
    assert_eq!(stats.malformed, 0);
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.outcome.inserted, 1);

    let db = Database::open(&db_path).unwrap();
    assert!(db
        .get_track_by_native_id(NativeKey::new(101))
        .unwrap()
        .is_some());
}
