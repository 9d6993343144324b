//! The long-lived change listener.

use std::sync::Arc;
use std::thread;

use serde::Serialize;
use stave_core::schema::Database;
use tokio::sync::mpsc;

use crate::error::{SyncError, SyncResult};
use crate::notify::notification::{parse_notification, Notification, TimelineEntry};
use crate::reconcile::{Change, ChangeState, IncrementalOutcome, IncrementalReconciler, SyncLock};
use crate::source::Source;

/// Default capacity of the event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// What a source pushes to the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// A raw notification message.
    Message(String),
    /// The source's connection ended, with a reason.
    Closed(String),
}

/// Create the bounded channel sources feed the listener through.
#[must_use]
pub fn channel() -> (mpsc::Sender<ListenerEvent>, mpsc::Receiver<ListenerEvent>) {
    mpsc::channel(DEFAULT_CHANNEL_CAPACITY)
}

/// Listener settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Only act on processed entries from this library section. Deletions
    /// are applied regardless since native keys are server-wide.
    pub section_id: Option<String>,
}

/// Counters over the listener's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListenerStats {
    pub messages: usize,
    pub malformed: usize,
    pub drains: usize,
    pub applied: usize,
    pub failed: usize,
    pub closed: usize,
    pub outcome: IncrementalOutcome,
}

/// Queues changes from notifications and drains them in batches.
#[derive(Debug)]
pub struct ChangeListener<'a> {
    db: &'a Database,
    source: &'a dyn Source,
    lock: SyncLock,
    config: ListenerConfig,
    pending: Vec<Change>,
    stats: ListenerStats,
}

impl<'a> ChangeListener<'a> {
    #[must_use]
    pub fn new(
        db: &'a Database,
        source: &'a dyn Source,
        lock: SyncLock,
        config: ListenerConfig,
    ) -> Self {
        Self {
            db,
            source,
            lock,
            config,
            pending: Vec::new(),
            stats: ListenerStats::default(),
        }
    }

    /// Changes waiting for the end of the current upstream batch.
    #[must_use]
    pub fn pending(&self) -> &[Change] {
        &self.pending
    }

    #[must_use]
    pub const fn stats(&self) -> ListenerStats {
        self.stats
    }

    /// Queue a change. A later state for an already queued entity
    /// replaces the earlier one in place.
    pub fn enqueue(&mut self, change: Change) {
        match self
            .pending
            .iter_mut()
            .find(|c| c.kind == change.kind && c.key == change.key)
        {
            Some(queued) => queued.state = change.state,
            None => self.pending.push(change),
        }
    }

    fn wanted(&self, entry: &TimelineEntry, change: &Change) -> bool {
        let (Some(wanted), Some(section)) = (&self.config.section_id, &entry.section_id) else {
            return true;
        };
        change.state == ChangeState::Deleted || wanted == section
    }

    /// Handle one raw message, draining the queue when an upstream batch
    /// completes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MalformedNotification`] for messages that do
    /// not parse. Nothing is queued from such a message.
    pub async fn handle_message(&mut self, text: &str) -> SyncResult<()> {
        self.stats.messages += 1;
        let entries = match parse_notification(text)? {
            Notification::Timeline(entries) => entries,
            Notification::Other(kind) => {
                log::trace!("Ignoring {kind} notification");
                return Ok(());
            }
        };

        for entry in entries {
            if let Some(change) = entry.change() {
                if self.wanted(&entry, &change) {
                    log::debug!("Queued {change}");
                    self.enqueue(change);
                } else {
                    log::trace!("Ignoring {change} from section {:?}", entry.section_id);
                }
            }
            if entry.ends_batch() && !self.pending.is_empty() {
                self.drain().await;
            }
        }
        Ok(())
    }

    /// Apply and clear every pending change. Failures are logged per change
    /// and never stop the drain.
    pub async fn drain(&mut self) {
        let batch = std::mem::take(&mut self.pending);
        if batch.is_empty() {
            return;
        }
        let _guard = self.lock.acquire().await;
        log::info!("Applying {} queued changes", batch.len());

        let reconciler = IncrementalReconciler::new(self.db, self.source);
        for change in &batch {
            match reconciler.apply(change).await {
                Ok(outcome) => {
                    self.stats.applied += 1;
                    self.stats.outcome.merge(outcome);
                }
                Err(e) => {
                    self.stats.failed += 1;
                    log::error!("Failed to apply {change}: {e}");
                }
            }
        }
        self.stats.drains += 1;
    }

    /// Consume events until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<ListenerEvent>) -> ListenerStats {
        log::info!("Listening for changes from {}", self.source.name());
        while let Some(event) = events.recv().await {
            match event {
                ListenerEvent::Message(text) => {
                    if let Err(e) = self.handle_message(&text).await {
                        self.stats.malformed += 1;
                        log::warn!("Dropping notification: {e}");
                    }
                }
                ListenerEvent::Closed(reason) => {
                    self.stats.closed += 1;
                    log::warn!("{} notifications closed: {reason}", self.source.name());
                }
            }
        }
        // Whatever is left never saw its batch end; apply it anyway.
        self.drain().await;
        log::info!("Listener stopped");
        self.stats
    }

    /// Run a listener on a dedicated thread with its own runtime and store
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be started. The join handle
    /// yields an error if the thread's runtime cannot be built.
    pub fn spawn(
        db: Database,
        source: Arc<dyn Source>,
        lock: SyncLock,
        config: ListenerConfig,
        events: mpsc::Receiver<ListenerEvent>,
    ) -> SyncResult<thread::JoinHandle<SyncResult<ListenerStats>>> {
        let handle = thread::Builder::new()
            .name("stave-listener".to_string())
            .spawn(move || -> SyncResult<ListenerStats> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(SyncError::Io)?;
                let listener = ChangeListener::new(&db, source.as_ref(), lock, config);
                Ok(runtime.block_on(listener.run(events)))
            })?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{NodeFields, TreeSource};
    use stave_core::model::{EntityKind, NativeKey};

    fn message(entries: &str) -> String {
        format!(r#"{{"NotificationContainer":{{"type":"timeline","TimelineEntry":[{entries}]}}}}"#)
    }

    fn tree() -> TreeSource {
        let tree = TreeSource::new("test");
        let a = tree.add_artist(NodeFields::named("A"), Some(NativeKey::new(1)));
        let x = tree
            .add_child(&a, NodeFields::named("X"), Some(NativeKey::new(10)))
            .unwrap();
        tree.add_child(&x, NodeFields::named("T1"), Some(NativeKey::new(100)))
            .unwrap();
        tree
    }

    #[test]
    fn test_enqueue_dedups_by_entity() {
        let db = Database::open_in_memory().unwrap();
        let source = tree();
        let mut listener =
            ChangeListener::new(&db, &source, SyncLock::new(), ListenerConfig::default());

        listener.enqueue(Change::processed(EntityKind::Track, NativeKey::new(100)));
        listener.enqueue(Change::processed(EntityKind::Album, NativeKey::new(100)));
        listener.enqueue(Change::deleted(EntityKind::Track, NativeKey::new(100)));

        assert_eq!(listener.pending().len(), 2);
        assert_eq!(listener.pending()[0].state, ChangeState::Deleted);
        assert_eq!(listener.pending()[1].kind, EntityKind::Album);
    }

    #[tokio::test]
    async fn test_waits_for_batch_end() {
        let db = Database::open_in_memory().unwrap();
        let source = tree();
        let mut listener =
            ChangeListener::new(&db, &source, SyncLock::new(), ListenerConfig::default());

        listener
            .handle_message(&message(r#"{"itemID":"1","state":5,"type":8,"queueSize":2}"#))
            .await
            .unwrap();
        assert_eq!(listener.pending().len(), 1);
        assert_eq!(db.counts().unwrap().total(), 0);

        listener
            .handle_message(&message(r#"{"itemID":"100","state":5,"type":10,"queueSize":1}"#))
            .await
            .unwrap();
        assert!(listener.pending().is_empty());
        assert_eq!(listener.stats().drains, 1);
        assert_eq!(listener.stats().applied, 2);
        assert_eq!(db.counts().unwrap().total(), 3);
    }

    #[tokio::test]
    async fn test_section_filter() {
        let db = Database::open_in_memory().unwrap();
        let source = tree();
        let config = ListenerConfig {
            section_id: Some("4".to_string()),
        };
        let mut listener = ChangeListener::new(&db, &source, SyncLock::new(), config);

        listener
            .handle_message(&message(
                r#"{"itemID":"1","sectionID":"7","state":5,"type":8,"queueSize":2}"#,
            ))
            .await
            .unwrap();
        assert!(listener.pending().is_empty());

        listener
            .handle_message(&message(
                r#"{"itemID":"1","sectionID":"7","state":9,"type":8,"queueSize":2}"#,
            ))
            .await
            .unwrap();
        assert_eq!(listener.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_run_survives_bad_messages() {
        let db = Database::open_in_memory().unwrap();
        let source = tree();
        let listener =
            ChangeListener::new(&db, &source, SyncLock::new(), ListenerConfig::default());

        let (tx, rx) = channel();
        tx.send(ListenerEvent::Message("garbage".to_string())).await.unwrap();
        tx.send(ListenerEvent::Closed("reset".to_string())).await.unwrap();
        tx.send(ListenerEvent::Message(message(
            r#"{"itemID":"100","state":5,"type":10}"#,
        )))
        .await
        .unwrap();
        drop(tx);

        let stats = listener.run(rx).await;
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.outcome.inserted, 3);
        assert_eq!(db.counts().unwrap().tracks, 1);
    }
}
