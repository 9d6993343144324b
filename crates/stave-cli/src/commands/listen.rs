use anyhow::{anyhow, bail, Result};
use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use stave_sync::notify::channel;
use stave_sync::{
    Backend, ChangeListener, Config, FullReconciler, ListenerConfig, ListenerEvent, ListenerStats,
    PlexSource, ReconcileOptions, Source, SyncError, SyncLock, SyncResult,
};
use tokio::sync::mpsc;

use super::open_database;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

pub async fn run_listen(config: &Config, reconcile_first: bool) -> Result<()> {
    if config.backend != Backend::Plex {
        bail!("The {} backend has no change notifications", config.backend);
    }

    let source = Arc::new(PlexSource::connect(config.plex_settings()?).await?);
    let lock = SyncLock::new();

    if reconcile_first {
        let db = open_database(&config.database_path)?;
        let report = FullReconciler::new(&db, source.as_ref(), lock.clone())
            .reconcile_all(ReconcileOptions::default())
            .await?;
        println!("✓ Initial update: {} rows added", report.added());
    }

    let (tx, rx) = channel();
    let listener = ChangeListener::spawn(
        open_database(&config.database_path)?,
        Arc::clone(&source) as Arc<dyn Source>,
        lock,
        ListenerConfig {
            section_id: Some(source.section_id().to_string()),
        },
        rx,
    )?;

    println!("Listening for changes (Ctrl-C to stop)");
    let stop = follow(source.as_ref(), &tx, &listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    // Closing the channel lets the listener drain and stop.
    drop(tx);
    let stats = tokio::task::spawn_blocking(move || listener.join())
        .await?
        .map_err(|_| anyhow!("Listener thread panicked"))??;
    if stop == Stop::ListenerGone {
        bail!(
            "Listener stopped unexpectedly after {} batches; not reconnecting",
            stats.drains
        );
    }

    println!(
        "\n✓ Listener stopped: {} batches, {} changes applied ({} failed), {} rows added, {} removed",
        stats.drains, stats.applied, stats.failed, stats.outcome.inserted, stats.outcome.removed
    );
    Ok(())
}

/// Why the reconnect loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Interrupted,
    ListenerGone,
}

/// Keep `source` subscribed, reconnecting with a growing delay, until
/// `shutdown` resolves or the listener thread is no longer running.
async fn follow(
    source: &dyn Source,
    tx: &mpsc::Sender<ListenerEvent>,
    listener: &JoinHandle<SyncResult<ListenerStats>>,
    shutdown: impl Future<Output = ()>,
) -> Result<Stop> {
    tokio::pin!(shutdown);
    let mut delay = INITIAL_RECONNECT_DELAY;
    loop {
        tokio::select! {
            result = source.subscribe(tx.clone()) => {
                match result {
                    Ok(()) => {
                        delay = INITIAL_RECONNECT_DELAY;
                        log::warn!("Notification stream closed");
                    }
                    Err(e @ SyncError::Unsupported { .. }) => return Err(e.into()),
                    Err(e) => log::error!("Notification stream failed: {e}"),
                }
            }
            () = &mut shutdown => {
                log::info!("Interrupted");
                return Ok(Stop::Interrupted);
            }
        }

        if listener.is_finished() {
            log::error!("Listener thread has stopped");
            return Ok(Stop::ListenerGone);
        }

        log::info!("Reconnecting in {}s", delay.as_secs());
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = &mut shutdown => {
                log::info!("Interrupted during reconnect wait");
                return Ok(Stop::Interrupted);
            }
        }
        delay = (delay * 2).min(MAX_RECONNECT_DELAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use stave_core::model::{EntityKind, NativeKey};
    use stave_sync::SourceNode;

    /// A feed that either closes at once or never ends.
    #[derive(Debug)]
    struct Feed {
        hang: bool,
    }

    #[async_trait]
    impl Source for Feed {
        fn name(&self) -> &str {
            "feed"
        }

        async fn list_top_level(&self) -> SyncResult<Vec<SourceNode>> {
            Ok(Vec::new())
        }

        async fn list_children(&self, _node: &SourceNode) -> SyncResult<Vec<SourceNode>> {
            Ok(Vec::new())
        }

        async fn get_parent(&self, _node: &SourceNode) -> SyncResult<Option<SourceNode>> {
            Ok(None)
        }

        async fn get_by_native_key(
            &self,
            kind: EntityKind,
            key: NativeKey,
        ) -> SyncResult<SourceNode> {
            Err(SyncError::EntityNotFound {
                kind,
                key: key.to_string(),
            })
        }

        async fn subscribe(&self, _events: mpsc::Sender<ListenerEvent>) -> SyncResult<()> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dead_listener_stops_reconnecting() {
        let (tx, _rx) = channel();
        let listener = std::thread::spawn(|| Ok(ListenerStats::default()));
        while !listener.is_finished() {
            tokio::task::yield_now().await;
        }

        let stop = tokio::time::timeout(
            Duration::from_secs(5),
            follow(&Feed { hang: false }, &tx, &listener, std::future::pending()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(stop, Stop::ListenerGone);
    }

    #[tokio::test]
    async fn test_shutdown_ends_the_loop() {
        let (tx, _rx) = channel();
        let (release, parked) = std::sync::mpsc::channel::<()>();
        let listener = std::thread::spawn(move || {
            drop(parked.recv());
            Ok(ListenerStats::default())
        });

        let stop = follow(&Feed { hang: true }, &tx, &listener, async {})
            .await
            .unwrap();
        assert_eq!(stop, Stop::Interrupted);

        release.send(()).unwrap();
        listener.join().unwrap().unwrap();
    }
}
