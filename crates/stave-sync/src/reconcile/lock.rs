use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serialises reconciliation passes.
///
/// Full passes and listener drains take this lock so the two never
/// interleave writes against the same store. Clones share the lock.
#[derive(Debug, Clone, Default)]
pub struct SyncLock(Arc<Mutex<()>>);

impl SyncLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access. Released when the guard is dropped.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.0).lock_owned().await
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.0).try_lock_owned().ok()
    }
}
