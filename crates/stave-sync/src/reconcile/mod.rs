//! Full and incremental reconciliation of a source into the catalog store.

pub mod full;
pub mod incremental;
pub mod lock;

pub use full::{FullReconciler, ReconcileOptions, ReconcileReport};
pub use incremental::{Change, ChangeState, IncrementalOutcome, IncrementalReconciler};
pub use lock::SyncLock;

use crate::error::{SyncError, SyncResult};
use crate::source::SourceNode;

/// Decide what a failure under `node` means for the walk in progress.
///
/// Fatal errors are handed back so the pass stops; anything else is logged
/// and the subtree rooted at `node` is skipped.
pub(crate) fn skip_subtree(err: SyncError, node: &SourceNode) -> SyncResult<()> {
    if err.is_fatal() {
        return Err(err);
    }
    match err {
        SyncError::Store(ref e) if e.is_duplicate() => {
            log::error!("Invariant violation at {}: {err}", node.describe());
        }
        _ => log::warn!("Skipping {}: {err}", node.describe()),
    }
    Ok(())
}
