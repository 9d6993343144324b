use anyhow::Result;
use stave_core::model::{EntityKind, NativeKey};
use stave_sync::{Change, Config, IncrementalReconciler};

use super::{open_database, open_source};

pub async fn run_apply(config: &Config, kind: EntityKind, key: i64, deleted: bool) -> Result<()> {
    let db = open_database(&config.database_path)?;
    let key = NativeKey::new(key);
    let change = if deleted {
        Change::deleted(kind, key)
    } else {
        Change::processed(kind, key)
    };

    let source = open_source(config).await?;
    let outcome = IncrementalReconciler::new(&db, source.as_ref())
        .apply(&change)
        .await?;

    println!(
        "✓ Applied {change}: {} inserted, {} removed",
        outcome.inserted, outcome.removed
    );
    if outcome.skipped > 0 {
        println!("  {} entities skipped, see the log for details", outcome.skipped);
    }
    Ok(())
}
