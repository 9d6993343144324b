use anyhow::Result;
use stave_sync::{Config, FullReconciler, ReconcileOptions, ReconcileReport, SyncLock};

use super::{open_database, open_source};

pub async fn run_update(config: &Config, deep: bool, drop_old: bool, json: bool) -> Result<()> {
    let db = open_database(&config.database_path)?;
    let source = open_source(config).await?;

    log::info!("Reconciling from {}", source.name());
    let report = FullReconciler::new(&db, source.as_ref(), SyncLock::new())
        .reconcile_all(ReconcileOptions { deep, drop_old })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    for artist in &report.artists {
        println!("  + artist  {artist}");
    }
    for (artist, album) in &report.albums {
        println!("  + album   {artist} / {album}");
    }
    for skipped in &report.skipped {
        println!("  ✗ skipped {skipped}");
    }

    println!(
        "\n✓ Update complete: {} artists, {} albums, {} tracks added",
        report.artists.len(),
        report.albums.len(),
        report.tracks.len()
    );
    if !report.skipped.is_empty() {
        println!("  {} entities skipped, see the log for details", report.skipped.len());
    }
}
