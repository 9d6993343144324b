use anyhow::Result;
use stave_sync::Config;

use super::open_database;

pub fn show_status(config: &Config) -> Result<()> {
    let db = open_database(&config.database_path)?;
    let counts = db.counts()?;

    println!("\nstave status\n");
    println!("  Database: {}", config.database_path.display());
    println!("  Backend:  {}", config.backend);
    println!("  Artists:  {}", counts.artists);
    println!("  Albums:   {}", counts.albums);
    println!("  Tracks:   {}", counts.tracks);

    if counts.total() == 0 {
        println!("\n  Run `stave update` to mirror the catalog");
    }

    Ok(())
}
