pub mod apply;
pub mod config;
pub mod listen;
pub mod status;
pub mod update;

pub use apply::run_apply;
pub use listen::run_listen;
pub use status::show_status;
pub use update::run_update;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use stave_core::schema::Database;
use stave_sync::{scan_library, Backend, Config, PlexSource, Source};

/// Open the catalog, creating its directory if needed.
pub fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Database::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Build the configured source adapter.
pub async fn open_source(config: &Config) -> Result<Arc<dyn Source>> {
    let source: Arc<dyn Source> = match config.backend {
        Backend::Plex => Arc::new(PlexSource::connect(config.plex_settings()?).await?),
        Backend::Local => {
            let dir = config.music_library()?;
            let tree = tokio::task::spawn_blocking(move || scan_library(&dir)).await??;
            Arc::new(tree)
        }
    };
    Ok(source)
}
