use anyhow::Result;
use clap::Parser;
use stave_core::model::EntityKind;
use stave_sync::Config;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "stave", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/stave/stave.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Mirror the whole source catalog into the database
    ///
    /// Walks every artist reported by the configured backend and inserts
    /// rows for artists, albums and tracks that are not mirrored yet.
    /// Existing rows are never modified.
    ///
    /// By default only newly seen artists and albums are expanded, which
    /// keeps repeated runs cheap. Use --deep to descend into everything,
    /// or --drop-old to rebuild the catalog from scratch.
    ///
    /// Entities that fail individually are skipped and listed in the
    /// summary; an unreachable source aborts the run.
    Update {
        /// Descend into artists and albums that are already mirrored
        #[arg(long)]
        deep: bool,

        /// Empty the catalog before walking the source
        #[arg(long)]
        drop_old: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile a single entity by its native key
    Apply {
        /// Entity kind: artist, album or track
        #[arg(long, value_parser = parse_kind)]
        kind: EntityKind,

        /// Native key of the entity at the source
        #[arg(long)]
        key: i64,

        /// Treat the entity as deleted upstream
        #[arg(long)]
        deleted: bool,
    },
    /// Follow the source's change notifications
    ///
    /// Runs until interrupted. Batches of changes are applied as the
    /// source finishes processing them; dropped connections are retried.
    Listen {
        /// Run a full update before listening
        #[arg(long)]
        reconcile_first: bool,
    },
    /// Show catalog row counts
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Create the config file with defaults
    Init,
    /// Print an example config file
    Example,
}

fn parse_kind(value: &str) -> Result<EntityKind, String> {
    value.parse().map_err(|e: stave_core::Error| e.to_string())
}

fn load_config(db: Option<PathBuf>) -> Result<Config> {
    match db {
        Some(path) => Config::load_with_db_path(path),
        None => Config::load(),
    }
}

fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // These work even when the config file is broken.
    if let Commands::Config { action } = &cli.command {
        match action {
            ConfigAction::Path => return commands::config::show_path(),
            ConfigAction::Init => return commands::config::init_config(),
            ConfigAction::Example => return commands::config::show_example(),
            ConfigAction::Show => {}
        }
    }

    let config = load_config(cli.db)?;
    init_logging(&config.log_level);

    match cli.command {
        Commands::Update {
            deep,
            drop_old,
            json,
        } => {
            commands::run_update(&config, deep, drop_old, json).await?;
        }
        Commands::Apply { kind, key, deleted } => {
            commands::run_apply(&config, kind, key, deleted).await?;
        }
        Commands::Listen { reconcile_first } => {
            commands::run_listen(&config, reconcile_first).await?;
        }
        Commands::Status => {
            commands::show_status(&config)?;
        }
        Commands::Config { .. } => {
            commands::config::show_config(&config)?;
        }
    }

    Ok(())
}
