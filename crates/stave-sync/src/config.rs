use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::source::PlexSettings;

/// Which source adapter to mirror from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Plex,
    Local,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plex => f.write_str("plex"),
            Self::Local => f.write_str("local"),
        }
    }
}

/// Configuration for stave.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (STAVE_* prefix)
/// 3. Config file (~/.config/stave/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite catalog.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: STAVE_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/stave/stave.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// Source adapter: `plex` or `local`.
    #[serde(default)]
    pub backend: Backend,

    /// Base URL of the Plex server.
    #[serde(default = "default_plex_server_address")]
    pub plex_server_address: String,

    /// Plex authentication token (required for the plex backend).
    ///
    /// Can be set via:
    /// - ENV: STAVE_PLEX_SERVER_TOKEN
    /// - Config: plex_server_token = "..."
    pub plex_server_token: Option<String>,

    /// Title of the Plex music library section.
    #[serde(default = "default_plex_library_section")]
    pub plex_library_section: String,

    /// Root directory scanned by the local backend.
    pub music_library: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            backend: Backend::default(),
            plex_server_address: default_plex_server_address(),
            plex_server_token: None,
            plex_library_section: default_plex_library_section(),
            music_library: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/stave/config.toml
    /// Reads environment variables with STAVE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("stave");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    /// Connection settings for the plex backend.
    ///
    /// # Errors
    ///
    /// Returns an error if no server token is configured.
    pub fn plex_settings(&self) -> Result<PlexSettings> {
        let token = self
            .plex_server_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .context("plex_server_token is not set (config file or STAVE_PLEX_SERVER_TOKEN)")?;
        Ok(PlexSettings {
            server_address: self.plex_server_address.clone(),
            token,
            library_section: self.plex_library_section.clone(),
        })
    }

    /// Directory scanned by the local backend.
    ///
    /// # Errors
    ///
    /// Returns an error if no library directory is configured.
    pub fn music_library(&self) -> Result<PathBuf> {
        self.music_library
            .clone()
            .context("music_library is not set (config file or STAVE_MUSIC_LIBRARY)")
    }
}

/// Get the default database path.
///
/// Returns: ~/.local/share/stave/stave.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stave")
        .join("stave.db")
}

fn default_plex_server_address() -> String {
    "http://localhost:32400".to_string()
}

fn default_plex_library_section() -> String {
    "Music".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/stave/config.toml
/// - macOS: ~/Library/Application Support/stave/config.toml
/// - Windows: %APPDATA%\stave\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stave")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# stave configuration file
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (STAVE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Source to mirror: "plex" or "local"
backend = "plex"

# Plex server and library section
#
# Can also be set via:
# - Environment: STAVE_PLEX_SERVER_ADDRESS, STAVE_PLEX_SERVER_TOKEN,
#   STAVE_PLEX_LIBRARY_SECTION
plex_server_address = "http://localhost:32400"
plex_server_token = "your-plex-token-here"
plex_library_section = "Music"

# Music directory for the local backend
#music_library = "/path/to/music"

# Path to the SQLite catalog
#
# Can also be set via:
# - CLI: stave --db /custom/path.db update
# - Environment: STAVE_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/stave.db"

# Log filter used when RUST_LOG is unset
log_level = "info"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
