use anyhow::Result;
use stave_sync::{config, Config};

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    let config_path = config::config_file_path();
    println!("Config file: {}", config_path.display());
    let exists = config_path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!("  backend: {}", config.backend);
    println!("  plex_server_address: {}", config.plex_server_address);
    println!(
        "  plex_server_token: {}",
        if config.plex_server_token.is_some() { "<set>" } else { "<not set>" }
    );
    println!("  plex_library_section: {}", config.plex_library_section);
    println!(
        "  music_library: {}",
        config
            .music_library
            .as_ref()
            .map_or_else(|| "<not set>".to_string(), |p| p.display().to_string())
    );
    println!("  log_level: {}", config.log_level);

    println!("\nPriority: CLI args > ENV vars (STAVE_*) > Config file > Defaults");

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure stave.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
