mod cache;
mod config;
mod migration;

pub use cache::{CacheBucket, LocalCache};
pub use config::{
    BlobsConfig, Config, DisplayConfig, LoggingConfig, RetentionConfig, StoreBackend, StoreConfig,
};
pub use migration::{migrate_timing_data, MigrationOutcome, MIGRATION_FLAG};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `PRODUCEROOM_HOME` wins when set. Otherwise `~/.config/produceroom`, or
/// `~/.config/produceroom-dev` with `PRODUCEROOM_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("PRODUCEROOM_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("PRODUCEROOM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("produceroom-dev")
            } else {
                base_dir.join("produceroom")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
