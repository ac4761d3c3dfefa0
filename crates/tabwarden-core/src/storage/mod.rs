mod config;
pub mod adapter;
pub mod store;

pub use adapter::{RetryPolicy, StoreAdapter};
pub use config::Config;
pub use store::{KeyValueStore, MemoryStore, SqliteStore};

use std::path::PathBuf;

/// Returns `~/.config/tabwarden[-dev]/` based on TABWARDEN_ENV.
///
/// Set TABWARDEN_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TABWARDEN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tabwarden-dev")
    } else {
        base_dir.join("tabwarden")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
