//! Shared plumbing for CLI commands.

use tabwarden_core::storage::data_dir;
use tabwarden_core::{SqliteStore, StoreAdapter};

/// Open the store every command reads and writes through.
pub fn open_store() -> Result<StoreAdapter, Box<dyn std::error::Error>> {
    let path = data_dir()?.join("tabwarden.db");
    Ok(StoreAdapter::new(Box::new(SqliteStore::open(path)?)))
}

/// Single-threaded runtime for the command's store round-trips.
pub fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn std::error::Error>> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
