//! Core error types for tabwarden-core.
//!
//! This module defines the error hierarchy using thiserror so callers can
//! match on failure classes instead of parsing strings.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tabwarden-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Classification oracle errors
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Persistent store errors.
///
/// A terminal store failure leaves in-memory state authoritative for the
/// rest of the session; it never crashes the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing store
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A single backend operation failed
    #[error("Store operation failed: {0}")]
    Backend(String),

    /// All retry attempts for one operation were exhausted
    #[error("Store operation failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Classification oracle errors.
///
/// These never propagate past the dispatcher -- each is converted into a
/// terminal non-productive classification for the attempt.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("Oracle request failed: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("Oracle returned HTTP {status}")]
    Status { status: u16 },

    /// Response body was not the expected JSON shape
    #[error("Oracle response malformed: {0}")]
    Malformed(String),

    /// Local deadline fired before a reply arrived
    #[error("Analysis timed out")]
    TimedOut,
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        OracleError::Transport(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
