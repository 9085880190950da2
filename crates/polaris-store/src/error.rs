//! Error types for polaris-store.

use std::path::PathBuf;

/// Result type for polaris-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in polaris-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored row could not be turned back into a record.
    #[error("Invalid record {id}: {reason}")]
    InvalidRecord { id: i64, reason: String },
}
