//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has not been opened, or has been closed.
    #[error("store is not open")]
    NotOpen,

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document encoding or decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Key not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Different content already stored under the same version key.
    #[error("conflict at {key}: different content already stored")]
    Conflict { key: String },

    /// The document's previous version is not the stored head.
    #[error("version conflict on document {document}: head is {head}, previous is {previous}")]
    VersionConflict {
        document: String,
        head: String,
        previous: String,
    },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Blocking task failed.
    #[error("storage task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
