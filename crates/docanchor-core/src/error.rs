//! Error types for docanchor core.

use std::path::PathBuf;

use thiserror::Error;

/// Core errors raised by identity, crypto and envelope operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("decoding error: {0}")]
    Decode(String),

    #[error("unrecognized embedded type: {0}")]
    UnrecognizedType(String),

    #[error("core document is nil")]
    NilDocument,

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("curve mismatch: expected {expected}, got {actual}")]
    CurveMismatch { expected: String, actual: String },

    #[error("ethereum message hashing is not supported on {0}")]
    UnsupportedHashing(String),

    #[error("field {0} changed without creating a new version")]
    UnversionedMutation(String),

    #[error("key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    /// Shorthand for a fixed-width mismatch.
    pub fn invalid_length(expected: usize, actual: usize) -> Self {
        CoreError::InvalidLength { expected, actual }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
