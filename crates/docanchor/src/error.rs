//! Error types for the node.

use docanchor_core::{CoreError, DocumentId};
use docanchor_identity::RegistryError;
use docanchor_p2p::P2PError;
use docanchor_store::StoreError;
use thiserror::Error;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Core error (envelope, identity, signing).
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// A client field could not be decoded.
    #[error("failed to decode {field}: {source}")]
    FieldDecode {
        field: &'static str,
        #[source]
        source: CoreError,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Exchange error.
    #[error("p2p error: {0}")]
    P2P(#[from] P2PError),

    /// Client JSON could not be parsed or produced.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document not found.
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
