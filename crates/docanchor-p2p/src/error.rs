//! Error types for the p2p module.

use docanchor_core::CentId;
use thiserror::Error;

use crate::messages::StageFailure;

/// Errors that can occur while exchanging documents.
#[derive(Debug, Error)]
pub enum P2PError {
    /// Protocol version mismatch with peer.
    #[error("protocol version mismatch: local={local}, peer={peer}")]
    VersionMismatch { local: u64, peer: u64 },

    /// Frame could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// No reply within the deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Peer is not reachable on the network.
    #[error("peer not connected: {0}")]
    PeerNotConnected(CentId),

    /// The peer rejected the document.
    #[error("rejected by peer: {0}")]
    Rejected(StageFailure),

    /// The peer accepted a different document or version than was sent.
    #[error("peer acknowledged {got}, expected {expected}")]
    MismatchedReply { expected: String, got: String },

    /// Core error while building or reading a document.
    #[error("core error: {0}")]
    Core(#[from] docanchor_core::CoreError),
}

/// Result type for p2p operations.
pub type Result<T> = std::result::Result<T, P2PError>;
