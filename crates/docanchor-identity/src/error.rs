//! Error types for the identity module.

use docanchor_core::{CentId, KeyPurpose};
use thiserror::Error;

/// Errors that can occur during identity registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An identity with this id is already registered.
    #[error("identity {0} already exists")]
    IdentityExists(CentId),

    /// No identity with this id is registered.
    #[error("identity {0} not found")]
    IdentityNotFound(CentId),

    /// The identity is registered but not yet confirmed.
    #[error("identity {0} is not confirmed yet")]
    IdentityPending(CentId),

    /// The identity has no active key for the purpose.
    #[error("identity {id} has no active {purpose} key")]
    KeyNotFound { id: CentId, purpose: KeyPurpose },

    /// Confirmation did not arrive in time.
    #[error("confirmation for identity {0} timed out")]
    ConfirmationTimeout(CentId),

    /// The registry is unreachable or stopped watching.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// Identity configuration is incomplete.
    #[error("identity configuration: {0}")]
    Config(String),

    /// Core error (key files, key parsing).
    #[error("core error: {0}")]
    Core(#[from] docanchor_core::CoreError),
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
