//! The identity registry contract.
//!
//! The registry is external and slow. Creating an identity returns right
//! away with a receipt and a [`PendingConfirmation`]; the confirmation
//! resolves later, when the registry has accepted the identity. Callers pick
//! how long they are willing to wait for it.

use std::time::Duration;

use async_trait::async_trait;
use docanchor_core::{CentId, KeyPurpose, PublicKey};
use tokio::sync::oneshot;

use crate::error::{RegistryError, Result};

/// Proof that a create request was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub cent_id: CentId,

    /// Submission time (Unix ms).
    pub submitted_at: i64,
}

/// The registry accepted an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityConfirmation {
    pub cent_id: CentId,

    /// Confirmation time (Unix ms).
    pub confirmed_at: i64,
}

/// A confirmation that has not resolved yet.
///
/// Dropping it abandons the wait. The registry notices and stops watching
/// for this identity.
#[derive(Debug)]
pub struct PendingConfirmation {
    cent_id: CentId,
    rx: oneshot::Receiver<IdentityConfirmation>,
}

impl PendingConfirmation {
    /// Create a pending confirmation and the sender that resolves it.
    pub fn channel(cent_id: CentId) -> (oneshot::Sender<IdentityConfirmation>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { cent_id, rx })
    }

    pub fn cent_id(&self) -> CentId {
        self.cent_id
    }

    /// Wait up to `timeout` for the confirmation.
    pub async fn wait(self, timeout: Duration) -> Result<IdentityConfirmation> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(confirmation)) => Ok(confirmation),
            Ok(Err(_)) => Err(RegistryError::Unavailable(format!(
                "registry stopped watching identity {}",
                self.cent_id
            ))),
            Err(_) => Err(RegistryError::ConfirmationTimeout(self.cent_id)),
        }
    }
}

/// Async interface to the identity registry.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Identities
    // ─────────────────────────────────────────────────────────────────────────

    /// Submit a new identity. Fails with `IdentityExists` if already taken.
    async fn create_identity(
        &self,
        id: CentId,
    ) -> Result<(RegistrationReceipt, PendingConfirmation)>;

    /// Whether `id` is registered and confirmed.
    async fn identity_exists(&self, id: &CentId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Keys
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a key for `purpose`. Earlier keys stay registered.
    async fn add_key(&self, id: &CentId, purpose: KeyPurpose, key: PublicKey) -> Result<()>;

    /// Revoke a key for `purpose`.
    async fn revoke_key(&self, id: &CentId, purpose: KeyPurpose, key: &PublicKey) -> Result<()>;

    /// The key currently active for `purpose`.
    async fn current_key(&self, id: &CentId, purpose: KeyPurpose) -> Result<PublicKey>;

    /// Whether `key` is active (registered, not revoked) for `purpose`.
    async fn is_key_valid(&self, id: &CentId, purpose: KeyPurpose, key: &PublicKey)
        -> Result<bool>;
}
