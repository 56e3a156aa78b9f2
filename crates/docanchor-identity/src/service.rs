//! Identity provisioning for the local node.
//!
//! Ties the configured key files to the registry: create the node's identity,
//! generate key pairs on disk and publish public keys.

use std::sync::Arc;

use docanchor_core::{keyfile, CentId, KeyPurpose, Keypair, PublicKey};

use crate::config::IdentityConfig;
use crate::error::Result;
use crate::registry::{IdentityConfirmation, IdentityRegistry};

/// The local node's view of its own identity.
pub struct IdentityService<R> {
    config: IdentityConfig,
    registry: Arc<R>,
}

impl<R: IdentityRegistry> IdentityService<R> {
    pub fn new(config: IdentityConfig, registry: Arc<R>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Create an identity in the registry and wait for its confirmation.
    ///
    /// Uses `id`, else the configured identity, else a random one. On
    /// success the identity becomes the configured one.
    pub async fn create_identity(&mut self, id: Option<CentId>) -> Result<IdentityConfirmation> {
        let id = id.or(self.config.cent_id).unwrap_or_else(CentId::random);

        let (receipt, pending) = self.registry.create_identity(id).await?;
        tracing::info!(cent_id = %receipt.cent_id, "identity submitted, waiting for confirmation");

        let confirmation = pending.wait(self.config.confirmation_timeout).await?;
        self.config.cent_id = Some(confirmation.cent_id);
        tracing::info!(cent_id = %confirmation.cent_id, "identity confirmed");
        Ok(confirmation)
    }

    /// Generate a fresh key pair for `purpose` at its configured paths.
    pub fn generate_keys(&self, purpose: KeyPurpose) -> Result<Keypair> {
        let paths = self.config.key_paths(purpose)?;
        Ok(keyfile::generate_key_pair(
            paths.curve,
            &paths.public_key,
            &paths.private_key,
        )?)
    }

    /// Read the key pair for `purpose` from disk.
    pub fn keypair(&self, purpose: KeyPurpose) -> Result<Keypair> {
        let paths = self.config.key_paths(purpose)?;
        Ok(keyfile::read_private_key(&paths.private_key, paths.curve)?)
    }

    /// Publish the configured public key for `purpose` to the registry.
    ///
    /// A key that is already active is left alone.
    pub async fn add_key_from_config(&self, purpose: KeyPurpose) -> Result<PublicKey> {
        let id = self.config.cent_id()?;
        let paths = self.config.key_paths(purpose)?;
        let key = keyfile::read_public_key(&paths.public_key, paths.curve)?;

        if self.registry.is_key_valid(&id, purpose, &key).await? {
            tracing::debug!(cent_id = %id, %purpose, "key already registered");
            return Ok(key);
        }

        self.registry.add_key(&id, purpose, key.clone()).await?;
        tracing::info!(cent_id = %id, %purpose, key = %key.to_hex(), "key registered");
        Ok(key)
    }
}
