//! In-memory identity registry.
//!
//! Simulates an external registry: identities confirm after a configurable
//! delay and lookups can be slowed down, globally or per identity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use docanchor_core::{CentId, KeyPurpose, PublicKey};

use crate::error::{RegistryError, Result};
use crate::registry::{
    IdentityConfirmation, IdentityRegistry, PendingConfirmation, RegistrationReceipt,
};
use crate::state::KeyRing;

/// Timing of the simulated registry.
#[derive(Debug, Clone)]
pub struct MemoryRegistryConfig {
    /// Time between submitting an identity and its confirmation.
    pub confirmation_delay: Duration,

    /// Added to every lookup.
    pub lookup_latency: Duration,
}

impl Default for MemoryRegistryConfig {
    fn default() -> Self {
        Self {
            confirmation_delay: Duration::from_millis(10),
            lookup_latency: Duration::ZERO,
        }
    }
}

struct IdentityRecord {
    keys: KeyRing,
    confirmed_after: Instant,
}

/// In-memory registry implementation.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    config: MemoryRegistryConfig,
    identities: Arc<RwLock<HashMap<CentId, IdentityRecord>>>,
    slow: Arc<RwLock<HashMap<CentId, Duration>>>,
}

impl MemoryRegistry {
    pub fn new(config: MemoryRegistryConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Register a confirmed identity with the given keys, skipping the
    /// confirmation delay.
    pub fn insert_confirmed(
        &self,
        id: CentId,
        keys: impl IntoIterator<Item = (KeyPurpose, PublicKey)>,
    ) {
        let now = now_millis();
        let mut ring = KeyRing::new();
        for (purpose, key) in keys {
            ring.add(purpose, key, now);
        }
        self.identities.write().insert(
            id,
            IdentityRecord {
                keys: ring,
                confirmed_after: Instant::now(),
            },
        );
    }

    /// Make lookups for `id` take at least `latency`.
    pub fn set_lookup_latency(&self, id: CentId, latency: Duration) {
        self.slow.write().insert(id, latency);
    }

    async fn lookup_delay(&self, id: &CentId) {
        let delay = self
            .slow
            .read()
            .get(id)
            .copied()
            .unwrap_or(self.config.lookup_latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Run `f` against the key ring of a confirmed identity.
    fn with_confirmed<T>(
        &self,
        id: &CentId,
        f: impl FnOnce(&mut KeyRing) -> Result<T>,
    ) -> Result<T> {
        let mut identities = self.identities.write();
        let record = identities
            .get_mut(id)
            .ok_or(RegistryError::IdentityNotFound(*id))?;
        if Instant::now() < record.confirmed_after {
            return Err(RegistryError::IdentityPending(*id));
        }
        f(&mut record.keys)
    }
}

#[async_trait]
impl IdentityRegistry for MemoryRegistry {
    async fn create_identity(
        &self,
        id: CentId,
    ) -> Result<(RegistrationReceipt, PendingConfirmation)> {
        let delay = self.config.confirmation_delay;
        {
            let mut identities = self.identities.write();
            if identities.contains_key(&id) {
                return Err(RegistryError::IdentityExists(id));
            }
            identities.insert(
                id,
                IdentityRecord {
                    keys: KeyRing::new(),
                    confirmed_after: Instant::now() + delay,
                },
            );
        }

        let receipt = RegistrationReceipt {
            cent_id: id,
            submitted_at: now_millis(),
        };
        let (mut tx, pending) = PendingConfirmation::channel(id);

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let confirmation = IdentityConfirmation {
                        cent_id: id,
                        confirmed_at: now_millis(),
                    };
                    if tx.send(confirmation).is_err() {
                        tracing::trace!(cent_id = %id, "confirmation receiver gone");
                    }
                }
                _ = tx.closed() => {
                    tracing::debug!(cent_id = %id, "confirmation wait abandoned");
                }
            }
        });

        tracing::debug!(cent_id = %id, "identity submitted");
        Ok((receipt, pending))
    }

    async fn identity_exists(&self, id: &CentId) -> Result<bool> {
        self.lookup_delay(id).await;
        Ok(self
            .identities
            .read()
            .get(id)
            .map(|r| Instant::now() >= r.confirmed_after)
            .unwrap_or(false))
    }

    async fn add_key(&self, id: &CentId, purpose: KeyPurpose, key: PublicKey) -> Result<()> {
        self.lookup_delay(id).await;
        let added = self.with_confirmed(id, |ring| Ok(ring.add(purpose, key, now_millis())))?;
        if added {
            tracing::debug!(cent_id = %id, %purpose, "key added");
        }
        Ok(())
    }

    async fn revoke_key(&self, id: &CentId, purpose: KeyPurpose, key: &PublicKey) -> Result<()> {
        self.lookup_delay(id).await;
        self.with_confirmed(id, |ring| {
            if ring.revoke(purpose, key, now_millis()) {
                tracing::debug!(cent_id = %id, %purpose, "key revoked");
                Ok(())
            } else {
                Err(RegistryError::KeyNotFound { id: *id, purpose })
            }
        })
    }

    async fn current_key(&self, id: &CentId, purpose: KeyPurpose) -> Result<PublicKey> {
        self.lookup_delay(id).await;
        self.with_confirmed(id, |ring| {
            ring.active(purpose)
                .cloned()
                .ok_or(RegistryError::KeyNotFound { id: *id, purpose })
        })
    }

    async fn is_key_valid(
        &self,
        id: &CentId,
        purpose: KeyPurpose,
        key: &PublicKey,
    ) -> Result<bool> {
        self.lookup_delay(id).await;
        self.with_confirmed(id, |ring| Ok(ring.is_active(purpose, key)))
    }
}

/// Current time in Unix milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
