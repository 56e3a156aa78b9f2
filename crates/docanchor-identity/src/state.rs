//! Key ring state of a single identity.
//!
//! Keys are tracked per purpose as an append-only history. Adding a key
//! never removes an earlier one; revocation is explicit and recorded. The
//! active key for a purpose is the most recently added key that has not
//! been revoked.

use std::collections::HashMap;

use docanchor_core::{KeyPurpose, PublicKey};

/// State of a single registered key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub key: PublicKey,

    /// When the key was added (Unix ms).
    pub added_at: i64,

    /// When it was revoked (if revoked).
    pub revoked_at: Option<i64>,
}

impl KeyRecord {
    /// Check if this key is currently usable.
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// All keys of one identity, grouped by purpose.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    keys: HashMap<KeyPurpose, Vec<KeyRecord>>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key for `purpose`.
    ///
    /// Returns `false` if the key is already active for that purpose.
    pub fn add(&mut self, purpose: KeyPurpose, key: PublicKey, now: i64) -> bool {
        let records = self.keys.entry(purpose).or_default();
        if records.iter().any(|r| r.is_active() && r.key == key) {
            return false;
        }
        records.push(KeyRecord {
            key,
            added_at: now,
            revoked_at: None,
        });
        true
    }

    /// Revoke every active record of `key` for `purpose`.
    ///
    /// Returns `false` if the key was not active.
    pub fn revoke(&mut self, purpose: KeyPurpose, key: &PublicKey, now: i64) -> bool {
        let Some(records) = self.keys.get_mut(&purpose) else {
            return false;
        };

        let mut revoked = false;
        for record in records.iter_mut().filter(|r| r.is_active() && &r.key == key) {
            record.revoked_at = Some(now);
            revoked = true;
        }
        revoked
    }

    /// The active key for `purpose`.
    pub fn active(&self, purpose: KeyPurpose) -> Option<&PublicKey> {
        self.keys
            .get(&purpose)?
            .iter()
            .rev()
            .find(|r| r.is_active())
            .map(|r| &r.key)
    }

    /// Whether `key` is an active key for `purpose`.
    pub fn is_active(&self, purpose: KeyPurpose, key: &PublicKey) -> bool {
        self.keys
            .get(&purpose)
            .map(|records| records.iter().any(|r| r.is_active() && &r.key == key))
            .unwrap_or(false)
    }

    /// Full history for `purpose`, oldest first.
    pub fn history(&self, purpose: KeyPurpose) -> &[KeyRecord] {
        self.keys.get(&purpose).map(Vec::as_slice).unwrap_or(&[])
    }
}
