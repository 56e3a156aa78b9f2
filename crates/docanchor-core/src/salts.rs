//! Per-field salts for selective disclosure.
//!
//! Every payload field carries a random salt so that its value can later be
//! revealed in a proof without exposing neighbouring fields. A salt is fixed
//! once generated; only a new document version may replace it.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, Result};

/// Width of a salt in bytes.
pub const SALT_LENGTH: usize = 32;

/// A random 32-byte salt.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_LENGTH]);

impl Salt {
    /// Generate a fresh random salt.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from a slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SALT_LENGTH] = bytes
            .try_into()
            .map_err(|_| CoreError::invalid_length(SALT_LENGTH, bytes.len()))?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", &hex::encode(self.0)[..8])
    }
}

/// Salts keyed by payload field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSalts(BTreeMap<String, Salt>);

impl FieldSalts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh salts for every named field.
    pub fn generate(fields: &[&str]) -> Self {
        let mut salts = Self::new();
        salts.fill_missing(fields);
        salts
    }

    /// Generate salts for the named fields that do not have one yet.
    ///
    /// Returns the number of salts added.
    pub fn fill_missing(&mut self, fields: &[&str]) -> usize {
        let mut added = 0;
        for field in fields {
            if !self.0.contains_key(*field) {
                self.0.insert((*field).to_string(), Salt::random());
                added += 1;
            }
        }
        added
    }

    /// Replace the salt of a field with a fresh one.
    pub fn regenerate(&mut self, field: &str) {
        self.0.insert(field.to_string(), Salt::random());
    }

    pub fn get(&self, field: &str) -> Option<&Salt> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, salt: Salt) {
        self.0.insert(field.into(), salt);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Salt)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
