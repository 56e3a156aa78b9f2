//! Identity configuration: which identity this node is and where its keys
//! live on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use docanchor_core::{CentId, Curve, KeyPurpose};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// Location and curve of one PEM key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairPaths {
    pub public_key: PathBuf,
    pub private_key: PathBuf,
    pub curve: Curve,
}

/// Configuration for the node's own identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// The node's identity. Unset until one has been created.
    pub cent_id: Option<CentId>,

    /// Key pair per purpose.
    pub keys: BTreeMap<KeyPurpose, KeyPairPaths>,

    /// How long to wait for registry confirmations.
    #[serde(with = "duration_ms")]
    pub confirmation_timeout: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cent_id: None,
            keys: BTreeMap::new(),
            confirmation_timeout: Duration::from_secs(60),
        }
    }
}

impl IdentityConfig {
    /// Conventional layout: `<dir>/<purpose>.pub.pem` and `<dir>/<purpose>.key.pem`,
    /// Ed25519 for p2p and secp256k1 for the rest.
    pub fn with_key_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let keys = KeyPurpose::ALL
            .iter()
            .map(|&purpose| {
                let curve = match purpose {
                    KeyPurpose::P2p => Curve::Ed25519,
                    KeyPurpose::Signing | KeyPurpose::EthMsgAuth => Curve::Secp256k1,
                };
                let paths = KeyPairPaths {
                    public_key: dir.join(format!("{}.pub.pem", purpose.name())),
                    private_key: dir.join(format!("{}.key.pem", purpose.name())),
                    curve,
                };
                (purpose, paths)
            })
            .collect();

        Self {
            keys,
            ..Default::default()
        }
    }

    /// The configured identity.
    pub fn cent_id(&self) -> Result<CentId> {
        self.cent_id
            .ok_or_else(|| RegistryError::Config("no identity configured".into()))
    }

    /// The key paths for `purpose`.
    pub fn key_paths(&self, purpose: KeyPurpose) -> Result<&KeyPairPaths> {
        self.keys
            .get(&purpose)
            .ok_or_else(|| RegistryError::Config(format!("no {} key configured", purpose)))
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
