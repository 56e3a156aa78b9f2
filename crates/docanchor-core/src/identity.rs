//! Network identities and key purposes.
//!
//! A [`CentId`] is the fixed-width identifier a participant is known by on
//! the network and in the identity registry. Construction never truncates or
//! pads: a slice of the wrong width is an error.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Width of a [`CentId`] in bytes.
pub const CENT_ID_LENGTH: usize = 6;

/// A 6-byte network identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CentId(pub [u8; CENT_ID_LENGTH]);

impl CentId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; CENT_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, failing unless it is exactly 6 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; CENT_ID_LENGTH] = bytes
            .try_into()
            .map_err(|_| CoreError::invalid_length(CENT_ID_LENGTH, bytes.len()))?;
        Ok(Self(arr))
    }

    /// Parse from hex, with or without a `0x` prefix.
    ///
    /// Malformed hex is a decode error; well-formed hex of the wrong width is
    /// a length error.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| CoreError::Decode(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Generate a random identity.
    pub fn random() -> Self {
        let mut bytes = [0u8; CENT_ID_LENGTH];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; CENT_ID_LENGTH] {
        &self.0
    }

    /// Hex encoding without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for CentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CentId({})", self.to_hex())
    }
}

impl fmt::Display for CentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl AsRef<[u8]> for CentId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; CENT_ID_LENGTH]> for CentId {
    fn from(bytes: [u8; CENT_ID_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for CentId {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self> {
        Self::from_slice(slice)
    }
}

impl FromStr for CentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// What a registered key may be used for.
///
/// The discriminants are the purpose numbers recorded in the identity
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum KeyPurpose {
    /// Peer-to-peer transport authentication.
    P2p = 1,
    /// Document signing.
    Signing = 2,
    /// Ethereum personal-message authentication.
    EthMsgAuth = 3,
}

impl KeyPurpose {
    /// All purposes, in registry order.
    pub const ALL: [KeyPurpose; 3] = [KeyPurpose::P2p, KeyPurpose::Signing, KeyPurpose::EthMsgAuth];

    /// Registry purpose number.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a registry purpose number.
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            1 => Some(KeyPurpose::P2p),
            2 => Some(KeyPurpose::Signing),
            3 => Some(KeyPurpose::EthMsgAuth),
            _ => None,
        }
    }

    /// Short operator-facing name.
    pub fn name(self) -> &'static str {
        match self {
            KeyPurpose::P2p => "p2p",
            KeyPurpose::Signing => "sign",
            KeyPurpose::EthMsgAuth => "ethauth",
        }
    }
}

impl fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyPurpose {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "p2p" => Ok(KeyPurpose::P2p),
            "sign" => Ok(KeyPurpose::Signing),
            "ethauth" => Ok(KeyPurpose::EthMsgAuth),
            other => Err(CoreError::Decode(format!("unknown key purpose: {}", other))),
        }
    }
}
