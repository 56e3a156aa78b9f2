//! Cryptographic primitives for docanchor.
//!
//! Wraps secp256k1 ECDSA (plain SHA-256 or Ethereum personal-message
//! hashing), Ed25519 signing, Keccak address derivation and Blake3 hashing
//! with strong types.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

use crate::error::{CoreError, Result};

/// Prefix of an Ethereum personal message, followed by the decimal length.
const ETHEREUM_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Length of an uncompressed SEC1 secp256k1 public key.
pub const SECP256K1_PUBLIC_KEY_LENGTH: usize = 65;

/// Length of an Ed25519 public key.
pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;

/// Length of a private key on either curve.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Blake3Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Signature curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    Secp256k1,
    Ed25519,
}

impl Curve {
    /// Wire discriminant.
    pub fn to_u8(self) -> u8 {
        match self {
            Curve::Secp256k1 => 1,
            Curve::Ed25519 => 2,
        }
    }

    /// Parse a wire discriminant.
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            1 => Some(Curve::Secp256k1),
            2 => Some(Curve::Ed25519),
            _ => None,
        }
    }

    /// Expected public key width on this curve.
    pub fn public_key_length(self) -> usize {
        match self {
            Curve::Secp256k1 => SECP256K1_PUBLIC_KEY_LENGTH,
            Curve::Ed25519 => ED25519_PUBLIC_KEY_LENGTH,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Curve::Secp256k1 => f.write_str("secp256k1"),
            Curve::Ed25519 => f.write_str("ed25519"),
        }
    }
}

/// A public key tagged with its curve.
///
/// secp256k1 keys are held as 65-byte uncompressed SEC1 points, Ed25519 keys
/// as 32 raw bytes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    pub curve: Curve,
    pub bytes: Vec<u8>,
}

impl PublicKey {
    /// Wrap raw key bytes, normalising secp256k1 keys to uncompressed form.
    pub fn from_bytes(curve: Curve, bytes: &[u8]) -> Result<Self> {
        match curve {
            Curve::Secp256k1 => {
                let key = VerifyingKey::from_sec1_bytes(bytes)
                    .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
                Ok(Self::from_secp256k1(&key))
            }
            Curve::Ed25519 => {
                let arr: [u8; ED25519_PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
                    CoreError::invalid_length(ED25519_PUBLIC_KEY_LENGTH, bytes.len())
                })?;
                ed25519_dalek::VerifyingKey::from_bytes(&arr)
                    .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
                Ok(Self {
                    curve,
                    bytes: arr.to_vec(),
                })
            }
        }
    }

    pub(crate) fn from_secp256k1(key: &VerifyingKey) -> Self {
        Self {
            curve: Curve::Secp256k1,
            bytes: key.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Verify a signature over a message with this key.
    pub fn verify(&self, message: &[u8], signature: &[u8], ethereum_hashing: bool) -> bool {
        verify_message(&self.bytes, message, signature, self.curve, ethereum_hashing)
    }

    /// Ethereum address of this key. Only defined for secp256k1.
    pub fn address(&self) -> Result<Address> {
        if self.curve != Curve::Secp256k1 {
            return Err(CoreError::CurveMismatch {
                expected: Curve::Secp256k1.to_string(),
                actual: self.curve.to_string(),
            });
        }
        derive_address(&self.bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "PublicKey({}:{})", self.curve, &hex[..hex.len().min(16)])
    }
}

/// A 20-byte Ethereum account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to hex string, without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

#[derive(Clone)]
enum KeyMaterial {
    Secp256k1(SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

/// A private key for either supported curve.
#[derive(Clone)]
pub struct Keypair {
    key: KeyMaterial,
}

impl Keypair {
    /// Generate a new random keypair on the given curve.
    pub fn generate(curve: Curve) -> Self {
        let mut rng = rand::thread_rng();
        let key = match curve {
            Curve::Secp256k1 => KeyMaterial::Secp256k1(SigningKey::random(&mut rng)),
            Curve::Ed25519 => KeyMaterial::Ed25519(ed25519_dalek::SigningKey::generate(&mut rng)),
        };
        Self { key }
    }

    /// Load from 32 raw private key bytes.
    pub fn from_private_bytes(curve: Curve, bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PRIVATE_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| CoreError::invalid_length(PRIVATE_KEY_LENGTH, bytes.len()))?;
        let key = match curve {
            Curve::Secp256k1 => KeyMaterial::Secp256k1(
                SigningKey::from_bytes(&arr.into())
                    .map_err(|e| CoreError::InvalidKey(e.to_string()))?,
            ),
            Curve::Ed25519 => KeyMaterial::Ed25519(ed25519_dalek::SigningKey::from_bytes(&arr)),
        };
        Ok(Self { key })
    }

    pub(crate) fn from_secp256k1(key: SigningKey) -> Self {
        Self {
            key: KeyMaterial::Secp256k1(key),
        }
    }

    pub(crate) fn from_ed25519(key: ed25519_dalek::SigningKey) -> Self {
        Self {
            key: KeyMaterial::Ed25519(key),
        }
    }

    pub(crate) fn secp256k1(&self) -> Option<&SigningKey> {
        match &self.key {
            KeyMaterial::Secp256k1(key) => Some(key),
            KeyMaterial::Ed25519(_) => None,
        }
    }

    pub(crate) fn ed25519(&self) -> Option<&ed25519_dalek::SigningKey> {
        match &self.key {
            KeyMaterial::Ed25519(key) => Some(key),
            KeyMaterial::Secp256k1(_) => None,
        }
    }

    /// The curve this key lives on.
    pub fn curve(&self) -> Curve {
        match &self.key {
            KeyMaterial::Secp256k1(_) => Curve::Secp256k1,
            KeyMaterial::Ed25519(_) => Curve::Ed25519,
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        match &self.key {
            KeyMaterial::Secp256k1(key) => PublicKey::from_secp256k1(key.verifying_key()),
            KeyMaterial::Ed25519(key) => PublicKey {
                curve: Curve::Ed25519,
                bytes: key.verifying_key().to_bytes().to_vec(),
            },
        }
    }

    /// Raw private key bytes (secret key material).
    pub fn private_bytes(&self) -> [u8; PRIVATE_KEY_LENGTH] {
        match &self.key {
            KeyMaterial::Secp256k1(key) => {
                let mut out = [0u8; PRIVATE_KEY_LENGTH];
                out.copy_from_slice(&key.to_bytes());
                out
            }
            KeyMaterial::Ed25519(key) => key.to_bytes(),
        }
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8], ethereum_hashing: bool) -> Result<Vec<u8>> {
        match &self.key {
            KeyMaterial::Secp256k1(key) if ethereum_hashing => {
                let digest = ethereum_message_hash(message);
                let (signature, recovery_id) = key
                    .sign_prehash_recoverable(&digest)
                    .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
                let mut out = signature.to_bytes().to_vec();
                out.push(recovery_id.to_byte() + 27);
                Ok(out)
            }
            KeyMaterial::Secp256k1(key) => {
                let signature: EcdsaSignature = key
                    .try_sign(message)
                    .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
            KeyMaterial::Ed25519(_) if ethereum_hashing => {
                Err(CoreError::UnsupportedHashing(Curve::Ed25519.to_string()))
            }
            KeyMaterial::Ed25519(key) => Ok(key.sign(message).to_bytes().to_vec()),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Sign `message` with a raw private key.
///
/// With `ethereum_hashing` the message is wrapped in the Ethereum personal
/// message envelope, Keccak-256 hashed and signed recoverably (65 bytes,
/// `v = 27 | 28`). Otherwise secp256k1 signs SHA-256 of the message (64
/// bytes) and Ed25519 signs the message directly.
pub fn sign_message(
    private_key: &[u8],
    message: &[u8],
    curve: Curve,
    ethereum_hashing: bool,
) -> Result<Vec<u8>> {
    Keypair::from_private_bytes(curve, private_key)?.sign(message, ethereum_hashing)
}

/// Verify a signature produced by [`sign_message`] with the same hashing mode.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify_message(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
    curve: Curve,
    ethereum_hashing: bool,
) -> bool {
    match curve {
        Curve::Secp256k1 => verify_secp256k1(public_key, message, signature, ethereum_hashing),
        Curve::Ed25519 if ethereum_hashing => false,
        Curve::Ed25519 => verify_ed25519(public_key, message, signature),
    }
}

fn verify_secp256k1(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
    ethereum_hashing: bool,
) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };

    if !ethereum_hashing {
        if signature.len() != 64 {
            return false;
        }
        return match EcdsaSignature::from_slice(signature) {
            Ok(sig) => key.verify(message, &sig).is_ok(),
            Err(_) => false,
        };
    }

    if signature.len() != 65 {
        return false;
    }
    let v = signature[64];
    let Some(recovery_id) = v.checked_sub(27).and_then(RecoveryId::from_byte) else {
        return false;
    };
    let Ok(sig) = EcdsaSignature::from_slice(&signature[..64]) else {
        return false;
    };

    let digest = ethereum_message_hash(message);
    match VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id) {
        Ok(recovered) => recovered == key,
        Err(_) => false,
    }
}

fn verify_ed25519(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; ED25519_PUBLIC_KEY_LENGTH]>::try_from(public_key) else {
        return false;
    };
    let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
        return false;
    };
    key.verify_strict(message, &sig).is_ok()
}

/// Keccak-256.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    finalize_keccak(hasher)
}

/// Keccak-256 of `"\x19Ethereum Signed Message:\n" || len(message) || message`.
pub fn ethereum_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(ETHEREUM_MESSAGE_PREFIX);
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    finalize_keccak(hasher)
}

fn finalize_keccak(hasher: Keccak256) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Derive the Ethereum address of a secp256k1 public key.
///
/// Accepts compressed or uncompressed SEC1 bytes. The address is the last 20
/// bytes of Keccak-256 over the uncompressed point without its `0x04` tag.
pub fn derive_address(public_key: &[u8]) -> Result<Address> {
    let key =
        VerifyingKey::from_sec1_bytes(public_key).map_err(|e| CoreError::InvalidKey(e.to_string()))?;
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Ok(Address(address))
}
