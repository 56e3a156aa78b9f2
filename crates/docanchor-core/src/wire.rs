//! Wire schema of the core document.
//!
//! `CoreDocumentWire` mirrors the bytes exchanged between peers: every
//! identifier is a raw byte string and nothing about widths is assumed. The
//! domain type [`CoreDocument`](crate::document::CoreDocument) is obtained
//! through an explicit, validating conversion.
//!
//! Additive changes get new keys and keep [`WIRE_VERSION`]; older readers
//! skip the keys they do not know. The version is bumped only when the
//! meaning of an existing key changes, so a newer version is refused.

use ciborium::value::Value;

use crate::canonical::{decode_value, encode_canonical, key, MapReader};
use crate::error::{CoreError, Result};

/// Current core document schema version.
pub const WIRE_VERSION: u64 = 1;

/// Core document field keys. Numbers are never reused.
mod keys {
    pub const VERSION: u64 = 0;
    pub const DOCUMENT_ID: u64 = 1;
    pub const CURRENT_VERSION: u64 = 2;
    pub const PREVIOUS_VERSION: u64 = 3;
    pub const EMBEDDED_TYPE: u64 = 4;
    pub const EMBEDDED_DATA: u64 = 5;
    pub const FIELD_SALTS: u64 = 6;
    pub const COLLABORATORS: u64 = 7;
    pub const SIGNATURES: u64 = 8;
}

/// Signature entry field keys.
mod sig_keys {
    pub const SIGNER: u64 = 0;
    pub const CURVE: u64 = 1;
    pub const PUBLIC_KEY: u64 = 2;
    pub const DIGEST: u64 = 3;
    pub const SIGNATURE: u64 = 4;
}

/// A signature entry as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureWire {
    pub signer: Vec<u8>,
    pub curve: u8,
    pub public_key: Vec<u8>,
    pub digest: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A core document as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoreDocumentWire {
    pub document_id: Vec<u8>,
    pub current_version: Vec<u8>,
    pub previous_version: Option<Vec<u8>>,
    pub embedded_type: String,
    pub embedded_data: Vec<u8>,
    /// Field name and salt, in field-name order.
    pub field_salts: Vec<(String, Vec<u8>)>,
    pub collaborators: Vec<Vec<u8>>,
    pub signatures: Vec<SignatureWire>,
}

impl CoreDocumentWire {
    /// Convert to a CBOR map value.
    pub fn to_value(&self) -> Value {
        let salts = self
            .field_salts
            .iter()
            .map(|(name, salt)| (Value::Text(name.clone()), Value::Bytes(salt.clone())))
            .collect();

        let collaborators = self
            .collaborators
            .iter()
            .map(|c| Value::Bytes(c.clone()))
            .collect();

        let signatures = self.signatures.iter().map(signature_to_value).collect();

        Value::Map(vec![
            (key(keys::VERSION), Value::Integer(WIRE_VERSION.into())),
            (key(keys::DOCUMENT_ID), Value::Bytes(self.document_id.clone())),
            (key(keys::CURRENT_VERSION), Value::Bytes(self.current_version.clone())),
            (
                key(keys::PREVIOUS_VERSION),
                match &self.previous_version {
                    Some(v) => Value::Bytes(v.clone()),
                    None => Value::Null,
                },
            ),
            (key(keys::EMBEDDED_TYPE), Value::Text(self.embedded_type.clone())),
            (key(keys::EMBEDDED_DATA), Value::Bytes(self.embedded_data.clone())),
            (key(keys::FIELD_SALTS), Value::Map(salts)),
            (key(keys::COLLABORATORS), Value::Array(collaborators)),
            (key(keys::SIGNATURES), Value::Array(signatures)),
        ])
    }

    /// Parse from a CBOR map value. Unknown keys are ignored.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = MapReader::new(value, "core document")?;

        let version = map.uint(keys::VERSION, "version")?;
        if version == 0 || version > WIRE_VERSION {
            return Err(CoreError::Decode(format!(
                "unsupported core document version {}",
                version
            )));
        }

        let mut field_salts = Vec::new();
        for (k, v) in map.map(keys::FIELD_SALTS, "field_salts")? {
            match (k, v) {
                (Value::Text(name), Value::Bytes(salt)) => {
                    field_salts.push((name.clone(), salt.clone()))
                }
                _ => return Err(CoreError::Decode("field_salts: expected text -> bytes".into())),
            }
        }

        let mut collaborators = Vec::new();
        for item in map.array(keys::COLLABORATORS, "collaborators")? {
            match item {
                Value::Bytes(b) => collaborators.push(b.clone()),
                _ => return Err(CoreError::Decode("collaborators: expected bytes".into())),
            }
        }

        let signatures = map
            .array(keys::SIGNATURES, "signatures")?
            .iter()
            .map(signature_from_value)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            document_id: map.bytes(keys::DOCUMENT_ID, "document_id")?.to_vec(),
            current_version: map.bytes(keys::CURRENT_VERSION, "current_version")?.to_vec(),
            previous_version: map
                .opt_bytes(keys::PREVIOUS_VERSION, "previous_version")?
                .map(<[u8]>::to_vec),
            embedded_type: map.text_or_empty(keys::EMBEDDED_TYPE, "embedded_type")?.to_string(),
            embedded_data: map.bytes_or_empty(keys::EMBEDDED_DATA, "embedded_data")?.to_vec(),
            field_salts,
            collaborators,
            signatures,
        })
    }

    /// Canonical bytes.
    pub fn encode(&self) -> Vec<u8> {
        encode_canonical(&self.to_value())
    }

    /// Parse canonical bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_value(&decode_value(bytes)?)
    }
}

fn signature_to_value(sig: &SignatureWire) -> Value {
    Value::Map(vec![
        (key(sig_keys::SIGNER), Value::Bytes(sig.signer.clone())),
        (key(sig_keys::CURVE), Value::Integer(sig.curve.into())),
        (key(sig_keys::PUBLIC_KEY), Value::Bytes(sig.public_key.clone())),
        (key(sig_keys::DIGEST), Value::Bytes(sig.digest.clone())),
        (key(sig_keys::SIGNATURE), Value::Bytes(sig.signature.clone())),
    ])
}

fn signature_from_value(value: &Value) -> Result<SignatureWire> {
    let map = MapReader::new(value, "signature")?;
    let curve = map.uint(sig_keys::CURVE, "signature.curve")?;
    let curve = u8::try_from(curve)
        .map_err(|_| CoreError::Decode(format!("signature.curve: {} out of range", curve)))?;

    Ok(SignatureWire {
        signer: map.bytes(sig_keys::SIGNER, "signature.signer")?.to_vec(),
        curve,
        public_key: map.bytes(sig_keys::PUBLIC_KEY, "signature.public_key")?.to_vec(),
        digest: map.bytes(sig_keys::DIGEST, "signature.digest")?.to_vec(),
        signature: map.bytes(sig_keys::SIGNATURE, "signature.signature")?.to_vec(),
    })
}
