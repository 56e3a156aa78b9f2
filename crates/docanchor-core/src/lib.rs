//! # docanchor core
//!
//! Pure primitives for docanchor: identities, signing, the core document
//! envelope and its canonical encoding.
//!
//! This crate contains no storage and no networking. Its only I/O is reading
//! and writing PEM key files.
//!
//! ## Key Types
//!
//! - [`CentId`] - 6-byte network identity
//! - [`KeyPurpose`] - what a registered key may be used for
//! - [`Keypair`] / [`PublicKey`] - secp256k1 or Ed25519 keys
//! - [`CoreDocument`] - the versioned, salted, signed envelope
//! - [`EmbeddedModel`] / [`TypeRegistry`] - typed payloads
//!
//! ## Canonicalization
//!
//! All schemas are deterministic CBOR maps with integer keys. See the
//! [`canonical`] and [`wire`] modules.

pub mod canonical;
pub mod crypto;
pub mod document;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod keyfile;
pub mod model;
pub mod salts;
pub mod types;
pub mod validation;
pub mod wire;

pub use crypto::{
    derive_address, ethereum_message_hash, sign_message, verify_message, Address, Blake3Hash,
    Curve, Keypair, PublicKey,
};
pub use document::{CoreDocument, Signature};
pub use envelope::{new_version, pack_core_document, unpack_core_document};
pub use error::{CoreError, Result};
pub use identity::{CentId, KeyPurpose, CENT_ID_LENGTH};
pub use keyfile::{generate_key_pair, read_private_key, read_public_key};
pub use model::{EmbeddedModel, TypeRegistry};
pub use salts::{FieldSalts, Salt};
pub use types::{DocumentId, VersionId};
pub use validation::{validate_envelope, validate_identities, verify_signature};
pub use wire::CoreDocumentWire;
