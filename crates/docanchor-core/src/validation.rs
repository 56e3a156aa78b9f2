//! Core document validation: envelope checks and signature verification.
//!
//! These are the pure steps of the receive pipeline. Looking up which key a
//! signer has registered is left to the caller.

use crate::crypto::PublicKey;
use crate::document::{CoreDocument, Signature};
use crate::error::{CoreError, Result};
use crate::model::TypeRegistry;
use crate::wire::CoreDocumentWire;

/// Check that the payload type is registered and the payload decodes.
pub fn validate_envelope(wire: &CoreDocumentWire, types: &TypeRegistry) -> Result<()> {
    // 1. Type must be present
    if wire.embedded_type.is_empty() {
        return Err(CoreError::MissingData("embedded data type is empty".into()));
    }

    // 2. Type must be known
    if !types.contains(&wire.embedded_type) {
        return Err(CoreError::UnrecognizedType(wire.embedded_type.clone()));
    }

    // 3. Payload must be present and decode
    if wire.embedded_data.is_empty() {
        return Err(CoreError::MissingData("embedded data is empty".into()));
    }
    types.check(&wire.embedded_type, &wire.embedded_data)
}

/// Check identity widths by converting to the domain type.
pub fn validate_identities(wire: CoreDocumentWire) -> Result<CoreDocument> {
    CoreDocument::try_from(wire)
}

/// Verify one signature against the key its signer has registered.
///
/// Checks, in order: the embedded key is the registered key, the signature
/// covers the document's current signing root, and the signature is
/// cryptographically valid.
pub fn verify_signature(
    doc: &CoreDocument,
    signature: &Signature,
    registered_key: &PublicKey,
) -> Result<()> {
    // 1. Key must match the registry
    if &signature.public_key != registered_key {
        return Err(CoreError::SignatureVerification(format!(
            "key of {} is not its registered signing key",
            signature.signer
        )));
    }

    // 2. Digest must be the current signing root
    let root = doc.signing_root();
    if signature.digest != root.0 {
        return Err(CoreError::SignatureVerification(format!(
            "signature of {} does not cover the current document",
            signature.signer
        )));
    }

    // 3. Cryptographic check
    if !registered_key.verify(root.as_bytes(), &signature.signature, false) {
        return Err(CoreError::SignatureVerification(format!(
            "invalid signature by {}",
            signature.signer
        )));
    }

    Ok(())
}
