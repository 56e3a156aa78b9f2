//! The core document envelope.
//!
//! A [`CoreDocument`] wraps one typed business payload with its identity,
//! version chain, per-field salts, collaborator list and signatures. It is
//! the only unit exchanged between peers and stored by the gateway.

use bytes::Bytes;
use std::fmt;

use crate::crypto::{Blake3Hash, Curve, Keypair, PublicKey};
use crate::error::{CoreError, Result};
use crate::identity::CentId;
use crate::salts::{FieldSalts, Salt};
use crate::types::{DocumentId, VersionId};
use crate::wire::{CoreDocumentWire, SignatureWire};

/// Domain separator for the signing root.
const SIGNING_ROOT_DOMAIN: &[u8] = b"docanchor-signing-root-v0:";

/// A collaborator's signature over a document's signing root.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    pub signer: CentId,
    pub public_key: PublicKey,
    /// The signing root this signature covers.
    pub digest: [u8; 32],
    pub signature: Vec<u8>,
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("signer", &self.signer)
            .field("public_key", &self.public_key)
            .field("digest", &&hex::encode(self.digest)[..16])
            .finish()
    }
}

/// The versioned envelope around a typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreDocument {
    pub document_id: DocumentId,
    pub current_version: VersionId,
    pub previous_version: Option<VersionId>,
    /// Type identifier of the embedded payload.
    pub embedded_type: String,
    /// Opaque canonical payload bytes.
    pub embedded_data: Bytes,
    pub field_salts: FieldSalts,
    /// Ordered; duplicates are preserved.
    pub collaborators: Vec<CentId>,
    pub signatures: Vec<Signature>,
}

impl CoreDocument {
    /// Whether this is the first version of the document.
    pub fn is_initial_version(&self) -> bool {
        self.previous_version.is_none()
    }

    /// Blake3 over the canonical encoding of everything except signatures.
    ///
    /// Signatures commit to this value, so attaching more signatures never
    /// invalidates earlier ones.
    pub fn signing_root(&self) -> Blake3Hash {
        let mut wire = CoreDocumentWire::from(self);
        wire.signatures.clear();

        let mut hasher = blake3::Hasher::new();
        hasher.update(SIGNING_ROOT_DOMAIN);
        hasher.update(&wire.encode());
        Blake3Hash(*hasher.finalize().as_bytes())
    }

    /// The signature attached by `signer`, if any.
    pub fn signature_by(&self, signer: &CentId) -> Option<&Signature> {
        self.signatures.iter().find(|s| &s.signer == signer)
    }

    /// Sign the current signing root as `signer` and attach the signature.
    ///
    /// An earlier signature by the same signer is replaced.
    pub fn sign(&mut self, signer: CentId, keypair: &Keypair) -> Result<()> {
        let root = self.signing_root();
        let signature = keypair.sign(root.as_bytes(), false)?;

        self.signatures.retain(|s| s.signer != signer);
        self.signatures.push(Signature {
            signer,
            public_key: keypair.public_key(),
            digest: root.0,
            signature,
        });
        Ok(())
    }

    /// Canonical wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        CoreDocumentWire::from(self).encode()
    }

    /// Parse and validate canonical wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::try_from(CoreDocumentWire::decode(bytes)?)
    }
}

impl From<&CoreDocument> for CoreDocumentWire {
    fn from(doc: &CoreDocument) -> Self {
        CoreDocumentWire {
            document_id: doc.document_id.0.to_vec(),
            current_version: doc.current_version.0.to_vec(),
            previous_version: doc.previous_version.map(|v| v.0.to_vec()),
            embedded_type: doc.embedded_type.clone(),
            embedded_data: doc.embedded_data.to_vec(),
            field_salts: doc
                .field_salts
                .iter()
                .map(|(name, salt)| (name.to_string(), salt.0.to_vec()))
                .collect(),
            collaborators: doc.collaborators.iter().map(|c| c.0.to_vec()).collect(),
            signatures: doc
                .signatures
                .iter()
                .map(|s| SignatureWire {
                    signer: s.signer.0.to_vec(),
                    curve: s.public_key.curve.to_u8(),
                    public_key: s.public_key.bytes.clone(),
                    digest: s.digest.to_vec(),
                    signature: s.signature.clone(),
                })
                .collect(),
        }
    }
}

impl TryFrom<CoreDocumentWire> for CoreDocument {
    type Error = CoreError;

    /// Validate every fixed-width field. Nothing is truncated or padded.
    fn try_from(wire: CoreDocumentWire) -> Result<Self> {
        let document_id = DocumentId::from_slice(&wire.document_id)?;
        let current_version = VersionId::from_slice(&wire.current_version)?;
        let previous_version = wire
            .previous_version
            .as_deref()
            .map(VersionId::from_slice)
            .transpose()?;

        let mut field_salts = FieldSalts::new();
        for (name, salt) in &wire.field_salts {
            field_salts.insert(name.clone(), Salt::from_slice(salt)?);
        }

        let collaborators = wire
            .collaborators
            .iter()
            .map(|c| CentId::from_slice(c))
            .collect::<Result<Vec<_>>>()?;

        let signatures = wire
            .signatures
            .iter()
            .map(signature_from_wire)
            .collect::<Result<Vec<_>>>()?;

        Ok(CoreDocument {
            document_id,
            current_version,
            previous_version,
            embedded_type: wire.embedded_type,
            embedded_data: Bytes::from(wire.embedded_data),
            field_salts,
            collaborators,
            signatures,
        })
    }
}

fn signature_from_wire(sig: &SignatureWire) -> Result<Signature> {
    let signer = CentId::from_slice(&sig.signer)?;
    let curve = Curve::from_u8(sig.curve)
        .ok_or_else(|| CoreError::Decode(format!("unknown curve {}", sig.curve)))?;
    if sig.public_key.len() != curve.public_key_length() {
        return Err(CoreError::invalid_length(
            curve.public_key_length(),
            sig.public_key.len(),
        ));
    }
    let digest: [u8; 32] = sig
        .digest
        .as_slice()
        .try_into()
        .map_err(|_| CoreError::invalid_length(32, sig.digest.len()))?;

    Ok(Signature {
        signer,
        public_key: PublicKey {
            curve,
            bytes: sig.public_key.clone(),
        },
        digest,
        signature: sig.signature.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> CoreDocument {
        CoreDocument {
            document_id: DocumentId::random(),
            current_version: VersionId::random(),
            previous_version: None,
            embedded_type: "test.Type".into(),
            embedded_data: Bytes::from_static(&[0xa0]),
            field_salts: FieldSalts::generate(&["a", "b"]),
            collaborators: vec![CentId([1, 2, 3, 4, 5, 6]), CentId([1, 2, 3, 4, 5, 6])],
            signatures: Vec::new(),
        }
    }

    #[test]
    fn test_bytes_roundtrip_preserves_everything() {
        let mut doc = sample_document();
        doc.previous_version = Some(VersionId::random());
        let keypair = Keypair::generate(Curve::Secp256k1);
        doc.sign(CentId([9; 6]), &keypair).unwrap();

        let decoded = CoreDocument::from_bytes(&doc.to_bytes()).unwrap();
        assert_eq!(decoded, doc);
        assert_eq!(decoded.collaborators.len(), 2);
    }

    #[test]
    fn test_signing_root_ignores_signatures() {
        let mut doc = sample_document();
        let root = doc.signing_root();

        doc.sign(CentId([9; 6]), &Keypair::generate(Curve::Secp256k1)).unwrap();
        assert_eq!(doc.signing_root(), root);
        assert_eq!(doc.signatures[0].digest, root.0);
    }

    #[test]
    fn test_signing_root_covers_payload() {
        let doc = sample_document();
        let mut changed = doc.clone();
        changed.embedded_data = Bytes::from_static(&[0xa1, 0x01, 0x02]);
        assert_ne!(doc.signing_root(), changed.signing_root());
    }

    #[test]
    fn test_resign_replaces_signature() {
        let mut doc = sample_document();
        let signer = CentId([9; 6]);
        let keypair = Keypair::generate(Curve::Secp256k1);
        doc.sign(signer, &keypair).unwrap();
        doc.sign(signer, &keypair).unwrap();
        assert_eq!(doc.signatures.len(), 1);
        assert!(doc.signature_by(&signer).is_some());
    }

    #[test]
    fn test_wrong_width_collaborator_rejected() {
        let mut wire = CoreDocumentWire::from(&sample_document());
        wire.collaborators.push(vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(matches!(
            CoreDocument::try_from(wire),
            Err(CoreError::InvalidLength { expected: 6, actual: 7 })
        ));
    }

    #[test]
    fn test_wrong_width_signer_rejected() {
        let mut doc = sample_document();
        doc.sign(CentId([9; 6]), &Keypair::generate(Curve::Secp256k1)).unwrap();
        let mut wire = CoreDocumentWire::from(&doc);
        wire.signatures[0].signer = vec![9; 5];
        assert!(matches!(
            CoreDocument::try_from(wire),
            Err(CoreError::InvalidLength { expected: 6, actual: 5 })
        ));
    }

    #[test]
    fn test_wrong_width_document_id_rejected() {
        let mut wire = CoreDocumentWire::from(&sample_document());
        wire.document_id = vec![0; 16];
        assert!(matches!(
            CoreDocument::try_from(wire),
            Err(CoreError::InvalidLength { expected: 32, actual: 16 })
        ));
    }
}
