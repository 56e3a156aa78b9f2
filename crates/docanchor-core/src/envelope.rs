//! Packing typed payloads into core documents and back.
//!
//! Salts are generated once, when a field is first packed. Changing a salted
//! field or the collaborator set requires an explicit [`new_version`], which
//! regenerates salts only for the fields that changed.

use bytes::Bytes;

use crate::document::CoreDocument;
use crate::error::{CoreError, Result};
use crate::identity::CentId;
use crate::model::EmbeddedModel;
use crate::salts::FieldSalts;
use crate::types::{DocumentId, VersionId};

/// Pseudo-field name reported when the collaborator set changes.
pub const COLLABORATORS_FIELD: &str = "collaborators";

/// Pack `model` into a core document.
///
/// Without `existing` a new document is minted: fresh document and version
/// ids and a salt for every field. With `existing` the envelope is reused:
/// identity, version chain, salts and signatures are preserved and only
/// missing salts are filled. If nothing changed the existing envelope is
/// returned as is.
pub fn pack_core_document<M: EmbeddedModel>(
    model: &M,
    collaborators: &[CentId],
    existing: Option<&CoreDocument>,
) -> Result<CoreDocument> {
    let Some(existing) = existing else {
        return Ok(CoreDocument {
            document_id: DocumentId::random(),
            current_version: VersionId::random(),
            previous_version: None,
            embedded_type: M::TYPE_ID.to_string(),
            embedded_data: Bytes::from(model.to_payload()),
            field_salts: FieldSalts::generate(M::field_names()),
            collaborators: collaborators.to_vec(),
            signatures: Vec::new(),
        });
    };

    if existing.embedded_type != M::TYPE_ID {
        return Err(CoreError::UnrecognizedType(existing.embedded_type.clone()));
    }

    let previous = M::from_payload(&existing.embedded_data)?;
    if let Some(field) = model
        .changed_fields(&previous)
        .into_iter()
        .find(|f| existing.field_salts.contains(f))
    {
        return Err(CoreError::UnversionedMutation(field.to_string()));
    }
    if existing.collaborators != collaborators {
        return Err(CoreError::UnversionedMutation(COLLABORATORS_FIELD.to_string()));
    }

    let mut doc = existing.clone();
    // Unsalted fields may still change; the payload is re-encoded only then,
    // and signatures over the old payload are dropped.
    if !model.changed_fields(&previous).is_empty() {
        doc.embedded_data = Bytes::from(model.to_payload());
        doc.signatures.clear();
    }
    doc.field_salts.fill_missing(M::field_names());
    Ok(doc)
}

/// Derive the next version of `previous` carrying `model`.
///
/// The document id is kept, `previous_version` points at the old
/// `current_version` and a fresh version id is minted. Salts of unchanged
/// fields are kept, salts of changed fields are regenerated and signatures
/// are cleared.
pub fn new_version<M: EmbeddedModel>(
    model: &M,
    collaborators: &[CentId],
    previous: &CoreDocument,
) -> Result<CoreDocument> {
    if previous.embedded_type != M::TYPE_ID {
        return Err(CoreError::UnrecognizedType(previous.embedded_type.clone()));
    }
    let old = M::from_payload(&previous.embedded_data)?;

    let mut field_salts = previous.field_salts.clone();
    for field in model.changed_fields(&old) {
        field_salts.regenerate(field);
    }
    field_salts.fill_missing(M::field_names());

    Ok(CoreDocument {
        document_id: previous.document_id,
        current_version: VersionId::random(),
        previous_version: Some(previous.current_version),
        embedded_type: M::TYPE_ID.to_string(),
        embedded_data: Bytes::from(model.to_payload()),
        field_salts,
        collaborators: collaborators.to_vec(),
        signatures: Vec::new(),
    })
}

/// Extract the typed payload of a core document.
///
/// Each failure mode has its own error: a nil envelope is `NilDocument`, an
/// envelope with no type or no data is `MissingData`, a foreign type is
/// `UnrecognizedType`, a malformed payload is `Decode` and a wrong-width
/// identity inside the payload is `InvalidLength`.
pub fn unpack_core_document<M: EmbeddedModel>(doc: Option<&CoreDocument>) -> Result<M> {
    let doc = doc.ok_or(CoreError::NilDocument)?;

    if doc.embedded_type.is_empty() {
        return Err(CoreError::MissingData("embedded data type is empty".into()));
    }
    if doc.embedded_type != M::TYPE_ID {
        return Err(CoreError::UnrecognizedType(doc.embedded_type.clone()));
    }
    if doc.embedded_data.is_empty() {
        return Err(CoreError::MissingData("embedded data is empty".into()));
    }

    M::from_payload(&doc.embedded_data)
}
