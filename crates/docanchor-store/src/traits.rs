//! DocumentStore trait: the storage gateway contract.
//!
//! A plain key-value interface plus document-level operations keyed by
//! document id and version. Implementations include SQLite (primary) and
//! in-memory (for tests).

use async_trait::async_trait;
use docanchor_core::{CoreDocument, DocumentId, VersionId};

use crate::error::{Result, StoreError};

/// Result of storing a document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutResult {
    /// The version was new and is now the document head.
    Inserted,
    /// The identical version was already stored (idempotent, not an error).
    AlreadyExists,
}

/// Key holding the head version id of a document.
pub fn document_key(id: &DocumentId) -> Vec<u8> {
    format!("doc/{}", id.to_hex()).into_bytes()
}

/// Key holding the encoded envelope of one document version.
pub fn version_key(id: &DocumentId, version: &VersionId) -> Vec<u8> {
    format!("doc/{}/{}", id.to_hex(), version.to_hex()).into_bytes()
}

/// What `put_document` must do, decided from the current stored state.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PutPlan {
    /// Write the version and move the head to it.
    Insert,
    /// Nothing to write.
    Unchanged,
}

/// Decide a `put_document` against the stored version bytes and head.
///
/// The head only advances when the new version's `previous_version` is the
/// current head (compare-and-swap), so concurrent writers cannot fork the
/// version chain. A document with no stored head is accepted as is.
pub(crate) fn plan_put(
    doc: &CoreDocument,
    encoded: &[u8],
    stored_version: Option<&[u8]>,
    stored_head: Option<&[u8]>,
) -> Result<PutPlan> {
    if let Some(stored) = stored_version {
        if stored == encoded {
            return Ok(PutPlan::Unchanged);
        }
        return Err(StoreError::Conflict {
            key: String::from_utf8_lossy(&version_key(&doc.document_id, &doc.current_version))
                .into_owned(),
        });
    }

    let Some(head) = stored_head else {
        return Ok(PutPlan::Insert);
    };
    let head = VersionId::from_slice(head)
        .map_err(|e| StoreError::Serialization(format!("corrupt head pointer: {}", e)))?;

    if doc.previous_version == Some(head) {
        Ok(PutPlan::Insert)
    } else {
        Err(StoreError::VersionConflict {
            document: doc.document_id.to_hex(),
            head: head.to_hex(),
            previous: doc
                .previous_version
                .map(|v| v.to_hex())
                .unwrap_or_else(|| "none".into()),
        })
    }
}

/// The storage gateway: async interface for document persistence.
///
/// Every operation on a store that is not open fails with
/// [`StoreError::NotOpen`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Open the store. Opening an open store is a no-op.
    async fn open(&self) -> Result<()>;

    /// Close the store. Closing a closed store is a no-op.
    async fn close(&self) -> Result<()>;

    /// Whether the store is currently open.
    fn is_open(&self) -> bool;

    // ─────────────────────────────────────────────────────────────────────────
    // Raw key-value access
    // ─────────────────────────────────────────────────────────────────────────

    /// Read the value under `key`.
    async fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Write `value` under `key`, replacing any previous value.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Key under which the head of a document is tracked.
    fn get_document_key(&self, id: &DocumentId) -> Vec<u8> {
        document_key(id)
    }

    /// Store one document version under its document id and version id.
    ///
    /// Atomic with respect to other calls on the same store:
    /// - identical content already stored returns `AlreadyExists`;
    /// - different content under the same version is `Conflict`;
    /// - a `previous_version` other than the stored head is `VersionConflict`.
    async fn put_document(&self, doc: &CoreDocument) -> Result<PutResult>;

    /// Fetch the head version of a document.
    async fn get_document(&self, id: &DocumentId) -> Result<CoreDocument> {
        let head = self.get(&self.get_document_key(id)).await?;
        let head = VersionId::from_slice(&head)
            .map_err(|e| StoreError::Serialization(format!("corrupt head pointer: {}", e)))?;
        self.get_document_version(id, &head).await
    }

    /// Fetch a specific version of a document.
    async fn get_document_version(
        &self,
        id: &DocumentId,
        version: &VersionId,
    ) -> Result<CoreDocument> {
        let bytes = self.get(&version_key(id, version)).await?;
        CoreDocument::from_bytes(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use docanchor_core::FieldSalts;

    fn doc(previous: Option<VersionId>) -> CoreDocument {
        CoreDocument {
            document_id: DocumentId::from_bytes([1; 32]),
            current_version: VersionId::random(),
            previous_version: previous,
            embedded_type: "t".into(),
            embedded_data: Bytes::from_static(&[0xa0]),
            field_salts: FieldSalts::new(),
            collaborators: Vec::new(),
            signatures: Vec::new(),
        }
    }

    #[test]
    fn test_keys_are_distinct_per_version() {
        let id = DocumentId::from_bytes([1; 32]);
        let v1 = VersionId::from_bytes([2; 32]);
        let v2 = VersionId::from_bytes([3; 32]);
        assert_ne!(version_key(&id, &v1), version_key(&id, &v2));
        assert_ne!(document_key(&id), version_key(&id, &v1));
    }

    #[test]
    fn test_plan_first_version() {
        let d = doc(None);
        assert_eq!(plan_put(&d, &d.to_bytes(), None, None).unwrap(), PutPlan::Insert);
    }

    #[test]
    fn test_plan_identical_is_unchanged() {
        let d = doc(None);
        let bytes = d.to_bytes();
        let head = d.current_version.0;
        assert_eq!(
            plan_put(&d, &bytes, Some(&bytes), Some(&head)).unwrap(),
            PutPlan::Unchanged
        );
    }

    #[test]
    fn test_plan_conflicting_content() {
        let d = doc(None);
        assert!(matches!(
            plan_put(&d, &d.to_bytes(), Some(b"other"), None),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn test_plan_requires_previous_to_be_head() {
        let head = VersionId::random();
        let next = doc(Some(head));
        assert_eq!(
            plan_put(&next, &next.to_bytes(), None, Some(&head.0)).unwrap(),
            PutPlan::Insert
        );

        let stale = doc(Some(VersionId::random()));
        assert!(matches!(
            plan_put(&stale, &stale.to_bytes(), None, Some(&head.0)),
            Err(StoreError::VersionConflict { .. })
        ));
    }
}
