//! In-memory implementation of the DocumentStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. Data survives a
//! close/open cycle of the same instance.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use docanchor_core::CoreDocument;

use crate::error::{Result, StoreError};
use crate::traits::{document_key, plan_put, version_key, DocumentStore, PutPlan, PutResult};

/// In-memory store implementation.
///
/// Thread-safe via RwLock. `put_document` holds the write lock for its whole
/// read-check-write sequence.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    open: bool,
    entries: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Create a new empty, unopened store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                open: false,
                entries: HashMap::new(),
            }),
        }
    }

    /// Create a new empty store that is already open.
    pub fn opened() -> Self {
        let store = Self::new();
        store.inner.write().open = true;
        store
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn open(&self) -> Result<()> {
        self.inner.write().open = true;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.write().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.read().open
    }

    async fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let inner = self.inner.read();
        if !inner.open {
            return Err(StoreError::NotOpen);
        }
        inner
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(String::from_utf8_lossy(key).into_owned()))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.open {
            return Err(StoreError::NotOpen);
        }
        inner.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn put_document(&self, doc: &CoreDocument) -> Result<PutResult> {
        let encoded = doc.to_bytes();
        let head_key = document_key(&doc.document_id);
        let ver_key = version_key(&doc.document_id, &doc.current_version);

        let mut inner = self.inner.write();
        if !inner.open {
            return Err(StoreError::NotOpen);
        }

        let plan = plan_put(
            doc,
            &encoded,
            inner.entries.get(&ver_key).map(Vec::as_slice),
            inner.entries.get(&head_key).map(Vec::as_slice),
        )?;

        match plan {
            PutPlan::Unchanged => Ok(PutResult::AlreadyExists),
            PutPlan::Insert => {
                inner.entries.insert(ver_key, encoded);
                inner
                    .entries
                    .insert(head_key, doc.current_version.0.to_vec());
                tracing::debug!(
                    document = %doc.document_id,
                    version = %doc.current_version,
                    "stored document version"
                );
                Ok(PutResult::Inserted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use docanchor_core::{DocumentId, FieldSalts, VersionId};
    use std::sync::Arc;

    fn make_doc(id: DocumentId, previous: Option<VersionId>) -> CoreDocument {
        CoreDocument {
            document_id: id,
            current_version: VersionId::random(),
            previous_version: previous,
            embedded_type: "test.Type".into(),
            embedded_data: Bytes::from_static(&[0xa0]),
            field_salts: FieldSalts::generate(&["a"]),
            collaborators: Vec::new(),
            signatures: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_unopened_store_fails() {
        let store = MemoryStore::new();
        assert!(matches!(store.get(b"k").await, Err(StoreError::NotOpen)));
        assert!(matches!(store.put(b"k", b"v").await, Err(StoreError::NotOpen)));

        let doc = make_doc(DocumentId::random(), None);
        assert!(matches!(store.put_document(&doc).await, Err(StoreError::NotOpen)));
    }

    #[tokio::test]
    async fn test_kv_roundtrip_and_lifecycle() {
        let store = MemoryStore::new();
        store.open().await.unwrap();
        store.put(b"k", b"v").await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), b"v");
        assert!(matches!(store.get(b"missing").await, Err(StoreError::NotFound(_))));

        store.close().await.unwrap();
        assert!(!store.is_open());
        assert!(matches!(store.get(b"k").await, Err(StoreError::NotOpen)));

        store.open().await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), b"v");
    }

    #[tokio::test]
    async fn test_put_and_get_document() {
        let store = MemoryStore::opened();
        let doc = make_doc(DocumentId::random(), None);

        assert_eq!(store.put_document(&doc).await.unwrap(), PutResult::Inserted);
        assert_eq!(store.put_document(&doc).await.unwrap(), PutResult::AlreadyExists);

        let head = store.get_document(&doc.document_id).await.unwrap();
        assert_eq!(head, doc);
    }

    #[tokio::test]
    async fn test_version_chain_advances_head() {
        let store = MemoryStore::opened();
        let id = DocumentId::random();
        let v1 = make_doc(id, None);
        let v2 = make_doc(id, Some(v1.current_version));

        store.put_document(&v1).await.unwrap();
        store.put_document(&v2).await.unwrap();

        assert_eq!(store.get_document(&id).await.unwrap(), v2);
        assert_eq!(
            store.get_document_version(&id, &v1.current_version).await.unwrap(),
            v1
        );
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let store = MemoryStore::opened();
        let id = DocumentId::random();
        let v1 = make_doc(id, None);
        let v2 = make_doc(id, Some(v1.current_version));
        let sibling = make_doc(id, Some(v1.current_version));

        store.put_document(&v1).await.unwrap();
        store.put_document(&v2).await.unwrap();

        assert!(matches!(
            store.put_document(&sibling).await,
            Err(StoreError::VersionConflict { .. })
        ));
        assert_eq!(store.get_document(&id).await.unwrap(), v2);
    }

    #[tokio::test]
    async fn test_conflicting_content_same_version() {
        let store = MemoryStore::opened();
        let doc = make_doc(DocumentId::random(), None);
        store.put_document(&doc).await.unwrap();

        let mut tampered = doc.clone();
        tampered.embedded_data = Bytes::from_static(&[0xa1, 0x01, 0x01]);
        assert!(matches!(
            store.put_document(&tampered).await,
            Err(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_versions_exactly_one_wins() {
        let store = Arc::new(MemoryStore::opened());
        let id = DocumentId::random();
        let v1 = make_doc(id, None);
        store.put_document(&v1).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let candidate = make_doc(id, Some(v1.current_version));
            handles.push(tokio::spawn(async move { store.put_document(&candidate).await }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
