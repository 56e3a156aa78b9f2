//! SQLite implementation of the DocumentStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use docanchor_core::CoreDocument;

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{document_key, plan_put, version_key, DocumentStore, PutPlan, PutResult};

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-based store implementation.
///
/// The connection exists only while the store is open. All operations run
/// on the blocking pool.
pub struct SqliteStore {
    location: Location,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// A store backed by the database file at `path`. Call `open` before use.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            location: Location::File(path.as_ref().to_path_buf()),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// A store backed by a private in-memory database. Closing it drops the
    /// data.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `f` against the open connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            let conn = guard.as_mut().ok_or(StoreError::NotOpen)?;
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn open(&self) -> Result<()> {
        let location = self.location.clone();
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut guard = conn.lock();
            if guard.is_some() {
                return Ok(());
            }
            let mut connection = match &location {
                Location::File(path) => {
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent)?;
                    }
                    Connection::open(path)?
                }
                Location::Memory => Connection::open_in_memory()?,
            };
            migration::migrate(&mut connection)?;
            *guard = Some(connection);
            tracing::debug!(location = ?location, "opened sqlite store");
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn close(&self) -> Result<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(connection) = conn.lock().take() {
                connection.close().map_err(|(_, e)| StoreError::Database(e))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    async fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let key = key.to_vec();
        self.run(move |conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| StoreError::NotFound(String::from_utf8_lossy(&key).into_owned()))
        })
        .await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let key = key.to_vec();
        let value = value.to_vec();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn put_document(&self, doc: &CoreDocument) -> Result<PutResult> {
        let doc = doc.clone();
        let encoded = doc.to_bytes();

        self.run(move |conn| {
            let head_key = document_key(&doc.document_id);
            let ver_key = version_key(&doc.document_id, &doc.current_version);

            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let stored_version: Option<Vec<u8>> = tx
                .query_row("SELECT value FROM kv WHERE key = ?1", params![ver_key], |row| {
                    row.get(0)
                })
                .optional()?;
            let stored_head: Option<Vec<u8>> = tx
                .query_row("SELECT value FROM kv WHERE key = ?1", params![head_key], |row| {
                    row.get(0)
                })
                .optional()?;

            let plan = plan_put(
                &doc,
                &encoded,
                stored_version.as_deref(),
                stored_head.as_deref(),
            )?;

            match plan {
                PutPlan::Unchanged => Ok(PutResult::AlreadyExists),
                PutPlan::Insert => {
                    let now = now_millis();
                    tx.execute(
                        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                        params![ver_key, encoded, now],
                    )?;
                    tx.execute(
                        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                        params![head_key, doc.current_version.0.to_vec(), now],
                    )?;
                    tx.commit()?;

                    tracing::debug!(
                        document = %doc.document_id,
                        version = %doc.current_version,
                        "stored document version"
                    );
                    Ok(PutResult::Inserted)
                }
            }
        })
        .await
    }
}
