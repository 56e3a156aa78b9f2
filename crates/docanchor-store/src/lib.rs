//! # docanchor store
//!
//! The storage gateway. Provides a trait-based interface for key-value and
//! document persistence with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`DocumentStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`PutResult`] - Result of storing a document version
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docanchor_store::{DocumentStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::new("documents.db");
//!     store.open().await.unwrap();
//!     // let result = store.put_document(&doc).await.unwrap();
//!     store.close().await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent writes**: Storing the same version twice returns `AlreadyExists`
//! - **Conflict detection**: Different content under the same version is `Conflict`
//! - **Version chain**: The head only moves to a version whose previous version
//!   is the current head

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{document_key, version_key, DocumentStore, PutResult};
