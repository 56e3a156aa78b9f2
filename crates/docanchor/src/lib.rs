//! # docanchor
//!
//! A node in a peer-to-peer document anchoring network.
//!
//! ## Overview
//!
//! Business documents are wrapped in a versioned, salted envelope (the core
//! document), signed by identified collaborators and pushed directly to the
//! other collaborators, who verify every signature against the identity
//! registry before storing the document.
//!
//! - **Core documents**: one envelope format for every payload type
//! - **Invoices**: the typed document this node ships with
//! - **Identities**: 6-byte ids with keys per purpose in an external registry
//! - **Exchange**: request/reply push with a staged validation pipeline
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use docanchor::core::{CentId, Curve, KeyPurpose, Keypair};
//! use docanchor::identity::MemoryRegistry;
//! use docanchor::p2p::MemoryNetwork;
//! use docanchor::store::MemoryStore;
//! use docanchor::{InvoiceCreatePayload, Node, NodeConfig};
//!
//! async fn example() -> docanchor::Result<()> {
//!     let registry = Arc::new(MemoryRegistry::default());
//!     let network = MemoryNetwork::new();
//!
//!     // Identity with a registered signing key
//!     let id = CentId::random();
//!     let key = Keypair::generate(Curve::Secp256k1);
//!     registry.insert_confirmed(id, [(KeyPurpose::Signing, key.public_key())]);
//!
//!     let (transport, inbound) = network.connect(id).await;
//!     let node = Node::new(
//!         id,
//!         key,
//!         Arc::new(MemoryStore::opened()),
//!         registry,
//!         transport,
//!         NodeConfig::default(),
//!     );
//!     node.serve(inbound);
//!
//!     // Create, sign and push an invoice
//!     let invoice = node.create_invoice(&InvoiceCreatePayload::default()).await?;
//!     node.send_to_collaborators(&invoice).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `docanchor::core` - Identities, keys, the core document envelope
//! - `docanchor::store` - Storage gateway, in-memory and SQLite
//! - `docanchor::identity` - Identity registry and provisioning
//! - `docanchor::p2p` - Transmit protocol

pub mod error;
pub mod invoice;
pub mod node;

// Re-export component crates
pub use docanchor_core as core;
pub use docanchor_identity as identity;
pub use docanchor_p2p as p2p;
pub use docanchor_store as store;

// Re-export main types for convenience
pub use error::{NodeError, Result};
pub use invoice::{
    Invoice, InvoiceClientData, InvoiceCreatePayload, InvoiceData, INVOICE_TYPE_ID,
};
pub use node::{document_types, Delivery, Node, NodeConfig};

// Re-export commonly used core types
pub use docanchor_core::{CentId, CoreDocument, DocumentId, KeyPurpose, Keypair, VersionId};
