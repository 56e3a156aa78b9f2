//! The node: unified API for docanchor.
//!
//! A node owns an identity and its signing key, a document store, a view of
//! the identity registry and a transport. It creates and versions invoices,
//! signs them and pushes them to collaborators, and answers pushes from
//! other nodes.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use docanchor_core::{CentId, CoreDocument, DocumentId, KeyPurpose, Keypair, TypeRegistry};
use docanchor_identity::{IdentityRegistry, IdentityService};
use docanchor_p2p::{Inbound, P2PClient, P2PError, P2PServer, ServerConfig, Transport};
use docanchor_store::{DocumentStore, StoreError};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{NodeError, Result};
use crate::invoice::{Invoice, InvoiceCreatePayload, InvoiceData};

/// Configuration for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Receive pipeline configuration.
    pub server: ServerConfig,
    /// Deadline requested from collaborators when pushing documents.
    pub send_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            send_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of pushing a document to one collaborator.
#[derive(Debug)]
pub struct Delivery {
    pub collaborator: CentId,
    /// The collaborator's accepted copy, or why it was not accepted.
    pub outcome: std::result::Result<CoreDocument, P2PError>,
}

impl Delivery {
    pub fn is_accepted(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Payload types this node understands.
pub fn document_types() -> TypeRegistry {
    TypeRegistry::new().with::<InvoiceData>()
}

/// A docanchor node.
pub struct Node<S, R, T> {
    id: CentId,
    signing_key: Keypair,
    store: Arc<S>,
    client: P2PClient<T>,
    server: Arc<P2PServer<S, R>>,
}

impl<S, R, T> Node<S, R, T>
where
    S: DocumentStore + 'static,
    R: IdentityRegistry + 'static,
    T: Transport,
{
    /// Create a node. The store must be opened separately.
    pub fn new(
        id: CentId,
        signing_key: Keypair,
        store: Arc<S>,
        registry: Arc<R>,
        transport: T,
        config: NodeConfig,
    ) -> Self {
        let server = P2PServer::new(
            id,
            store.clone(),
            registry,
            document_types(),
            config.server.clone(),
        )
        .with_signing_key(signing_key.clone());

        Self {
            id,
            signing_key,
            store,
            client: P2PClient::new(transport).with_timeout(config.send_timeout),
            server: Arc::new(server),
        }
    }

    /// Create a node for the identity provisioned by `service`.
    pub fn from_identity(
        service: &IdentityService<R>,
        store: Arc<S>,
        transport: T,
        config: NodeConfig,
    ) -> Result<Self> {
        let id = service.config().cent_id()?;
        let signing_key = service.keypair(KeyPurpose::Signing)?;
        Ok(Self::new(
            id,
            signing_key,
            store,
            service.registry().clone(),
            transport,
            config,
        ))
    }

    pub fn id(&self) -> CentId {
        self.id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn server(&self) -> &Arc<P2PServer<S, R>> {
        &self.server
    }

    /// Answer inbound pushes in the background.
    pub fn serve(&self, inbound: Inbound) -> JoinHandle<()> {
        Arc::clone(&self.server).spawn(inbound)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invoices
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an invoice from a client payload, sign it and store it.
    pub async fn create_invoice(&self, payload: &InvoiceCreatePayload) -> Result<Invoice> {
        let mut invoice = Invoice::from_client_payload(payload)?;
        let doc = invoice.pack_core_document()?;
        let id = doc.document_id;
        let invoice = self.sign_and_store(doc).await?;

        tracing::info!(node = %self.id, document = %id, "invoice created");
        Ok(invoice)
    }

    /// Replace the contents of a stored invoice with a new version.
    pub async fn update_invoice(
        &self,
        id: &DocumentId,
        payload: &InvoiceCreatePayload,
    ) -> Result<Invoice> {
        let mut invoice = self.get_invoice(id).await?;
        let update = Invoice::from_client_payload(payload)?;
        invoice.data = update.data;
        invoice.collaborators = update.collaborators;

        let doc = invoice.new_version()?;
        let invoice = self.sign_and_store(doc).await?;

        tracing::info!(node = %self.id, document = %id, "invoice updated");
        Ok(invoice)
    }

    /// The latest stored version of an invoice.
    pub async fn get_invoice(&self, id: &DocumentId) -> Result<Invoice> {
        let doc = self.store.get_document(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => NodeError::DocumentNotFound(*id),
            other => NodeError::Store(other),
        })?;
        Invoice::unpack_core_document(&doc)
    }

    /// Push the invoice's current envelope to every collaborator but this
    /// node. Each collaborator is tried once; failures are reported per
    /// collaborator.
    pub async fn send_to_collaborators(&self, invoice: &Invoice) -> Result<Vec<Delivery>> {
        let doc = invoice.core_document().ok_or_else(|| {
            NodeError::InvalidOperation("invoice has not been packed".into())
        })?;

        let mut seen = HashSet::new();
        let mut deliveries = Vec::new();
        for &collaborator in &doc.collaborators {
            if collaborator == self.id || !seen.insert(collaborator) {
                continue;
            }

            let outcome = self.client.send_document(&collaborator, doc).await;
            if let Err(e) = &outcome {
                tracing::warn!(
                    node = %self.id,
                    peer = %collaborator,
                    document = %doc.document_id,
                    error = %e,
                    "delivery failed"
                );
            }
            deliveries.push(Delivery {
                collaborator,
                outcome,
            });
        }

        tracing::info!(
            node = %self.id,
            document = %doc.document_id,
            accepted = deliveries.iter().filter(|d| d.is_accepted()).count(),
            total = deliveries.len(),
            "invoice sent to collaborators"
        );
        Ok(deliveries)
    }

    async fn sign_and_store(&self, mut doc: CoreDocument) -> Result<Invoice> {
        doc.sign(self.id, &self.signing_key)?;
        self.store.put_document(&doc).await?;
        Invoice::unpack_core_document(&doc)
    }
}
