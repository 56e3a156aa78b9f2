//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;
use std::time::Duration;

use docanchor::{InvoiceClientData, InvoiceCreatePayload, Node, NodeConfig};
use docanchor_core::{CentId, CoreDocument, Curve, KeyPurpose, Keypair};
use docanchor_identity::{MemoryRegistry, MemoryRegistryConfig};
use docanchor_p2p::{MemoryNetwork, MemoryTransport};
use docanchor_store::MemoryStore;

/// A node backed entirely by in-memory components.
pub type TestNode = Node<MemoryStore, MemoryRegistry, MemoryTransport>;

/// An identity with a signing key.
#[derive(Clone)]
pub struct TestParticipant {
    pub id: CentId,
    pub keypair: Keypair,
}

impl TestParticipant {
    /// A random identity with a fresh secp256k1 signing key.
    pub fn new() -> Self {
        Self {
            id: CentId::random(),
            keypair: Keypair::generate(Curve::Secp256k1),
        }
    }

    /// Sign `doc` as this participant.
    pub fn sign(&self, doc: &mut CoreDocument) -> docanchor_core::Result<()> {
        doc.sign(self.id, &self.keypair)
    }
}

impl Default for TestParticipant {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory network and identity registry shared by test nodes.
pub struct TestNetwork {
    pub network: Arc<MemoryNetwork>,
    pub registry: Arc<MemoryRegistry>,
}

impl TestNetwork {
    /// A network whose registry confirms new identities almost immediately.
    pub fn new() -> Self {
        Self {
            network: MemoryNetwork::new(),
            registry: Arc::new(MemoryRegistry::new(MemoryRegistryConfig {
                confirmation_delay: Duration::from_millis(1),
                lookup_latency: Duration::ZERO,
            })),
        }
    }

    /// Register the participant's signing key as confirmed.
    pub fn register(&self, participant: &TestParticipant) {
        self.registry.insert_confirmed(
            participant.id,
            [(KeyPurpose::Signing, participant.keypair.public_key())],
        );
    }

    /// Register `participant` and start a serving node for it.
    pub async fn spawn_node_for(&self, participant: TestParticipant) -> TestNode {
        self.register(&participant);
        let (transport, inbound) = self.network.connect(participant.id).await;
        let node = Node::new(
            participant.id,
            participant.keypair,
            Arc::new(MemoryStore::opened()),
            self.registry.clone(),
            transport,
            NodeConfig::default(),
        );
        node.serve(inbound);
        node
    }

    /// Start a serving node for a new participant.
    pub async fn spawn_node(&self) -> TestNode {
        self.spawn_node_for(TestParticipant::new()).await
    }

    /// Start `count` serving nodes.
    pub async fn spawn_nodes(&self, count: usize) -> Vec<TestNode> {
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            nodes.push(self.spawn_node().await);
        }
        nodes
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// A filled-in invoice create payload shared between `collaborators`.
pub fn sample_payload(number: &str, collaborators: &[CentId]) -> InvoiceCreatePayload {
    InvoiceCreatePayload {
        data: InvoiceClientData {
            invoice_number: number.into(),
            invoice_status: "unpaid".into(),
            sender_name: "Sender Co".into(),
            recipient_name: "Recipient Co".into(),
            currency: "EUR".into(),
            gross_amount: 119_00,
            net_amount: 100_00,
            tax_amount: 19_00,
            tax_rate: 1900,
            ..Default::default()
        },
        collaborators: collaborators.iter().map(CentId::to_hex).collect(),
    }
}
