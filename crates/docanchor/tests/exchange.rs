//! End-to-end invoice exchange between nodes on an in-memory network.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use docanchor::core::{CentId, Curve, KeyPurpose, Keypair};
use docanchor::identity::{IdentityConfig, IdentityService, MemoryRegistry, MemoryRegistryConfig};
use docanchor::p2p::{ErrorCode, Inbound, MemoryNetwork, MemoryTransport, P2PError, PipelineStage};
use docanchor::store::{DocumentStore, MemoryStore, SqliteStore};
use docanchor::{Invoice, InvoiceClientData, InvoiceCreatePayload, Node, NodeConfig};

type MemNode = Node<MemoryStore, MemoryRegistry, MemoryTransport>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn registry() -> Arc<MemoryRegistry> {
    Arc::new(MemoryRegistry::new(MemoryRegistryConfig {
        confirmation_delay: Duration::from_millis(5),
        lookup_latency: Duration::ZERO,
    }))
}

async fn spawn_node(network: &Arc<MemoryNetwork>, registry: &Arc<MemoryRegistry>) -> MemNode {
    let id = CentId::random();
    let key = Keypair::generate(Curve::Secp256k1);
    registry.insert_confirmed(id, [(KeyPurpose::Signing, key.public_key())]);

    let (transport, inbound) = network.connect(id).await;
    let node = Node::new(
        id,
        key,
        Arc::new(MemoryStore::opened()),
        registry.clone(),
        transport,
        NodeConfig::default(),
    );
    node.serve(inbound);
    node
}

fn payload(number: &str, gross_amount: i64, collaborators: &[CentId]) -> InvoiceCreatePayload {
    InvoiceCreatePayload {
        data: InvoiceClientData {
            invoice_number: number.into(),
            invoice_status: "unpaid".into(),
            sender_name: "Alice Ltd".into(),
            recipient_name: "Bob GmbH".into(),
            currency: "EUR".into(),
            gross_amount,
            net_amount: gross_amount,
            extra_data: "0x0102".into(),
            ..Default::default()
        },
        collaborators: collaborators.iter().map(CentId::to_hex).collect(),
    }
}

fn rejection(
    outcome: &std::result::Result<docanchor::CoreDocument, P2PError>,
) -> (PipelineStage, ErrorCode) {
    match outcome {
        Err(P2PError::Rejected(failure)) => (failure.stage, failure.code),
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_round_trip_between_collaborators() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let registry = registry();
    let alice = spawn_node(&network, &registry).await;
    let bob = spawn_node(&network, &registry).await;

    // Alice creates and pushes the first version
    let v1 = alice
        .create_invoice(&payload("INV-1", 1000, &[alice.id(), bob.id()]))
        .await?;
    let id = v1.core_document().map(|d| d.document_id).expect("packed");
    let deliveries = alice.send_to_collaborators(&v1).await?;
    assert_eq!(deliveries.len(), 1);

    // Bob's reply copy carries both signatures
    let reply = deliveries[0].outcome.as_ref().expect("accepted");
    assert!(reply.signature_by(&alice.id()).is_some());
    assert!(reply.signature_by(&bob.id()).is_some());

    let at_bob = bob.get_invoice(&id).await?;
    assert_eq!(at_bob.data, v1.data);
    assert_eq!(at_bob.collaborators, vec![alice.id(), bob.id()]);

    // Bob amends it and pushes the next version back
    let v2 = bob
        .update_invoice(&id, &payload("INV-1", 1200, &[alice.id(), bob.id()]))
        .await?;
    let deliveries = bob.send_to_collaborators(&v2).await?;
    assert!(deliveries.iter().all(|d| d.is_accepted()));

    let at_alice = alice.get_invoice(&id).await?;
    assert_eq!(at_alice.data.gross_amount, 1200);
    assert_eq!(
        at_alice.core_document().and_then(|d| d.previous_version),
        v1.core_document().map(|d| d.current_version)
    );
    Ok(())
}

#[tokio::test]
async fn test_tampered_payload_is_rejected() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let registry = registry();
    let alice = spawn_node(&network, &registry).await;
    let bob = spawn_node(&network, &registry).await;

    let invoice = alice
        .create_invoice(&payload("INV-2", 500, &[bob.id()]))
        .await?;

    // Swap in the payload of a different invoice without re-signing
    let mut forged = Invoice::from_client_payload(&payload("INV-2", 5, &[bob.id()]))?;
    let forged_doc = forged.pack_core_document()?;
    let mut doc = invoice.core_document().cloned().expect("packed");
    doc.embedded_data = forged_doc.embedded_data;
    doc.field_salts = forged_doc.field_salts;
    let tampered = Invoice::unpack_core_document(&doc)?;

    let deliveries = alice.send_to_collaborators(&tampered).await?;
    assert_eq!(
        rejection(&deliveries[0].outcome),
        (PipelineStage::Signature, ErrorCode::SignatureVerification)
    );
    assert!(bob.get_invoice(&doc.document_id).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_tampered_signature_is_rejected_not_dropped() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let registry = registry();
    let alice = spawn_node(&network, &registry).await;
    let bob = spawn_node(&network, &registry).await;

    let invoice = alice
        .create_invoice(&payload("INV-7", 640, &[bob.id()]))
        .await?;
    let mut doc = invoice.core_document().cloned().expect("packed");
    let last = doc.signatures[0].signature.len() - 1;
    doc.signatures[0].signature[last] ^= 0xff;
    let tampered = Invoice::unpack_core_document(&doc)?;

    // The peer answers with a rejection; the exchange itself succeeds
    let deliveries = alice.send_to_collaborators(&tampered).await?;
    assert_eq!(
        rejection(&deliveries[0].outcome),
        (PipelineStage::Signature, ErrorCode::SignatureVerification)
    );
    assert!(bob.get_invoice(&doc.document_id).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_forked_version_is_rejected() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let registry = registry();
    let alice = spawn_node(&network, &registry).await;
    let bob = spawn_node(&network, &registry).await;

    let v1 = alice
        .create_invoice(&payload("INV-3", 100, &[alice.id(), bob.id()]))
        .await?;
    let id = v1.core_document().map(|d| d.document_id).expect("packed");
    alice.send_to_collaborators(&v1).await?;

    // Both sides derive a different second version from v1
    let bobs = bob
        .update_invoice(&id, &payload("INV-3", 200, &[alice.id(), bob.id()]))
        .await?;
    let alices = alice
        .update_invoice(&id, &payload("INV-3", 300, &[alice.id(), bob.id()]))
        .await?;

    let deliveries = alice.send_to_collaborators(&alices).await?;
    assert_eq!(
        rejection(&deliveries[0].outcome),
        (PipelineStage::Persistence, ErrorCode::Storage)
    );

    // Bob's head is unchanged
    let head = bob.get_invoice(&id).await?;
    assert_eq!(head.data.gross_amount, 200);
    assert_eq!(head.core_document(), bobs.core_document());
    Ok(())
}

#[tokio::test]
async fn test_resend_is_idempotent() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let registry = registry();
    let alice = spawn_node(&network, &registry).await;
    let bob = spawn_node(&network, &registry).await;

    let invoice = alice
        .create_invoice(&payload("INV-4", 42, &[bob.id()]))
        .await?;
    for _ in 0..2 {
        let deliveries = alice.send_to_collaborators(&invoice).await?;
        assert!(deliveries[0].is_accepted());
    }
    Ok(())
}

#[tokio::test]
async fn test_unreachable_collaborator_is_reported() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let registry = registry();
    let alice = spawn_node(&network, &registry).await;
    let bob = spawn_node(&network, &registry).await;
    let offline = CentId::random();

    let invoice = alice
        .create_invoice(&payload("INV-5", 7, &[offline, bob.id()]))
        .await?;
    let deliveries = alice.send_to_collaborators(&invoice).await?;

    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].collaborator, offline);
    assert!(matches!(
        deliveries[0].outcome,
        Err(P2PError::PeerNotConnected(id)) if id == offline
    ));
    assert!(deliveries[1].is_accepted());
    Ok(())
}

async fn provisioned_node(
    dir: &std::path::Path,
    network: &Arc<MemoryNetwork>,
    registry: &Arc<MemoryRegistry>,
) -> Result<(Node<SqliteStore, MemoryRegistry, MemoryTransport>, Inbound)> {
    let mut config = IdentityConfig::with_key_dir(dir.join("keys"));
    config.confirmation_timeout = Duration::from_secs(2);
    std::fs::create_dir_all(dir.join("keys"))?;

    let mut service = IdentityService::new(config, registry.clone());
    service.create_identity(None).await?;
    service.generate_keys(KeyPurpose::Signing)?;
    service.add_key_from_config(KeyPurpose::Signing).await?;

    let store = Arc::new(SqliteStore::new(dir.join("documents.db")));
    store.open().await?;

    let (transport, inbound) = network.connect(service.config().cent_id()?).await;
    let node = Node::from_identity(&service, store, transport, NodeConfig::default())?;
    Ok((node, inbound))
}

#[tokio::test]
async fn test_provisioned_nodes_exchange() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let registry = registry();
    let alice_dir = tempfile::tempdir()?;
    let bob_dir = tempfile::tempdir()?;

    let (alice, _alice_inbound) = provisioned_node(alice_dir.path(), &network, &registry).await?;
    let (bob, bob_inbound) = provisioned_node(bob_dir.path(), &network, &registry).await?;
    bob.serve(bob_inbound);

    let invoice = alice
        .create_invoice(&payload("INV-6", 900, &[bob.id()]))
        .await?;
    let deliveries = alice.send_to_collaborators(&invoice).await?;
    assert!(deliveries[0].is_accepted());

    let id = invoice.core_document().map(|d| d.document_id).expect("packed");
    let stored = bob.get_invoice(&id).await?;
    assert_eq!(stored.data.invoice_number, "INV-6");
    assert_eq!(stored.to_client_payload().data.extra_data, "0102");
    Ok(())
}
