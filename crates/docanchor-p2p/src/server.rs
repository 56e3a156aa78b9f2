//! The receiving side of the transmit protocol.
//!
//! Every inbound document runs through a fixed pipeline. The first failing
//! stage turns into a `Rejected` reply; the connection itself is never torn
//! down over a bad document.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docanchor_core::{
    validate_envelope, validate_identities, verify_signature, CentId, CoreDocument,
    CoreDocumentWire, KeyPurpose, Keypair, TypeRegistry,
};
use docanchor_identity::IdentityRegistry;
use docanchor_store::{DocumentStore, PutResult};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::messages::{ErrorCode, P2PMessage, P2PReply, PipelineStage, StageFailure};
use crate::transport::{Inbound, InboundFrame};

/// Configuration for the receive pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Upper bound on any request's deadline.
    pub max_request_timeout: Duration,
    /// Reject documents the sender has not signed.
    pub require_sender_signature: bool,
    /// Add our own signature to the accepted copy.
    pub sign_on_accept: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_request_timeout: Duration::from_secs(30),
            require_sender_signature: true,
            sign_on_accept: true,
        }
    }
}

/// Handles inbound transmit requests.
pub struct P2PServer<S, R> {
    local_id: CentId,
    signing_key: Option<Keypair>,
    store: Arc<S>,
    registry: Arc<R>,
    types: TypeRegistry,
    config: ServerConfig,
}

impl<S, R> P2PServer<S, R>
where
    S: DocumentStore + 'static,
    R: IdentityRegistry + 'static,
{
    pub fn new(
        local_id: CentId,
        store: Arc<S>,
        registry: Arc<R>,
        types: TypeRegistry,
        config: ServerConfig,
    ) -> Self {
        Self {
            local_id,
            signing_key: None,
            store,
            registry,
            types,
            config,
        }
    }

    /// Key used to countersign accepted documents.
    pub fn with_signing_key(mut self, keypair: Keypair) -> Self {
        self.signing_key = Some(keypair);
        self
    }

    pub fn local_id(&self) -> CentId {
        self.local_id
    }

    /// Serve requests until the inbound stream closes. Each request runs on
    /// its own task.
    pub async fn serve(self: Arc<Self>, mut inbound: Inbound) {
        while let Some(request) = inbound.recv().await {
            let server = Arc::clone(&self);
            tokio::spawn(async move { server.answer(request).await });
        }
        tracing::debug!(node = %self.local_id, "inbound stream closed");
    }

    /// Spawn [`serve`](Self::serve) in the background.
    pub fn spawn(self: Arc<Self>, inbound: Inbound) -> JoinHandle<()> {
        tokio::spawn(self.serve(inbound))
    }

    async fn answer(&self, request: InboundFrame) {
        let from = request.from;
        let reply = self.handle_frame(from, &request.frame).await;
        if !request.respond(reply) {
            tracing::debug!(peer = %from, "requester stopped waiting for reply");
        }
    }

    /// Decode one request frame and run it. Always yields a reply frame.
    pub async fn handle_frame(&self, from: CentId, frame: &[u8]) -> Vec<u8> {
        let reply = match P2PMessage::decode(frame) {
            Ok(msg) => self.handle_transmit(from, msg).await,
            Err(e) => {
                tracing::warn!(peer = %from, error = %e, "undecodable transmit request");
                P2PReply::rejected(
                    PipelineStage::Envelope,
                    ErrorCode::MalformedEnvelope,
                    e.to_string(),
                )
            }
        };
        reply.encode()
    }

    /// Run the receive pipeline for a document sent by `from`.
    ///
    /// The deadline is the smaller of the requested timeout and the server
    /// maximum; a zero timeout means the server maximum.
    pub async fn handle_transmit(&self, from: CentId, msg: P2PMessage) -> P2PReply {
        let deadline = if msg.timeout.is_zero() {
            self.config.max_request_timeout
        } else {
            msg.timeout.min(self.config.max_request_timeout)
        };
        let stage = AtomicU8::new(PipelineStage::Envelope.to_u8());

        let outcome =
            tokio::time::timeout(deadline, self.run_pipeline(from, msg.document, &stage)).await;

        match outcome {
            Ok(Ok(doc)) => {
                tracing::info!(
                    peer = %from,
                    document = %doc.document_id,
                    version = %doc.current_version,
                    "document accepted"
                );
                P2PReply::Accepted(doc)
            }
            Ok(Err(failure)) => {
                tracing::warn!(
                    peer = %from,
                    stage = %failure.stage,
                    code = ?failure.code,
                    "document rejected: {}",
                    failure.message
                );
                P2PReply::Rejected(failure)
            }
            Err(_) => {
                let stage = PipelineStage::from_u8(stage.load(Ordering::SeqCst))
                    .unwrap_or(PipelineStage::Envelope);
                tracing::warn!(peer = %from, %stage, ?deadline, "transmit deadline exceeded");
                P2PReply::rejected(
                    stage,
                    ErrorCode::DeadlineExceeded,
                    format!("deadline of {:?} exceeded", deadline),
                )
            }
        }
    }

    async fn run_pipeline(
        &self,
        from: CentId,
        wire: CoreDocumentWire,
        stage: &AtomicU8,
    ) -> Result<CoreDocument, StageFailure> {
        let enter = |s: PipelineStage| stage.store(s.to_u8(), Ordering::SeqCst);

        // 1. Envelope: known type, decodable payload
        enter(PipelineStage::Envelope);
        validate_envelope(&wire, &self.types)
            .map_err(|e| StageFailure::from_core(PipelineStage::Envelope, &e))?;

        // 2. Identity: every id has its fixed width
        enter(PipelineStage::Identity);
        let mut doc = validate_identities(wire)
            .map_err(|e| StageFailure::from_core(PipelineStage::Identity, &e))?;

        // 3. Signatures against the registry
        enter(PipelineStage::Signature);
        self.check_signatures(from, &doc).await?;

        // 4. Persist
        enter(PipelineStage::Persistence);
        let stored = self.store.put_document(&doc).await.map_err(|e| {
            StageFailure::new(PipelineStage::Persistence, ErrorCode::Storage, e.to_string())
        })?;
        if stored == PutResult::AlreadyExists {
            tracing::debug!(document = %doc.document_id, "version already stored");
        }

        // 5. Accepted copy
        enter(PipelineStage::Reply);
        if self.config.sign_on_accept {
            if let Some(keypair) = &self.signing_key {
                doc.sign(self.local_id, keypair)
                    .map_err(|e| StageFailure::from_core(PipelineStage::Reply, &e))?;
            }
        }

        Ok(doc)
    }

    async fn check_signatures(&self, from: CentId, doc: &CoreDocument) -> Result<(), StageFailure> {
        let reject = |message: String| {
            StageFailure::new(
                PipelineStage::Signature,
                ErrorCode::SignatureVerification,
                message,
            )
        };

        if doc.signatures.is_empty() {
            return Err(reject("document carries no signatures".into()));
        }
        if self.config.require_sender_signature && doc.signature_by(&from).is_none() {
            return Err(reject(format!("sender {} has not signed the document", from)));
        }

        for signature in &doc.signatures {
            let registered = self
                .registry
                .is_key_valid(&signature.signer, KeyPurpose::Signing, &signature.public_key)
                .await
                .map_err(|e| {
                    StageFailure::new(PipelineStage::Signature, ErrorCode::Registry, e.to_string())
                })?;
            if !registered {
                return Err(reject(format!(
                    "key of {} is not a registered signing key",
                    signature.signer
                )));
            }

            verify_signature(doc, signature, &signature.public_key)
                .map_err(|e| StageFailure::from_core(PipelineStage::Signature, &e))?;
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::Memo;
    use super::*;
    use docanchor_core::{pack_core_document, Curve, EmbeddedModel};
    use docanchor_identity::MemoryRegistry;
    use docanchor_store::MemoryStore;

    struct Fixture {
        server: P2PServer<MemoryStore, MemoryRegistry>,
        registry: Arc<MemoryRegistry>,
        store: Arc<MemoryStore>,
        sender: CentId,
        sender_key: Keypair,
    }

    fn fixture(config: ServerConfig) -> Fixture {
        let registry = Arc::new(MemoryRegistry::default());
        let store = Arc::new(MemoryStore::opened());

        let receiver = CentId::random();
        let receiver_key = Keypair::generate(Curve::Secp256k1);
        registry.insert_confirmed(receiver, [(KeyPurpose::Signing, receiver_key.public_key())]);

        let sender = CentId::random();
        let sender_key = Keypair::generate(Curve::Secp256k1);
        registry.insert_confirmed(sender, [(KeyPurpose::Signing, sender_key.public_key())]);

        let server = P2PServer::new(
            receiver,
            store.clone(),
            registry.clone(),
            TypeRegistry::new().with::<Memo>(),
            config,
        )
        .with_signing_key(receiver_key);

        Fixture {
            server,
            registry,
            store,
            sender,
            sender_key,
        }
    }

    fn signed_memo(f: &Fixture) -> CoreDocument {
        let memo = Memo {
            text: "ship it".into(),
        };
        let mut doc = pack_core_document(&memo, &[f.server.local_id()], None).unwrap();
        doc.sign(f.sender, &f.sender_key).unwrap();
        doc
    }

    fn request(doc: &CoreDocument) -> P2PMessage {
        P2PMessage::new(doc, Duration::from_secs(5))
    }

    fn rejection(reply: P2PReply) -> StageFailure {
        match reply {
            P2PReply::Rejected(failure) => failure,
            P2PReply::Accepted(doc) => panic!("expected rejection, got {:?}", doc.document_id),
        }
    }

    #[tokio::test]
    async fn test_accepts_and_countersigns() {
        let f = fixture(ServerConfig::default());
        let doc = signed_memo(&f);

        let reply = f.server.handle_transmit(f.sender, request(&doc)).await;
        let P2PReply::Accepted(accepted) = reply else {
            panic!("expected acceptance");
        };

        assert_eq!(accepted.document_id, doc.document_id);
        assert!(accepted.signature_by(&f.sender).is_some());
        assert!(accepted.signature_by(&f.server.local_id()).is_some());

        let stored = f.store.get_document(&doc.document_id).await.unwrap();
        assert_eq!(stored, doc);
    }

    #[tokio::test]
    async fn test_unknown_type_rejected_at_envelope() {
        let f = fixture(ServerConfig::default());
        let mut doc = signed_memo(&f);
        doc.embedded_type = "docanchor.test.Unknown".into();

        let failure = rejection(f.server.handle_transmit(f.sender, request(&doc)).await);
        assert_eq!(failure.stage, PipelineStage::Envelope);
        assert_eq!(failure.code, ErrorCode::UnrecognizedType);
    }

    #[tokio::test]
    async fn test_short_collaborator_rejected_at_identity() {
        let f = fixture(ServerConfig::default());
        let doc = signed_memo(&f);
        let mut msg = request(&doc);
        msg.document.collaborators.push(vec![1, 2, 3, 4, 5]);

        let failure = rejection(f.server.handle_transmit(f.sender, msg).await);
        assert_eq!(failure.stage, PipelineStage::Identity);
        assert_eq!(failure.code, ErrorCode::InvalidLength);
    }

    #[tokio::test]
    async fn test_unsigned_document_rejected() {
        let f = fixture(ServerConfig::default());
        let mut doc = signed_memo(&f);
        doc.signatures.clear();

        let failure = rejection(f.server.handle_transmit(f.sender, request(&doc)).await);
        assert_eq!(failure.stage, PipelineStage::Signature);
        assert_eq!(failure.code, ErrorCode::SignatureVerification);
    }

    #[tokio::test]
    async fn test_sender_must_have_signed() {
        let f = fixture(ServerConfig::default());
        let doc = signed_memo(&f);
        let impostor = CentId::random();

        let failure = rejection(f.server.handle_transmit(impostor, request(&doc)).await);
        assert_eq!(failure.stage, PipelineStage::Signature);

        let lenient = fixture(ServerConfig {
            require_sender_signature: false,
            ..Default::default()
        });
        let doc = signed_memo(&lenient);
        let reply = lenient.server.handle_transmit(impostor, request(&doc)).await;
        assert!(matches!(reply, P2PReply::Accepted(_)));
    }

    #[tokio::test]
    async fn test_tampered_payload_fails_verification() {
        let f = fixture(ServerConfig::default());
        let mut doc = signed_memo(&f);
        doc.embedded_data = Memo {
            text: "ship it later".into(),
        }
        .to_payload()
        .into();

        let failure = rejection(f.server.handle_transmit(f.sender, request(&doc)).await);
        assert_eq!(failure.stage, PipelineStage::Signature);
        assert_eq!(failure.code, ErrorCode::SignatureVerification);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_tampered_signature_byte_fails_verification() {
        let f = fixture(ServerConfig::default());
        let mut doc = signed_memo(&f);
        let last = doc.signatures[0].signature.len() - 1;
        doc.signatures[0].signature[last] ^= 0xff;

        let failure = rejection(f.server.handle_transmit(f.sender, request(&doc)).await);
        assert_eq!(failure.stage, PipelineStage::Signature);
        assert_eq!(failure.code, ErrorCode::SignatureVerification);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_revoked_key_rejected() {
        let f = fixture(ServerConfig::default());
        let doc = signed_memo(&f);
        f.registry
            .revoke_key(&f.sender, KeyPurpose::Signing, &f.sender_key.public_key())
            .await
            .unwrap();

        let failure = rejection(f.server.handle_transmit(f.sender, request(&doc)).await);
        assert_eq!(failure.stage, PipelineStage::Signature);
    }

    #[tokio::test]
    async fn test_unknown_signer_is_registry_failure() {
        let f = fixture(ServerConfig {
            require_sender_signature: false,
            ..Default::default()
        });
        let mut doc = signed_memo(&f);
        doc.sign(CentId::random(), &Keypair::generate(Curve::Secp256k1))
            .unwrap();

        let failure = rejection(f.server.handle_transmit(f.sender, request(&doc)).await);
        assert_eq!(failure.stage, PipelineStage::Signature);
        assert_eq!(failure.code, ErrorCode::Registry);
    }

    #[tokio::test]
    async fn test_stale_version_rejected_at_persistence() {
        let f = fixture(ServerConfig::default());
        let doc = signed_memo(&f);
        assert!(matches!(
            f.server.handle_transmit(f.sender, request(&doc)).await,
            P2PReply::Accepted(_)
        ));

        let mut fork = doc.clone();
        fork.current_version = docanchor_core::VersionId::random();
        fork.signatures.clear();
        fork.sign(f.sender, &f.sender_key).unwrap();

        let failure = rejection(f.server.handle_transmit(f.sender, request(&fork)).await);
        assert_eq!(failure.stage, PipelineStage::Persistence);
        assert_eq!(failure.code, ErrorCode::Storage);
    }

    #[tokio::test]
    async fn test_deadline_reports_running_stage() {
        let f = fixture(ServerConfig::default());
        f.registry.set_lookup_latency(f.sender, Duration::from_secs(5));
        let doc = signed_memo(&f);

        let msg = P2PMessage::new(&doc, Duration::from_millis(50));
        let failure = rejection(f.server.handle_transmit(f.sender, msg).await);
        assert_eq!(failure.stage, PipelineStage::Signature);
        assert_eq!(failure.code, ErrorCode::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_garbage_frame_gets_reply() {
        let f = fixture(ServerConfig::default());
        let reply = P2PReply::decode(&f.server.handle_frame(f.sender, b"garbage").await).unwrap();
        let failure = rejection(reply);
        assert_eq!(failure.stage, PipelineStage::Envelope);
        assert_eq!(failure.code, ErrorCode::MalformedEnvelope);
    }
}
