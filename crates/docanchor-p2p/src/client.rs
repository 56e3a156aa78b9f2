//! The sending side of the transmit protocol.

use std::time::Duration;

use docanchor_core::{CentId, CoreDocument};

use crate::error::{P2PError, Result};
use crate::messages::{P2PMessage, P2PReply};
use crate::transport::Transport;

/// Extra time the transport waits beyond the request deadline, so a
/// deadline rejection from the peer arrives before the local timeout fires.
const REPLY_GRACE: Duration = Duration::from_millis(250);

/// Sends documents to peers.
pub struct P2PClient<T> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> P2PClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            timeout: Duration::from_secs(30),
        }
    }

    /// Deadline requested from peers.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_id(&self) -> CentId {
        self.transport.local_id()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `doc` to `peer` and wait for its verdict.
    ///
    /// Returns the peer's accepted copy, which must carry the same document
    /// id and version. A rejection is [`P2PError::Rejected`] with the failing
    /// stage. No retries.
    pub async fn send_document(&self, peer: &CentId, doc: &CoreDocument) -> Result<CoreDocument> {
        let frame = P2PMessage::new(doc, self.timeout).encode();

        tracing::debug!(peer = %peer, document = %doc.document_id, "transmitting document");
        let reply = self
            .transport
            .transmit(peer, frame, self.timeout + REPLY_GRACE)
            .await?;

        match P2PReply::decode(&reply)? {
            P2PReply::Accepted(copy) => {
                if copy.document_id != doc.document_id
                    || copy.current_version != doc.current_version
                {
                    tracing::warn!(
                        peer = %peer,
                        document = %doc.document_id,
                        "peer acknowledged a different document"
                    );
                    return Err(P2PError::MismatchedReply {
                        expected: format!("{}@{}", doc.document_id, doc.current_version),
                        got: format!("{}@{}", copy.document_id, copy.current_version),
                    });
                }
                Ok(copy)
            }
            P2PReply::Rejected(failure) => {
                tracing::debug!(peer = %peer, %failure, "document rejected by peer");
                Err(P2PError::Rejected(failure))
            }
        }
    }
}
