//! Transport abstraction for the transmit protocol.
//!
//! A transport delivers one request frame to a peer and returns that peer's
//! reply frame. It is responsible for authenticating peers: the receiver
//! learns who sent a frame from the transport, never from the frame itself.

use std::time::Duration;

use async_trait::async_trait;
use docanchor_core::CentId;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;

/// Request/reply transport.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `frame` to `peer` and wait up to `timeout` for its reply.
    async fn transmit(&self, peer: &CentId, frame: Vec<u8>, timeout: Duration) -> Result<Vec<u8>>;

    /// The local node's identity.
    fn local_id(&self) -> CentId;

    /// Check if a specific peer is reachable.
    async fn is_connected(&self, peer: &CentId) -> bool;
}

/// A request frame delivered to a node, with the authenticated sender.
#[derive(Debug)]
pub struct InboundFrame {
    pub from: CentId,
    pub frame: Vec<u8>,
    reply: oneshot::Sender<Vec<u8>>,
}

impl InboundFrame {
    /// Send the reply frame. Returns `false` if the requester stopped waiting.
    pub fn respond(self, frame: Vec<u8>) -> bool {
        self.reply.send(frame).is_ok()
    }
}

/// Stream of inbound requests for one node.
pub type Inbound = mpsc::Receiver<InboundFrame>;

/// A simple in-memory transport for testing.
///
/// The network itself stamps the sender on every frame, standing in for an
/// authenticated channel.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use crate::error::P2PError;

    /// Inbound queue depth per node.
    const INBOUND_CAPACITY: usize = 1000;

    /// Shared state for the memory transport network.
    #[derive(Default)]
    pub struct MemoryNetwork {
        /// Inbound queue for each node.
        endpoints: RwLock<HashMap<CentId, mpsc::Sender<InboundFrame>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Join the network as `id`.
        pub async fn connect(self: &Arc<Self>, id: CentId) -> (MemoryTransport, Inbound) {
            let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
            self.endpoints.write().await.insert(id, tx);

            let transport = MemoryTransport {
                local: id,
                network: Arc::clone(self),
            };
            (transport, rx)
        }

        /// Remove `id` from the network. Its inbound queue closes.
        pub async fn disconnect(&self, id: &CentId) {
            self.endpoints.write().await.remove(id);
        }
    }

    /// In-memory transport implementation.
    #[derive(Clone)]
    pub struct MemoryTransport {
        local: CentId,
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn transmit(
            &self,
            peer: &CentId,
            frame: Vec<u8>,
            timeout: Duration,
        ) -> Result<Vec<u8>> {
            let sender = self
                .network
                .endpoints
                .read()
                .await
                .get(peer)
                .cloned()
                .ok_or(P2PError::PeerNotConnected(*peer))?;

            let (reply_tx, reply_rx) = oneshot::channel();
            let inbound = InboundFrame {
                from: self.local,
                frame,
                reply: reply_tx,
            };

            let exchange = async {
                sender
                    .send(inbound)
                    .await
                    .map_err(|_| P2PError::PeerNotConnected(*peer))?;
                reply_rx
                    .await
                    .map_err(|_| P2PError::Transport("peer dropped the request".into()))
            };

            match tokio::time::timeout(timeout, exchange).await {
                Ok(result) => result,
                Err(_) => Err(P2PError::Timeout(format!(
                    "no reply from {} within {:?}",
                    peer, timeout
                ))),
            }
        }

        fn local_id(&self) -> CentId {
            self.local
        }

        async fn is_connected(&self, peer: &CentId) -> bool {
            self.network.endpoints.read().await.contains_key(peer)
        }
    }
}
