//! # docanchor p2p
//!
//! The document transmit protocol: a sender pushes one document to a
//! collaborator and waits for a verdict.
//!
//! ## Protocol Overview
//!
//! 1. **Request**: [`P2PMessage`] carries the core document and the sender's
//!    deadline.
//! 2. **Pipeline**: the receiver checks, in order, the envelope, identities,
//!    signatures against the identity registry, then stores the document.
//! 3. **Reply**: [`P2PReply::Accepted`] with the receiver's copy (optionally
//!    countersigned), or [`P2PReply::Rejected`] naming the failing stage.
//!
//! ## Properties
//!
//! - **Fail closed**: a document is stored only after every check passed
//! - **Isolated**: each request runs on its own task; a slow registry
//!   lookup for one peer does not delay others
//! - **Bounded**: each request has a deadline; expiry reports the stage that
//!   was running
//! - **Transport-agnostic**: works over any [`Transport`] that authenticates
//!   the sender

pub mod client;
pub mod error;
pub mod messages;
pub mod server;
pub mod transport;

pub use client::P2PClient;
pub use error::{P2PError, Result};
pub use messages::{ErrorCode, P2PMessage, P2PReply, PipelineStage, StageFailure, PROTOCOL_VERSION};
pub use server::{P2PServer, ServerConfig};
pub use transport::memory::{MemoryNetwork, MemoryTransport};
pub use transport::{Inbound, InboundFrame, Transport};
