//! # docanchor identity
//!
//! Identity registry contract and local identity provisioning.
//!
//! ## Model
//!
//! Every node is identified by a [`CentId`](docanchor_core::CentId). The
//! registry maps it to keys, grouped by [`KeyPurpose`](docanchor_core::KeyPurpose).
//!
//! - Adding a key never removes earlier keys; revocation is explicit.
//! - The current key for a purpose is the latest non-revoked one.
//! - Creating an identity is asynchronous: the registry returns a receipt
//!   immediately and confirms later through a [`PendingConfirmation`].

pub mod config;
pub mod error;
pub mod memory;
pub mod registry;
pub mod service;
pub mod state;

pub use config::{IdentityConfig, KeyPairPaths};
pub use error::{RegistryError, Result};
pub use memory::{MemoryRegistry, MemoryRegistryConfig};
pub use registry::{
    IdentityConfirmation, IdentityRegistry, PendingConfirmation, RegistrationReceipt,
};
pub use service::IdentityService;
pub use state::{KeyRecord, KeyRing};
