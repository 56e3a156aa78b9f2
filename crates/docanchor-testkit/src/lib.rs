//! # docanchor testkit
//!
//! Testing utilities for docanchor.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for identities, keys and invoices
//! - **Fixtures**: Participants and in-memory networks of running nodes
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use docanchor::core::EmbeddedModel;
//! use docanchor::InvoiceData;
//! use docanchor_testkit::generators::invoice_data;
//!
//! proptest! {
//!     #[test]
//!     fn payload_round_trips(data in invoice_data()) {
//!         let decoded = InvoiceData::from_payload(&data.to_payload()).unwrap();
//!         prop_assert_eq!(decoded, data);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use docanchor_testkit::fixtures::TestNetwork;
//!
//! # async fn example() {
//! let net = TestNetwork::new();
//! let nodes = net.spawn_nodes(3).await;
//! # }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{sample_payload, TestNetwork, TestNode, TestParticipant};
pub use generators::{cent_id, invoice_data, keypair};
