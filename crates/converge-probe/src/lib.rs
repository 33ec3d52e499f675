// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # converge-probe
//!
//! Read-only probes used by convergence checks.
//!
//! This crate provides:
//! - **Resource queries**: the [`ResourceQuery`] capability and a `kubectl`
//!   implementation producing JSON listings or `name=state` projections
//! - **Manifests**: apply/delete of declarative manifest files
//! - **DNS resolution**: the [`DnsResolver`] capability and a UDP resolver
//!   talking to one configured server
//!
//! Checks depend only on the traits, so tests run them against in-memory
//! fakes instead of a cluster or the network.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod dns;
pub mod query;
pub mod wire;

pub use dns::{DnsResolver, UdpResolver};
pub use query::{KubectlQuery, ManifestClient, OutputFormat, ResourceQuery, decode_list};
pub use wire::{RecordType, WireError};
