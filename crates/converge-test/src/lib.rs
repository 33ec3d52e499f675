// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # converge-test
//!
//! Convergence harness for functional tests of reconciling controllers.
//!
//! This crate provides:
//! - **Test harness**: state checks for `dnspr`/`dnse` resources, where
//!   "deleted" means absent, and DNS lookup checks with order-independent
//!   comparison
//! - **Manifest helpers**: apply/delete and JSON listings
//! - **Test doubles**: scripted resource store, resolver and manifest client
//! - **Falsification tests**: Popperian tests for every convergence claim
//!
//! ## Iron Lotus Framework
//!
//! - **Genchi Genbutsu** (現地現物): every poll observes the live store
//! - **Jidoka** (自働化): a check that does not converge fails loudly with
//!   the resource names and the last probe error
//!
//! ## Example
//!
//! ```rust,ignore
//! use converge_test::{ConvergenceHarness, HarnessConfig};
//!
//! let harness = ConvergenceHarness::new(HarnessConfig::with_dns_server("10.0.0.10"))?;
//! harness.apply_manifest("entries.yaml").await?;
//! harness.await_entries_ready(&["a", "b"]).await?;
//! if harness.can_lookup(false) {
//!     harness.await_lookup("a.example.com", &["1.2.3.4"]).await?;
//! }
//! harness.delete_manifest("entries.yaml").await?;
//! harness.await_entries_deleted(&["a", "b"]).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod harness;
pub mod logging;
pub mod mocks;
pub mod names;

pub use converge_core::{ConvergeError, ExpectedState, HarnessConfig, ResourceKind, Result};
pub use harness::{ConvergenceHarness, ConvergenceHarnessBuilder};
pub use mocks::{RecordingManifests, Reply, ScriptedQuery, ScriptedResolver};
pub use names::random_name;
