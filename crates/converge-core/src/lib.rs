// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # converge-core
//!
//! Core primitives for convergence checks against reconciling controllers.
//!
//! This crate provides:
//! - **Polling engine**: bounded retry with a deadline and a fixed period
//! - **State snapshots**: `name=state` parsing and expected-state matching,
//!   where "absent" is a valid terminal state
//! - **Lookup comparison**: order-independent set equality for DNS results
//! - **Configuration**: budgets, namespace and resolver endpoint
//! - **Clock**: injectable time source for simulated waits in tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use converge_core::{Budget, Poller};
//!
//! let poller = Poller::new(Budget::new(Duration::from_secs(30), Duration::from_millis(200)));
//! poller.await_default("service ready", || async { Ok(probe().await?) }).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod lookup;
pub mod poll;
pub mod snapshot;

pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{Budget, HarnessConfig};
pub use error::{ConvergeError, Result};
pub use lookup::{LookupKind, describe_lookup, same_values};
pub use poll::Poller;
pub use snapshot::{ExpectedState, ResourceKind, StateSnapshot, describe_state_check, parse_states};
