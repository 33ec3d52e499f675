//! Converge: Convergence Checks for Reconciling Controllers
//!
//! Part of the PAIML Sovereign AI Stack.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use converge::prelude::*;
//!
//! # async fn run() -> converge::core::Result<()> {
//! let harness = ConvergenceHarness::new(HarnessConfig::default())?;
//! harness.await_entries_ready(&["www"]).await?;
//! # Ok(())
//! # }
//! ```

pub use converge_core as core;
pub use converge_probe as probe;
pub use converge_test as test;

/// Prelude module for common imports.
pub mod prelude {
    pub use converge_core::{
        Budget, Clock, ConvergeError, ExpectedState, HarnessConfig, LookupKind, ManualClock,
        Poller, ResourceKind, StateSnapshot, TokioClock,
    };
    pub use converge_probe::{
        DnsResolver, KubectlQuery, ManifestClient, OutputFormat, ResourceQuery, UdpResolver,
    };
    pub use converge_test::{ConvergenceHarness, ConvergenceHarnessBuilder, random_name};
}
