//! Popperian Falsification Tests for Converge
//!
//! - F001-F010: convergence engine
//! - F011-F025: resource state checks
//! - F026-F040: DNS lookup checks
//! - F041-F050: harness surface (config, manifests, listings)

// Allow test-specific patterns that are denied in production code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::needless_borrows_for_generic_args)]

mod engine;
mod harness;

use std::sync::Arc;

use converge_core::{HarnessConfig, ManualClock};
use converge_test::{ConvergenceHarness, RecordingManifests, ScriptedQuery, ScriptedResolver};

/// Harness wired to scripted collaborators on a simulated clock.
pub struct Rig {
    pub harness: ConvergenceHarness,
    pub query: Arc<ScriptedQuery>,
    pub resolver: Arc<ScriptedResolver>,
    pub manifests: Arc<RecordingManifests>,
    pub clock: Arc<ManualClock>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    pub fn with_config(config: HarnessConfig) -> Self {
        let query = Arc::new(ScriptedQuery::new());
        let resolver = Arc::new(ScriptedResolver::new());
        let manifests = Arc::new(RecordingManifests::new());
        let clock = Arc::new(ManualClock::new());
        let harness = ConvergenceHarness::builder()
            .with_config(config)
            .with_query(query.clone())
            .with_resolver(resolver.clone())
            .with_manifests(manifests.clone())
            .with_clock(clock.clone())
            .build()
            .expect("valid config");
        Self {
            harness,
            query,
            resolver,
            manifests,
            clock,
        }
    }
}
