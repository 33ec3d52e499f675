// Examples are allowed to use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Converge Example
//!
//! Applies a manifest of DNS entries, waits until they are ready, checks
//! their DNS names, then deletes them again and waits for them to vanish.
//!
//! # Usage
//!
//! ```bash
//! # Against the cluster of the current kubectl context
//! cargo run --example converge -- --config converge.toml entries.yaml www api
//!
//! # Without a cluster: scripted store and resolver on a simulated clock
//! cargo run --example converge -- --simulate
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use converge::prelude::*;
use converge::test::{RecordingManifests, ScriptedQuery, ScriptedResolver};
use tracing::info;

struct Args {
    config: Option<PathBuf>,
    simulate: bool,
    manifest: PathBuf,
    entries: Vec<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        simulate: false,
        manifest: PathBuf::from("entries.yaml"),
        entries: Vec::new(),
    };
    let mut positional = Vec::new();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--simulate" => args.simulate = true,
            "--config" => args.config = iter.next().map(PathBuf::from),
            _ => positional.push(arg),
        }
    }
    let mut positional = positional.into_iter();
    if let Some(manifest) = positional.next() {
        args.manifest = PathBuf::from(manifest);
    }
    args.entries = positional.collect();
    args
}

fn simulated_harness(entries: &[String]) -> ConvergenceHarness {
    let query = Arc::new(ScriptedQuery::new());
    let pending: String = entries.iter().map(|e| format!("{e}=Pending\n")).collect();
    let ready: String = entries.iter().map(|e| format!("{e}=Ready\n")).collect();
    query
        .push_states("dnse", pending)
        .push_states("dnse", ready)
        .push_states("dnse", "");

    let resolver = Arc::new(ScriptedResolver::new());
    for entry in entries {
        resolver.push_host(&format!("{entry}.example.com"), &["192.0.2.10"]);
    }

    ConvergenceHarness::builder()
        .with_config(HarnessConfig::with_dns_server("192.0.2.53"))
        .with_query(query)
        .with_resolver(resolver)
        .with_manifests(Arc::new(RecordingManifests::new()))
        .with_clock(Arc::new(ManualClock::new()))
        .build()
        .expect("valid config")
}

#[tokio::main]
async fn main() -> converge::core::Result<()> {
    converge::test::logging::init();

    let mut args = parse_args();
    if args.entries.is_empty() {
        args.entries = vec![random_name(8), random_name(8)];
    }

    let harness = if args.simulate {
        simulated_harness(&args.entries)
    } else {
        let config = match &args.config {
            Some(path) => HarnessConfig::load(path)?,
            None => HarnessConfig::default(),
        };
        ConvergenceHarness::new(config)?
    };
    info!(entries = ?args.entries, manifest = %args.manifest.display(), "starting");

    harness.apply_manifest(&args.manifest).await?;
    harness.await_entries_ready(&args.entries).await?;
    info!("entries ready");

    if harness.can_lookup(false) {
        for entry in &args.entries {
            harness
                .await_lookup(&format!("{entry}.example.com"), &["192.0.2.10"])
                .await?;
        }
        info!("DNS names resolve");
    } else {
        info!("no DNS server configured, skipping lookups");
    }

    harness.delete_manifest(&args.manifest).await?;
    harness.await_entries_deleted(&args.entries).await?;
    info!("entries deleted");
    Ok(())
}
