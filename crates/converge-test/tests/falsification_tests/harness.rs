//! Falsification Tests: Category D - Harness Surface (F041-F050)
//!
//! # Toyota Way: Poka-Yoke (ポカヨケ)
//! Invalid configuration and malformed listings are rejected up front.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use converge_core::{ConvergeError, HarnessConfig, ManualClock, ResourceKind};
use converge_probe::KubectlQuery;
use converge_test::{ConvergenceHarness, random_name};

use super::Rig;

// =============================================================================
// F041-F043: Configuration
// =============================================================================

/// F041: Defaults match the documented budgets
#[test]
fn f041_default_budgets() {
    let rig = Rig::new();
    let config = rig.harness.config();
    assert_eq!(config.await_timeout, Duration::from_secs(30), "F041 FALSIFIED");
    assert_eq!(config.lookup_timeout, Duration::from_secs(420), "F041 FALSIFIED");
    assert_eq!(config.polling_period, Duration::from_millis(200), "F041 FALSIFIED");
}

/// F042: Injected tiny budgets are honored end to end
#[tokio::test]
async fn f042_tiny_budget_from_toml() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(
        file,
        "await_timeout = \"50ms\"\npolling_period = \"10ms\"\nlookup_timeout = \"100ms\"\nnamespace = \"dns-test\""
    )
    .expect("write");
    let config = HarnessConfig::load(file.path()).expect("load");
    let rig = Rig::with_config(config);
    rig.query.push_states("dnse", "a=Pending");

    let _ = rig.harness.await_entries_ready(&["a"]).await;
    assert_eq!(rig.clock.elapsed(), Duration::from_millis(50), "F042 FALSIFIED");
    assert_eq!(rig.query.calls(), 5);
}

/// F043: Invalid budgets are rejected at build time
#[test]
fn f043_invalid_config_rejected() {
    let zero_period = HarnessConfig {
        polling_period: Duration::ZERO,
        ..HarnessConfig::default()
    };
    let period_too_long = HarnessConfig {
        await_timeout: Duration::from_millis(10),
        ..HarnessConfig::default()
    };
    for config in [zero_period, period_too_long] {
        let result = ConvergenceHarness::builder()
            .with_config(config)
            .with_clock(Arc::new(ManualClock::new()))
            .build();
        assert!(
            matches!(result, Err(ConvergeError::Config(_))),
            "F043 FALSIFIED: invalid config accepted"
        );
    }
}

// =============================================================================
// F044-F046: Manifests
// =============================================================================

/// F044: Apply then delete goes through the manifest client
#[tokio::test]
async fn f044_manifest_round_trip() {
    let rig = Rig::new();
    rig.harness
        .apply_manifest("testdata/entries.yaml")
        .await
        .expect("apply");
    rig.harness
        .delete_manifest(PathBuf::from("testdata/entries.yaml"))
        .await
        .expect("delete");

    assert_eq!(
        rig.manifests.applied(),
        vec![PathBuf::from("testdata/entries.yaml")]
    );
    assert_eq!(
        rig.manifests.deleted(),
        vec![PathBuf::from("testdata/entries.yaml")]
    );
}

/// F045: A failing apply surfaces the command error
#[tokio::test]
async fn f045_apply_failure_surfaces() {
    let rig = Rig::new();
    rig.manifests
        .fail_with("error validating data: unknown field \"dnsNames\"");

    let err = rig
        .harness
        .apply_manifest("bad.yaml")
        .await
        .expect_err("apply must fail");
    assert!(err.is_probe_error(), "F045 FALSIFIED: {err}");
    assert!(err.to_string().contains("unknown field"), "F045 FALSIFIED: {err}");
    assert!(rig.manifests.applied().is_empty());
}

/// F046: Quiet mode still applies manifests
#[tokio::test]
async fn f046_quiet_mode() {
    let rig = Rig::with_config(HarnessConfig {
        verbose: false,
        ..HarnessConfig::default()
    });
    rig.harness.log_verbose("not shown");
    rig.harness.apply_manifest("a.yaml").await.expect("apply");
    assert_eq!(rig.manifests.applied().len(), 1, "F046 FALSIFIED");
}

// =============================================================================
// F047-F049: Listings
// =============================================================================

/// F047: Listings are keyed by resource name
#[tokio::test]
async fn f047_list_entries_by_name() {
    let rig = Rig::new();
    rig.query.push_json(
        "dnse",
        r#"{
            "apiVersion": "v1",
            "kind": "List",
            "items": [
                {"metadata": {"name": "www"}, "spec": {"dnsName": "www.example.com"}},
                {"metadata": {"name": "api"}, "spec": {"dnsName": "api.example.com"}}
            ]
        }"#,
    );

    let entries = rig.harness.list_entries().await.expect("list");
    let names: Vec<&str> = entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["api", "www"], "F047 FALSIFIED");
    assert_eq!(entries["www"]["spec"]["dnsName"], "www.example.com");
}

/// F048: A non-List document is a hard error
#[tokio::test]
async fn f048_non_list_rejected() {
    let rig = Rig::new();
    rig.query
        .push_json("dnspr", r#"{"kind": "DNSProvider", "metadata": {"name": "p"}}"#);

    let err = rig
        .harness
        .list_items(&ResourceKind::provider())
        .await
        .expect_err("not a list");
    assert!(
        matches!(err, ConvergeError::Decode(_)),
        "F048 FALSIFIED: {err}"
    );
}

/// F049: Non-JSON command output is a decode error
#[cfg(unix)]
#[tokio::test]
async fn f049_non_json_output_rejected() {
    let kubectl = Arc::new(KubectlQuery::with_binary("echo", "default"));
    let harness = ConvergenceHarness::builder()
        .with_query(kubectl)
        .with_clock(Arc::new(ManualClock::new()))
        .build()
        .expect("valid config");

    let err = harness.list_entries().await.expect_err("echo is not JSON");
    assert!(
        matches!(err, ConvergeError::Decode(_)),
        "F049 FALSIFIED: {err}"
    );
}

// =============================================================================
// F050: Random Names
// =============================================================================

/// F050: Random names are valid DNS labels and do not repeat
#[test]
fn f050_random_names() {
    converge_test::logging::init();
    let names: Vec<String> = (0..100).map(|_| random_name(10)).collect();
    for name in &names {
        assert_eq!(name.len(), 10);
        assert!(
            name.bytes().all(|b| b.is_ascii_lowercase()),
            "F050 FALSIFIED: {name}"
        );
    }
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len(), "F050 FALSIFIED: repeated name");
}
