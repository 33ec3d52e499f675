//! Falsification Tests: Category A - Convergence Engine (F001-F010)
//!
//! # Toyota Way: Jidoka (自働化)
//! A check that never converges must stop the line, and only the deadline
//! may stop it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use converge_core::{Budget, ConvergeError, ManualClock, Poller};
use proptest::prelude::*;

fn poller(timeout: Duration, period: Duration) -> (Poller, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (Poller::with_clock(Budget::new(timeout, period), clock.clone()), clock)
}

// =============================================================================
// F001-F003: Timeout Lower Bound
// =============================================================================

/// F001: A never-converging check waits at least the whole timeout
///
/// # Falsification Attempt
/// Run an always-false predicate on a 30s budget; if the engine returns
/// before 30s of simulated time, the claim is falsified.
#[tokio::test]
async fn f001_negative_predicate_waits_full_timeout() {
    let timeout = Duration::from_secs(30);
    let period = Duration::from_millis(200);
    let (poller, clock) = poller(timeout, period);

    let err = poller
        .await_default("never converges", || async { Ok(false) })
        .await
        .expect_err("F001 FALSIFIED: always-false predicate reported success");

    assert!(err.is_timeout(), "F001 FALSIFIED: wrong error {err}");
    assert!(
        clock.elapsed() >= timeout,
        "F001 FALSIFIED: returned after {:?}, before the {:?} timeout",
        clock.elapsed(),
        timeout
    );
    assert!(
        clock.elapsed() < timeout + period,
        "F001 FALSIFIED: overshot by more than one period ({:?})",
        clock.elapsed()
    );
}

proptest! {
    /// F002: Timeout lower bound holds for arbitrary budgets
    ///
    /// # Falsification Attempt
    /// Random timeouts and periods; elapsed time must land in
    /// [timeout, timeout + period) and the attempt count must match the budget.
    #[test]
    fn f002_timeout_lower_bound_any_budget(timeout_ms in 1u64..10_000, period_ms in 1u64..500) {
        let timeout = Duration::from_millis(timeout_ms);
        let period = Duration::from_millis(period_ms);
        let (poller, clock) = poller(timeout, period);
        let calls = AtomicU32::new(0);

        let result = tokio_test::block_on(poller.await_default("never", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(false) }
        }));

        prop_assert!(result.is_err(), "F002 FALSIFIED: success without convergence");
        prop_assert!(clock.elapsed() >= timeout, "F002 FALSIFIED: early return");
        prop_assert!(clock.elapsed() < timeout + period, "F002 FALSIFIED: overshoot");
        prop_assert_eq!(
            u128::from(calls.load(Ordering::SeqCst)),
            Budget::new(timeout, period).max_attempts()
        );
    }

    /// F003: Early success returns after at most k polling periods
    ///
    /// # Falsification Attempt
    /// Succeed on the k-th call; the engine must stop right there.
    #[test]
    fn f003_early_success_on_kth_attempt(k in 1u32..100) {
        let period = Duration::from_millis(200);
        let (poller, clock) = poller(Duration::from_secs(30), period);
        let calls = AtomicU32::new(0);

        let result = tokio_test::block_on(poller.await_default("kth", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n == k) }
        }));

        prop_assert!(result.is_ok(), "F003 FALSIFIED: success on call {} not reported", k);
        prop_assert_eq!(calls.load(Ordering::SeqCst), k);
        prop_assert!(clock.elapsed() <= period * k, "F003 FALSIFIED: waited {:?}", clock.elapsed());
        prop_assert_eq!(clock.sleeps(), k - 1);
    }
}

// =============================================================================
// F004-F006: Last-Error Policy
// =============================================================================

/// F004: The timeout carries the last probe error
///
/// # Falsification Attempt
/// A predicate that fails every time; the timeout message must contain both
/// the description and the probe error.
#[tokio::test]
async fn f004_timeout_carries_last_error() {
    let (poller, _clock) = poller(Duration::from_secs(1), Duration::from_millis(200));
    let err = poller
        .await_default("dnse not Ready: [\"a\"]", || async {
            Err(ConvergeError::command("kubectl get dnse", "the server is unreachable"))
        })
        .await
        .expect_err("must time out");

    let msg = err.to_string();
    assert!(
        msg.starts_with("timeout during check dnse not Ready: [\"a\"] with error "),
        "F004 FALSIFIED: unexpected message {msg}"
    );
    assert!(msg.contains("the server is unreachable"), "F004 FALSIFIED: {msg}");
}

/// F005: Only the final attempt's error counts
///
/// # Falsification Attempt
/// Fail early, then answer "not yet" until the deadline; an error from an
/// earlier attempt must not leak into the report.
#[tokio::test]
async fn f005_stale_error_not_reported() {
    let (poller, _clock) = poller(Duration::from_secs(1), Duration::from_millis(200));
    let calls = AtomicU32::new(0);
    let err = poller
        .await_default("settles", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ConvergeError::resolve("a.example.com", "SERVFAIL"))
                } else {
                    Ok(false)
                }
            }
        })
        .await
        .expect_err("must time out");

    assert_eq!(
        err.to_string(),
        "timeout during check settles",
        "F005 FALSIFIED: stale error reported"
    );
}

/// F006: A probe error is retried, not fatal
///
/// # Falsification Attempt
/// Fail three times, then succeed; the check must succeed.
#[tokio::test]
async fn f006_probe_errors_are_retried() {
    let (poller, clock) = poller(Duration::from_secs(30), Duration::from_millis(200));
    let calls = AtomicU32::new(0);
    let result = poller
        .await_default("recovers", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(ConvergeError::decode("truncated output"))
                } else {
                    Ok(true)
                }
            }
        })
        .await;

    assert!(result.is_ok(), "F006 FALSIFIED: probe error aborted the check");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(clock.sleeps(), 3);
}

// =============================================================================
// F007-F010: Budget Edges
// =============================================================================

/// F007: A zero timeout never invokes the predicate
#[tokio::test]
async fn f007_zero_timeout_never_polls() {
    let (poller, clock) = poller(Duration::from_secs(30), Duration::from_millis(200));
    let calls = AtomicU32::new(0);
    let err = poller
        .await_with_timeout("instant", Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(true) }
        })
        .await
        .expect_err("zero budget must time out");

    assert!(err.is_timeout());
    assert_eq!(calls.load(Ordering::SeqCst), 0, "F007 FALSIFIED: predicate invoked");
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

/// F008: The timeout error records the consumed budget
#[tokio::test]
async fn f008_timeout_records_budget() {
    let timeout = Duration::from_millis(600);
    let (poller, _clock) = poller(timeout, Duration::from_millis(200));
    let err = poller
        .await_default("budget", || async { Ok(false) })
        .await
        .expect_err("must time out");

    match err {
        ConvergeError::Timeout { waited, .. } => {
            assert_eq!(waited, timeout, "F008 FALSIFIED: waited {waited:?}");
        }
        other => panic!("F008 FALSIFIED: unexpected error {other}"),
    }
}

/// F009: A period override changes only the period
#[tokio::test]
async fn f009_period_override() {
    let (poller, clock) = poller(Duration::from_secs(2), Duration::from_millis(200));
    let fast = poller.with_period(Duration::from_millis(100));
    let _ = fast.await_default("fast", || async { Ok(false) }).await;

    assert_eq!(clock.sleeps(), 20, "F009 FALSIFIED: period override ignored");
    assert_eq!(clock.elapsed(), Duration::from_secs(2));
}

/// F010: Concurrent checks on one poller do not interfere
///
/// # Falsification Attempt
/// Run a converging and a non-converging check side by side; each must get
/// its own outcome.
#[tokio::test]
async fn f010_concurrent_checks_are_independent() {
    let (poller, _clock) = poller(Duration::from_secs(1), Duration::from_millis(200));
    let converging = AtomicU32::new(0);

    let (ok, timed_out) = tokio::join!(
        poller.await_default("converging", || {
            let n = converging.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 2) }
        }),
        poller.await_default("stuck", || async { Ok(false) }),
    );

    assert!(ok.is_ok(), "F010 FALSIFIED: converging check failed");
    assert!(
        timed_out.is_err_and(|e| e.to_string() == "timeout during check stuck"),
        "F010 FALSIFIED: stuck check did not time out on its own"
    );
}
