//! Bounded-retry convergence engine.
//!
//! A check hands the engine a predicate; the engine owns timing and retry.
//! The predicate owns the interpretation of "success":
//!
//! - `Ok(true)`: converged, return at once.
//! - `Ok(false)`: not yet, sleep one polling period and try again.
//! - `Err(e)`: the probe itself failed. Treated like `Ok(false)`, but the
//!   error text is kept for the timeout report.
//!
//! Only the deadline ends an unsuccessful check. Neither a negative result
//! nor a probe error stops the loop early.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, TokioClock};
use crate::config::Budget;
use crate::error::{ConvergeError, Result};

/// Polling engine bound to a clock and a default budget.
#[derive(Clone)]
pub struct Poller {
    clock: Arc<dyn Clock>,
    budget: Budget,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Creates a poller on the wall clock.
    #[must_use]
    pub fn new(budget: Budget) -> Self {
        Self::with_clock(budget, Arc::new(TokioClock))
    }

    /// Creates a poller on the given clock.
    #[must_use]
    pub fn with_clock(budget: Budget, clock: Arc<dyn Clock>) -> Self {
        Self { clock, budget }
    }

    /// Returns a copy of this poller with a different polling period.
    #[must_use]
    pub fn with_period(&self, period: Duration) -> Self {
        Self {
            clock: Arc::clone(&self.clock),
            budget: Budget::new(self.budget.timeout, period),
        }
    }

    /// Returns a copy of this poller with a different default timeout.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            clock: Arc::clone(&self.clock),
            budget: Budget::new(timeout, self.budget.period),
        }
    }

    /// Returns the default budget.
    #[must_use]
    pub const fn budget(&self) -> Budget {
        self.budget
    }

    /// Returns the clock driving this poller.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Polls `check` until it succeeds or the default timeout elapses.
    ///
    /// # Errors
    /// Returns [`ConvergeError::Timeout`] if the check never succeeded.
    pub async fn await_default<F, Fut>(&self, description: &str, check: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        self.await_with_timeout(description, self.budget.timeout, check)
            .await
    }

    /// Polls `check` until it succeeds or `timeout` elapses.
    ///
    /// The predicate is invoked only while the deadline has not passed, so a
    /// zero timeout fails without a single attempt. A timeout too large to
    /// represent as an instant (e.g. `Duration::MAX`) means no deadline at
    /// all. When the final attempt returned an error, the timeout error
    /// carries its message.
    ///
    /// # Errors
    /// Returns [`ConvergeError::Timeout`] if the check never succeeded.
    pub async fn await_with_timeout<F, Fut>(
        &self,
        description: &str,
        timeout: Duration,
        mut check: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let start = self.clock.now();
        // a timeout past the end of the clock's range never expires
        let deadline = start.checked_add(timeout);
        if deadline.is_none() {
            tracing::debug!(check = description, timeout = ?timeout, "timeout unbounded");
        }
        let mut last_error: Option<String> = None;
        let mut attempts: u32 = 0;

        while deadline.is_none_or(|deadline| self.clock.now() < deadline) {
            attempts += 1;
            match check().await {
                Ok(true) => {
                    tracing::debug!(
                        check = description,
                        attempts,
                        elapsed = ?(self.clock.now() - start),
                        "check converged"
                    );
                    return Ok(());
                }
                Ok(false) => {
                    tracing::trace!(check = description, attempts, "check not converged yet");
                    last_error = None;
                }
                Err(e) => {
                    tracing::debug!(check = description, attempts, error = %e, "probe failed");
                    last_error = Some(e.to_string());
                }
            }
            self.clock.sleep(self.budget.period).await;
        }

        tracing::warn!(
            check = description,
            attempts,
            timeout = ?timeout,
            last_error = last_error.as_deref().unwrap_or(""),
            "check timed out"
        );
        Err(ConvergeError::timeout(description, last_error, timeout))
    }
}
