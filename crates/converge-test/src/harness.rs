//! Convergence test harness.
//!
//! # Toyota Way: Genchi Genbutsu (現地現物)
//! Go and see: checks observe the live store on every poll and never trust a
//! cached answer.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use converge_core::{
    Clock, ConvergeError, ExpectedState, HarnessConfig, LookupKind, Poller, ResourceKind, Result,
    StateSnapshot, TokioClock, describe_lookup, describe_state_check, parse_states, same_values,
};
use converge_probe::{
    DnsResolver, KubectlQuery, ManifestClient, OutputFormat, ResourceQuery, UdpResolver,
    decode_list,
};

/// Harness for awaiting externally-driven convergence.
///
/// Holds the read-only configuration and the probes; every check allocates
/// its own state, so independent checks may run concurrently on one harness.
pub struct ConvergenceHarness {
    config: HarnessConfig,
    query: Arc<dyn ResourceQuery>,
    manifests: Arc<dyn ManifestClient>,
    resolver: Option<Arc<dyn DnsResolver>>,
    poller: Poller,
}

impl std::fmt::Debug for ConvergenceHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvergenceHarness")
            .field("config", &self.config)
            .field("resolver", &self.resolver.is_some())
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

impl ConvergenceHarness {
    /// Creates a new harness builder.
    #[must_use]
    pub fn builder() -> ConvergenceHarnessBuilder {
        ConvergenceHarnessBuilder::default()
    }

    /// Creates a harness talking to the cluster through `kubectl`, resolving
    /// names through the configured DNS server, if any.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        Self::builder().with_config(config).build()
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Returns the polling engine used for state checks.
    #[must_use]
    pub const fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Polls `check` until it succeeds or the await timeout elapses.
    ///
    /// # Errors
    /// Returns a timeout error if the check never succeeded.
    pub async fn await_check<F, Fut>(&self, description: &str, check: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        self.poller.await_default(description, check).await
    }

    /// Polls `check` until it succeeds or `timeout` elapses.
    ///
    /// # Errors
    /// Returns a timeout error if the check never succeeded.
    pub async fn await_with_timeout<F, Fut>(
        &self,
        description: &str,
        timeout: Duration,
        check: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        self.poller
            .await_with_timeout(description, timeout, check)
            .await
    }

    // =========================================================================
    // Resource state checks
    // =========================================================================

    /// Fetches the current states of all resources of `kind`.
    ///
    /// # Errors
    /// Returns the query error, if any.
    pub async fn observe_states(&self, kind: &ResourceKind) -> Result<StateSnapshot> {
        let raw = self.query.run_query(kind, OutputFormat::StatePairs).await?;
        Ok(parse_states(&raw))
    }

    /// Waits until every name in `names` has reached `expected`.
    ///
    /// For [`ExpectedState::Deleted`] the names must be absent, otherwise
    /// present with exactly the expected state. All names must hold in the
    /// same poll.
    ///
    /// # Errors
    /// Returns a timeout error naming the kind, state and names if the
    /// resources did not converge within the await timeout.
    pub async fn await_state<S: AsRef<str>>(
        &self,
        kind: &ResourceKind,
        expected: &ExpectedState,
        names: &[S],
    ) -> Result<()> {
        self.await_state_with_timeout(kind, expected, names, self.config.await_timeout)
            .await
    }

    /// Like [`Self::await_state`] with an explicit timeout.
    ///
    /// # Errors
    /// Returns a timeout error if the resources did not converge in time.
    pub async fn await_state_with_timeout<S: AsRef<str>>(
        &self,
        kind: &ResourceKind,
        expected: &ExpectedState,
        names: &[S],
        timeout: Duration,
    ) -> Result<()> {
        let description = describe_state_check(kind, expected, names);
        self.poller
            .await_with_timeout(&description, timeout, move || async move {
                let snapshot = self.observe_states(kind).await?;
                let pending = snapshot.pending(expected, names);
                if pending.is_empty() {
                    return Ok(true);
                }
                tracing::trace!(kind = %kind, expected = %expected, pending = ?pending, "resources not converged");
                Ok(false)
            })
            .await
    }

    /// Waits until the named DNS providers are ready.
    pub async fn await_providers_ready<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        self.await_state(&ResourceKind::provider(), &ExpectedState::ready(), names)
            .await
    }

    /// Waits until the named DNS providers are gone.
    pub async fn await_providers_deleted<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        self.await_state(&ResourceKind::provider(), &ExpectedState::deleted(), names)
            .await
    }

    /// Waits until the named DNS entries are ready.
    pub async fn await_entries_ready<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        self.await_state(&ResourceKind::entry(), &ExpectedState::ready(), names)
            .await
    }

    /// Waits until the named DNS entries report an error.
    pub async fn await_entries_error<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        self.await_state(&ResourceKind::entry(), &ExpectedState::error(), names)
            .await
    }

    /// Waits until the named DNS entries are gone.
    pub async fn await_entries_deleted<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        self.await_state(&ResourceKind::entry(), &ExpectedState::deleted(), names)
            .await
    }

    // =========================================================================
    // DNS checks
    // =========================================================================

    /// Returns true if DNS checks can run in this environment.
    ///
    /// Without a resolver nothing can be looked up. A private zone is not
    /// visible to the configured resolver endpoint, so lookups in it are
    /// not testable either. Callers skip DNS checks when this is false.
    #[must_use]
    pub fn can_lookup(&self, private_dns: bool) -> bool {
        self.resolver.is_some() && !private_dns
    }

    fn resolver_for(&self, name: &str) -> Result<&dyn DnsResolver> {
        self.resolver.as_deref().ok_or_else(|| {
            ConvergeError::not_testable(format!(
                "no DNS resolver configured, cannot look up {name}"
            ))
        })
    }

    /// Waits until `name` resolves to exactly the `expected` addresses.
    ///
    /// # Errors
    /// Returns `NotTestable` without a resolver, or a timeout error naming the
    /// DNS name if the answer did not converge within the lookup timeout.
    pub async fn await_lookup<S: AsRef<str>>(&self, name: &str, expected: &[S]) -> Result<()> {
        self.await_lookup_with(LookupKind::Host, name, expected)
            .await
    }

    /// Waits until `name` has exactly the `expected` TXT strings.
    ///
    /// # Errors
    /// Returns `NotTestable` without a resolver, or a timeout error.
    pub async fn await_lookup_txt<S: AsRef<str>>(&self, name: &str, expected: &[S]) -> Result<()> {
        self.await_lookup_with(LookupKind::Txt, name, expected)
            .await
    }

    /// Waits until the `kind` lookup of `name` yields exactly `expected`,
    /// ignoring order.
    ///
    /// # Errors
    /// Returns `NotTestable` without a resolver, or a timeout error.
    pub async fn await_lookup_with<S: AsRef<str>>(
        &self,
        kind: LookupKind,
        name: &str,
        expected: &[S],
    ) -> Result<()> {
        let resolver = self.resolver_for(name)?;
        self.log_verbose(&format!("DNS lookup for {name}..."));

        let description = describe_lookup(kind, name, expected);
        let last_answer: Mutex<Option<Vec<String>>> = Mutex::new(None);
        let last = &last_answer;

        let result = self
            .poller
            .await_with_timeout(&description, self.config.lookup_timeout, move || async move {
                let values = resolver.lookup(kind, name).await?;
                let converged = same_values(&values, expected);
                *last.lock() = Some(values);
                Ok(converged)
            })
            .await;

        result.map_err(|e| match e {
            ConvergeError::Timeout {
                description,
                last_error: None,
                waited,
            } => {
                let description = match last_answer.lock().take() {
                    Some(values) => format!("{description} (last answer {values:?})"),
                    None => description,
                };
                ConvergeError::Timeout {
                    description,
                    last_error: None,
                    waited,
                }
            }
            other => other,
        })
    }

    /// Waits until `name` resolves to the same addresses as `target`.
    ///
    /// `target` is resolved once up front; if that fails the check fails at
    /// once instead of polling against an unknown expectation.
    ///
    /// # Errors
    /// Returns `Precondition` if `target` cannot be resolved, `NotTestable`
    /// without a resolver, or a timeout error.
    pub async fn await_lookup_cname(&self, name: &str, target: &str) -> Result<()> {
        let resolver = self.resolver_for(name)?;
        let expected = resolver.lookup_host(target).await.map_err(|e| {
            ConvergeError::precondition(format!("cannot resolve reference name {target}: {e}"))
        })?;
        tracing::debug!(dns_name = name, target, expected = ?expected, "awaiting CNAME equivalence");
        self.await_lookup(name, &expected).await
    }

    // =========================================================================
    // Manifests and listings
    // =========================================================================

    /// Applies the manifest at `path`.
    ///
    /// The command output is logged in verbose mode, also when the apply
    /// failed.
    ///
    /// # Errors
    /// Returns the command error if the apply failed.
    pub async fn apply_manifest(&self, path: impl AsRef<Path>) -> Result<()> {
        let result = self.manifests.apply(path.as_ref()).await;
        self.log_command_result(result)
    }

    /// Deletes the resources of the manifest at `path`.
    ///
    /// The command output is logged in verbose mode, also when the delete
    /// failed.
    ///
    /// # Errors
    /// Returns the command error if the delete failed.
    pub async fn delete_manifest(&self, path: impl AsRef<Path>) -> Result<()> {
        let result = self.manifests.delete(path.as_ref()).await;
        self.log_command_result(result)
    }

    fn log_command_result(&self, result: Result<String>) -> Result<()> {
        match result {
            Ok(output) => {
                self.log_verbose(&output);
                Ok(())
            }
            Err(e) => {
                if let Some(output) = e.command_output() {
                    self.log_verbose(output);
                }
                Err(e)
            }
        }
    }

    /// Lists all resources of `kind`, keyed by name.
    ///
    /// # Errors
    /// Returns the query error, or a decode error if the output is not a
    /// well-formed list.
    pub async fn list_items(
        &self,
        kind: &ResourceKind,
    ) -> Result<BTreeMap<String, serde_json::Value>> {
        let output = self.query.run_query(kind, OutputFormat::Json).await?;
        decode_list(&output)
    }

    /// Lists all DNS entries, keyed by name.
    ///
    /// # Errors
    /// See [`Self::list_items`].
    pub async fn list_entries(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        self.list_items(&ResourceKind::entry()).await
    }

    /// Logs captured command output when verbose mode is on.
    pub fn log_verbose(&self, output: &str) {
        if self.config.verbose {
            tracing::info!(target: "converge::output", "{}", output.trim_end());
        }
    }
}

/// Builder for [`ConvergenceHarness`].
#[derive(Default)]
pub struct ConvergenceHarnessBuilder {
    config: Option<HarnessConfig>,
    query: Option<Arc<dyn ResourceQuery>>,
    manifests: Option<Arc<dyn ManifestClient>>,
    resolver: Option<Arc<dyn DnsResolver>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ConvergenceHarnessBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the resource query provider.
    #[must_use]
    pub fn with_query(mut self, query: Arc<dyn ResourceQuery>) -> Self {
        self.query = Some(query);
        self
    }

    /// Sets the manifest client.
    #[must_use]
    pub fn with_manifests(mut self, manifests: Arc<dyn ManifestClient>) -> Self {
        self.manifests = Some(manifests);
        self
    }

    /// Sets the DNS resolver, overriding the configured server.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn DnsResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the clock driving the polling loops.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the harness.
    ///
    /// Missing probes default to `kubectl` in the configured namespace and to
    /// a UDP resolver for the configured DNS server.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<ConvergenceHarness> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let kubectl = Arc::new(KubectlQuery::new(config.namespace.clone()));
        let query = self
            .query
            .unwrap_or_else(|| Arc::clone(&kubectl) as Arc<dyn ResourceQuery>);
        let manifests = self
            .manifests
            .unwrap_or_else(|| kubectl as Arc<dyn ManifestClient>);
        let resolver = self.resolver.or_else(|| {
            config
                .dns_server
                .as_ref()
                .map(|server| Arc::new(UdpResolver::new(server.clone())) as Arc<dyn DnsResolver>)
        });
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let poller = Poller::with_clock(config.await_budget(), clock);

        tracing::debug!(
            namespace = %config.namespace,
            await_timeout = ?config.await_timeout,
            lookup_timeout = ?config.lookup_timeout,
            polling_period = ?config.polling_period,
            dns = resolver.is_some(),
            "convergence harness ready"
        );

        Ok(ConvergenceHarness {
            config,
            query,
            manifests,
            resolver,
            poller,
        })
    }
}
