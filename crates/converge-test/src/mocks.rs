//! In-memory collaborators for testing convergence checks.
//!
//! Each fake replays a script: responses are consumed in order and the last
//! one repeats forever, so "eventually converges" and "never converges"
//! scenarios are both one line to set up.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use converge_core::{ConvergeError, ResourceKind, Result};
use converge_probe::{DnsResolver, ManifestClient, OutputFormat, ResourceQuery};

/// One scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    /// Successful probe output.
    Ok(T),
    /// Probe failure with this message.
    Fail(String),
}

/// Replays replies in order, repeating the last one.
#[derive(Debug)]
struct Script<T> {
    replies: VecDeque<Reply<T>>,
}

impl<T: Clone> Script<T> {
    fn new() -> Self {
        Self {
            replies: VecDeque::new(),
        }
    }

    fn push(&mut self, reply: Reply<T>) {
        self.replies.push_back(reply);
    }

    fn next_reply(&mut self) -> Option<Reply<T>> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

/// Scripted resource store.
///
/// `name=state` projections and JSON listings are scripted separately per
/// resource kind. Querying an unscripted kind yields empty output, i.e. no
/// resources.
#[derive(Debug, Default)]
pub struct ScriptedQuery {
    scripts: Mutex<HashMap<(String, OutputFormat), Script<String>>>,
    calls: AtomicU32,
}

impl ScriptedQuery {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: &str, format: OutputFormat, reply: Reply<String>) {
        self.scripts
            .lock()
            .entry((kind.to_string(), format))
            .or_insert_with(Script::new)
            .push(reply);
    }

    /// Queues a `name=state` projection for `kind`.
    pub fn push_states(&self, kind: &str, output: impl Into<String>) -> &Self {
        self.push(kind, OutputFormat::StatePairs, Reply::Ok(output.into()));
        self
    }

    /// Drops any queued projections for `kind` and serves `output` from now on.
    pub fn replace_states(&self, kind: &str, output: impl Into<String>) -> &Self {
        let mut script = Script::new();
        script.push(Reply::Ok(output.into()));
        self.scripts
            .lock()
            .insert((kind.to_string(), OutputFormat::StatePairs), script);
        self
    }

    /// Queues a failing `name=state` query for `kind`.
    pub fn push_states_failure(&self, kind: &str, message: impl Into<String>) -> &Self {
        self.push(kind, OutputFormat::StatePairs, Reply::Fail(message.into()));
        self
    }

    /// Queues a JSON listing for `kind`.
    pub fn push_json(&self, kind: &str, output: impl Into<String>) -> &Self {
        self.push(kind, OutputFormat::Json, Reply::Ok(output.into()));
        self
    }

    /// Total number of queries served.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceQuery for ScriptedQuery {
    async fn run_query(&self, kind: &ResourceKind, format: OutputFormat) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .scripts
            .lock()
            .get_mut(&(kind.to_string(), format))
            .and_then(Script::next_reply);
        match reply {
            Some(Reply::Ok(output)) => Ok(output),
            Some(Reply::Fail(message)) => Err(ConvergeError::command(
                format!("get {kind} {}", format.output_arg()),
                message,
            )),
            None => Ok(String::new()),
        }
    }
}

/// Scripted resolver.
///
/// Names without a script fail like a lookup of a nonexistent host.
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    hosts: Mutex<HashMap<String, Script<Vec<String>>>>,
    txts: Mutex<HashMap<String, Script<Vec<String>>>>,
    calls: AtomicU32,
}

impl ScriptedResolver {
    /// Creates a resolver that knows no names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues host addresses for `name`.
    pub fn push_host<S: AsRef<str>>(&self, name: &str, addrs: &[S]) -> &Self {
        push_values(&self.hosts, name, Reply::Ok(to_strings(addrs)));
        self
    }

    /// Queues a failing host lookup for `name`.
    pub fn push_host_failure(&self, name: &str, message: impl Into<String>) -> &Self {
        push_values(&self.hosts, name, Reply::Fail(message.into()));
        self
    }

    /// Queues TXT strings for `name`.
    pub fn push_txt<S: AsRef<str>>(&self, name: &str, records: &[S]) -> &Self {
        push_values(&self.txts, name, Reply::Ok(to_strings(records)));
        self
    }

    /// Queues a failing TXT lookup for `name`.
    pub fn push_txt_failure(&self, name: &str, message: impl Into<String>) -> &Self {
        push_values(&self.txts, name, Reply::Fail(message.into()));
        self
    }

    /// Total number of lookups served.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, table: &Mutex<HashMap<String, Script<Vec<String>>>>, name: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = table.lock().get_mut(name).and_then(Script::next_reply);
        match reply {
            Some(Reply::Ok(values)) => Ok(values),
            Some(Reply::Fail(message)) => Err(ConvergeError::resolve(name, message)),
            None => Err(ConvergeError::resolve(name, "no such host")),
        }
    }
}

fn push_values(
    table: &Mutex<HashMap<String, Script<Vec<String>>>>,
    name: &str,
    reply: Reply<Vec<String>>,
) {
    table
        .lock()
        .entry(name.to_string())
        .or_insert_with(Script::new)
        .push(reply);
}

fn to_strings<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values.iter().map(|v| v.as_ref().to_string()).collect()
}

#[async_trait]
impl DnsResolver for ScriptedResolver {
    async fn lookup_host(&self, name: &str) -> Result<Vec<String>> {
        self.answer(&self.hosts, name)
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>> {
        self.answer(&self.txts, name)
    }
}

/// Manifest client recording what was applied and deleted.
#[derive(Debug, Default)]
pub struct RecordingManifests {
    applied: Mutex<Vec<PathBuf>>,
    deleted: Mutex<Vec<PathBuf>>,
    fail_with: Mutex<Option<(String, String)>>,
}

impl RecordingManifests {
    /// Creates a client on which every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.fail_with_output(message, "");
    }

    /// Makes every subsequent call fail with `message` after printing `output`.
    pub fn fail_with_output(&self, message: impl Into<String>, output: impl Into<String>) {
        *self.fail_with.lock() = Some((message.into(), output.into()));
    }

    /// Paths applied so far.
    #[must_use]
    pub fn applied(&self) -> Vec<PathBuf> {
        self.applied.lock().clone()
    }

    /// Paths deleted so far.
    #[must_use]
    pub fn deleted(&self) -> Vec<PathBuf> {
        self.deleted.lock().clone()
    }

    fn record(
        &self,
        log: &Mutex<Vec<PathBuf>>,
        verb: &str,
        outcome: &str,
        path: &Path,
    ) -> Result<String> {
        let failure = self.fail_with.lock().clone();
        if let Some((message, output)) = failure {
            return Err(ConvergeError::command_with_output(
                format!("{verb} -f {}", path.display()),
                message,
                output,
            ));
        }
        log.lock().push(path.to_path_buf());
        Ok(format!("{} {outcome}", path.display()))
    }
}

#[async_trait]
impl ManifestClient for RecordingManifests {
    async fn apply(&self, path: &Path) -> Result<String> {
        self.record(&self.applied, "apply", "configured", path)
    }

    async fn delete(&self, path: &Path) -> Result<String> {
        self.record(&self.deleted, "delete", "deleted", path)
    }
}
