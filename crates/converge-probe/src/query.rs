//! Resource queries and manifest handling.
//!
//! The harness only ever reads from the resource store through
//! [`ResourceQuery`] and changes it through [`ManifestClient`]. The `kubectl`
//! wrapper implements both.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use converge_core::{ConvergeError, ResourceKind, Result};

/// Output shape requested from the resource store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Full JSON listing (`kind: List` with an `items` array).
    Json,
    /// One `name=state` line per resource.
    StatePairs,
}

impl OutputFormat {
    /// Server-side template producing one `name=state` line per resource.
    pub const STATE_PAIRS_TEMPLATE: &'static str =
        "jsonpath={range .items[*]}{.metadata.name}={.status.state}{'\\n'}{end}";

    /// Returns the `-o` argument selecting this format.
    #[must_use]
    pub fn output_arg(self) -> String {
        match self {
            Self::Json => "-o=json".to_string(),
            Self::StatePairs => format!("-o={}", Self::STATE_PAIRS_TEMPLATE),
        }
    }
}

/// Read-only access to the resource store.
#[async_trait]
pub trait ResourceQuery: Send + Sync {
    /// Lists all resources of `kind` in the given output format.
    ///
    /// # Errors
    /// Returns a probe error if the query could not be executed.
    async fn run_query(&self, kind: &ResourceKind, format: OutputFormat) -> Result<String>;
}

/// Applies and deletes declarative manifest files.
#[async_trait]
pub trait ManifestClient: Send + Sync {
    /// Applies the manifest at `path`, returning the command output.
    async fn apply(&self, path: &Path) -> Result<String>;

    /// Deletes the resources of the manifest at `path`, returning the command
    /// output.
    async fn delete(&self, path: &Path) -> Result<String>;
}

/// `kubectl` wrapper scoped to one namespace.
#[derive(Debug, Clone)]
pub struct KubectlQuery {
    binary: PathBuf,
    namespace: String,
}

impl KubectlQuery {
    /// Creates a wrapper using `kubectl` from `PATH`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_binary("kubectl", namespace)
    }

    /// Creates a wrapper using the given `kubectl` binary.
    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            namespace: namespace.into(),
        }
    }

    /// Returns the namespace all commands are scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Full argument list for a `kubectl` invocation.
    fn command_args(&self, args: &[String]) -> Vec<String> {
        let mut full = vec!["-n".to_string(), self.namespace.clone()];
        full.extend(args.iter().cloned());
        full
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = self.binary.display().to_string();
        for arg in self.command_args(args) {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }

    /// Runs `kubectl -n <namespace> <args>` and returns its stdout.
    ///
    /// # Errors
    /// Returns a command error if `kubectl` cannot be spawned or exits with a
    /// non-zero status. The error message carries stderr and
    /// [`ConvergeError::command_output`] returns stdout followed by stderr.
    pub async fn run(&self, args: &[String]) -> Result<String> {
        let command_line = self.command_line(args);
        tracing::trace!(command = %command_line, "running kubectl");

        let output = Command::new(&self.binary)
            .args(self.command_args(args))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ConvergeError::command(&command_line, format!("failed to spawn: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(command = %command_line, status = %output.status, stderr = %stderr.trim_end(), "kubectl failed");
            let message = format!("{}: {}", output.status, stderr.trim_end());
            return Err(ConvergeError::command_with_output(
                command_line,
                message,
                format!("{stdout}{stderr}"),
            ));
        }
        Ok(stdout)
    }
}

#[async_trait]
impl ResourceQuery for KubectlQuery {
    async fn run_query(&self, kind: &ResourceKind, format: OutputFormat) -> Result<String> {
        self.run(&["get".to_string(), kind.to_string(), format.output_arg()])
            .await
    }
}

#[async_trait]
impl ManifestClient for KubectlQuery {
    async fn apply(&self, path: &Path) -> Result<String> {
        self.run(&[
            "apply".to_string(),
            "-f".to_string(),
            path.display().to_string(),
        ])
        .await
    }

    async fn delete(&self, path: &Path) -> Result<String> {
        self.run(&[
            "delete".to_string(),
            "-f".to_string(),
            path.display().to_string(),
        ])
        .await
    }
}

#[derive(Debug, Deserialize)]
struct ListDocument {
    kind: Option<String>,
    items: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ItemHeader {
    metadata: ItemMetadata,
}

#[derive(Debug, Deserialize)]
struct ItemMetadata {
    name: String,
}

/// Decodes a JSON listing into its items keyed by `metadata.name`.
///
/// Anything other than a well-formed `kind: List` document is an error;
/// items are never silently skipped.
///
/// # Errors
/// Returns a decode error for invalid JSON, a non-List document, a missing
/// `items` array, or an item without a string `metadata.name`.
pub fn decode_list(output: &str) -> Result<BTreeMap<String, serde_json::Value>> {
    let document: ListDocument = serde_json::from_str(output)
        .map_err(|e| ConvergeError::decode(format!("invalid JSON listing: {e}")))?;

    if document.kind.as_deref() != Some("List") {
        return Err(ConvergeError::decode("result is not a list"));
    }
    let items = document
        .items
        .ok_or_else(|| ConvergeError::decode("list has no items array"))?;

    let mut by_name = BTreeMap::new();
    for (index, item) in items.into_iter().enumerate() {
        let header = ItemHeader::deserialize(&item)
            .map_err(|e| ConvergeError::decode(format!("item {index}: {e}")))?;
        by_name.insert(header.metadata.name, item);
    }
    Ok(by_name)
}
