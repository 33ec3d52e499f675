//! Error types for converge-core.
//!
//! Per Iron Lotus Framework: All errors are explicit, no panics allowed.
//!
//! Errors fall into three groups:
//! - **Probe errors** (`Command`, `Decode`, `Resolve`, `Io`): one poll attempt
//!   failed. The polling engine remembers them and keeps retrying.
//! - **Timeout**: the awaited condition never held within the budget.
//! - **Immediate errors** (`Precondition`, `NotTestable`, `Config`): surfaced
//!   to the caller without polling.

use std::time::Duration;

/// Result type alias for convergence operations.
pub type Result<T> = std::result::Result<T, ConvergeError>;

/// Error type for convergence checks and their collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ConvergeError {
    /// The awaited condition did not hold before the deadline.
    #[error("timeout during check {description}{}", with_cause(.last_error))]
    Timeout {
        /// What was being awaited.
        description: String,
        /// Message of the error returned by the final poll attempt, if any.
        last_error: Option<String>,
        /// Budget that was consumed.
        waited: Duration,
    },

    /// An external command failed.
    #[error("command `{command}` failed: {message}")]
    Command {
        /// Command line that was executed.
        command: String,
        /// Failure detail (exit status and stderr).
        message: String,
        /// Output the command produced before failing, possibly empty.
        output: String,
    },

    /// Query output could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A DNS lookup failed.
    #[error("lookup of {name} failed: {message}")]
    Resolve {
        /// Name that was looked up.
        name: String,
        /// Resolver failure detail.
        message: String,
    },

    /// A precondition required before polling did not hold.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The environment cannot perform this kind of check.
    #[error("not testable: {0}")]
    NotTestable(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn with_cause(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" with error {e}"))
        .unwrap_or_default()
}

impl ConvergeError {
    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(
        description: impl Into<String>,
        last_error: Option<String>,
        waited: Duration,
    ) -> Self {
        Self::Timeout {
            description: description.into(),
            last_error,
            waited,
        }
    }

    /// Creates a command error.
    #[must_use]
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::command_with_output(command, message, String::new())
    }

    /// Creates a command error that keeps what the command printed.
    #[must_use]
    pub fn command_with_output(
        command: impl Into<String>,
        message: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
            output: output.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Creates a resolve error.
    #[must_use]
    pub fn resolve(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a precondition error.
    #[must_use]
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Creates a not-testable error.
    #[must_use]
    pub fn not_testable(msg: impl Into<String>) -> Self {
        Self::NotTestable(msg.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if this error came from a single poll attempt and the
    /// check may still converge on a later attempt.
    #[must_use]
    pub const fn is_probe_error(&self) -> bool {
        matches!(
            self,
            Self::Command { .. } | Self::Decode(_) | Self::Resolve { .. } | Self::Io(_)
        )
    }

    /// Returns the output of a failed command, if it printed anything.
    #[must_use]
    pub fn command_output(&self) -> Option<&str> {
        match self {
            Self::Command { output, .. } if !output.trim().is_empty() => Some(output),
            _ => None,
        }
    }

    /// Returns true if this error is a convergence timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
