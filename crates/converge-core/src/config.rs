//! Harness configuration types.
//!
//! Per Iron Lotus Framework: Configuration is validated at load time (Poka-Yoke),
//! with sensible defaults and clear error messages.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConvergeError, Result};

/// Harness configuration.
///
/// Shared read-only by every check issued through one harness. Tests that
/// must not wait on the wall clock inject tiny budgets here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Budget for resource state checks.
    #[serde(default = "default_await_timeout")]
    #[serde(with = "humantime_serde")]
    pub await_timeout: Duration,

    /// Budget for DNS lookup checks.
    ///
    /// Much larger than `await_timeout`: upstream resolvers may keep serving
    /// cached answers for minutes after the controller updated the zone.
    #[serde(default = "default_lookup_timeout")]
    #[serde(with = "humantime_serde")]
    pub lookup_timeout: Duration,

    /// Delay between two poll attempts.
    #[serde(default = "default_polling_period")]
    #[serde(with = "humantime_serde")]
    pub polling_period: Duration,

    /// Namespace the resource queries are scoped to.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Log captured command output.
    #[serde(default = "default_true")]
    pub verbose: bool,

    /// DNS server endpoint (`host:port`) used for lookup checks.
    ///
    /// Without one, DNS checks report themselves as not testable.
    #[serde(default)]
    pub dns_server: Option<String>,
}

fn default_await_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_lookup_timeout() -> Duration {
    Duration::from_secs(420)
}

fn default_polling_period() -> Duration {
    Duration::from_millis(200)
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            await_timeout: default_await_timeout(),
            lookup_timeout: default_lookup_timeout(),
            polling_period: default_polling_period(),
            namespace: default_namespace(),
            verbose: default_true(),
            dns_server: None,
        }
    }
}

impl HarnessConfig {
    /// Largest accepted `await_timeout` or `lookup_timeout`.
    pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

    /// Creates the default configuration with the given DNS server endpoint.
    #[must_use]
    pub fn with_dns_server(dns_server: impl Into<String>) -> Self {
        Self {
            dns_server: Some(dns_server.into()),
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.polling_period.is_zero() {
            return Err(ConvergeError::config("polling_period must be positive"));
        }
        if self.await_timeout > Self::MAX_TIMEOUT {
            return Err(ConvergeError::config(format!(
                "await_timeout must not exceed {}",
                humantime::format_duration(Self::MAX_TIMEOUT)
            )));
        }
        if self.lookup_timeout > Self::MAX_TIMEOUT {
            return Err(ConvergeError::config(format!(
                "lookup_timeout must not exceed {}",
                humantime::format_duration(Self::MAX_TIMEOUT)
            )));
        }
        if self.polling_period > self.await_timeout {
            return Err(ConvergeError::config(
                "polling_period must not exceed await_timeout",
            ));
        }
        if self.polling_period > self.lookup_timeout {
            return Err(ConvergeError::config(
                "polling_period must not exceed lookup_timeout",
            ));
        }
        if self.namespace.is_empty() {
            return Err(ConvergeError::config("namespace cannot be empty"));
        }
        if let Some(server) = &self.dns_server {
            if server.trim().is_empty() {
                return Err(ConvergeError::config("dns_server cannot be blank"));
            }
        }
        Ok(())
    }

    /// Returns the budget used for resource state checks.
    #[must_use]
    pub const fn await_budget(&self) -> Budget {
        Budget::new(self.await_timeout, self.polling_period)
    }

    /// Returns the budget used for DNS lookup checks.
    #[must_use]
    pub const fn lookup_budget(&self) -> Budget {
        Budget::new(self.lookup_timeout, self.polling_period)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConvergeError::config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ConvergeError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Time budget of a single convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Total time the check may take.
    pub timeout: Duration,
    /// Delay between two poll attempts.
    pub period: Duration,
}

impl Budget {
    /// Creates a new budget.
    #[must_use]
    pub const fn new(timeout: Duration, period: Duration) -> Self {
        Self { timeout, period }
    }

    /// Upper bound on the number of predicate invocations, ignoring the time
    /// the predicate itself takes.
    #[must_use]
    pub fn max_attempts(&self) -> u128 {
        if self.period.is_zero() {
            return u128::MAX;
        }
        self.timeout.as_nanos().div_ceil(self.period.as_nanos())
    }
}

/// Serde helper for humantime durations.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as a human-readable string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    /// Deserializes a duration from a human-readable string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
