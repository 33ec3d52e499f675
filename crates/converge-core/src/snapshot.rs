//! Resource state snapshots.
//!
//! A snapshot maps resource names to their observed `status.state`. It is
//! built fresh from query output on every poll and thrown away right after
//! the comparison; a name missing from the snapshot means the resource does
//! not exist in the store.

use std::collections::BTreeMap;
use std::fmt;

/// Kind tag of an observed resource, as understood by the query provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind(String);

impl ResourceKind {
    /// DNS provider resources.
    pub const PROVIDER: &'static str = "dnspr";
    /// DNS entry resources.
    pub const ENTRY: &'static str = "dnse";

    /// Creates a kind from its short name.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// DNS provider kind.
    #[must_use]
    pub fn provider() -> Self {
        Self::new(Self::PROVIDER)
    }

    /// DNS entry kind.
    #[must_use]
    pub fn entry() -> Self {
        Self::new(Self::ENTRY)
    }

    /// Returns the short name passed to the query provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// State a check waits for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpectedState {
    /// The resource must exist with exactly this state label.
    State(String),
    /// The resource must be absent.
    Deleted,
}

impl ExpectedState {
    /// Label shown in messages for the deleted sentinel.
    pub const DELETED_LABEL: &'static str = "~DELETED~";

    /// The `Ready` state.
    #[must_use]
    pub fn ready() -> Self {
        Self::State("Ready".to_string())
    }

    /// The `Error` state.
    #[must_use]
    pub fn error() -> Self {
        Self::State("Error".to_string())
    }

    /// The deleted sentinel.
    #[must_use]
    pub const fn deleted() -> Self {
        Self::Deleted
    }

    /// Creates an expectation for an arbitrary state label.
    #[must_use]
    pub fn state(label: impl Into<String>) -> Self {
        Self::State(label.into())
    }

    /// Returns true if `observed` (the state of one name, `None` when the name
    /// is absent) meets this expectation.
    #[must_use]
    pub fn matches(&self, observed: Option<&str>) -> bool {
        match self {
            Self::Deleted => observed.is_none(),
            Self::State(expected) => observed == Some(expected.as_str()),
        }
    }
}

impl fmt::Display for ExpectedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(label) => f.write_str(label),
            Self::Deleted => f.write_str(Self::DELETED_LABEL),
        }
    }
}

/// Observed states of one poll, keyed by resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    states: BTreeMap<String, String>,
}

impl StateSnapshot {
    /// Returns the observed state of `name`, or `None` if it is absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.states.get(name).map(String::as_str)
    }

    /// Returns true if `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// Number of resources observed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if no resource was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Returns true if every name in `names` meets `expected` in this
    /// snapshot. An empty name list is trivially satisfied.
    #[must_use]
    pub fn satisfies<S: AsRef<str>>(&self, expected: &ExpectedState, names: &[S]) -> bool {
        names
            .iter()
            .all(|name| expected.matches(self.get(name.as_ref())))
    }

    /// Names from `names` that do not yet meet `expected`.
    #[must_use]
    pub fn pending<'a, S: AsRef<str>>(
        &self,
        expected: &ExpectedState,
        names: &'a [S],
    ) -> Vec<&'a str> {
        names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !expected.matches(self.get(name)))
            .collect()
    }

    /// Iterates over `(name, state)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.states.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            states: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parses `name=state` lines into a snapshot.
///
/// Lines that do not split into exactly two fields on `=` are skipped. A name
/// seen on several lines keeps the state of the last one.
#[must_use]
pub fn parse_states(raw: &str) -> StateSnapshot {
    let mut states = BTreeMap::new();
    for line in raw.split('\n') {
        let mut cols = line.split('=');
        if let (Some(name), Some(state), None) = (cols.next(), cols.next(), cols.next()) {
            states.insert(name.to_string(), state.to_string());
        }
    }
    StateSnapshot { states }
}

/// Human-readable description of a state check, used in timeout reports.
#[must_use]
pub fn describe_state_check<S: AsRef<str>>(
    kind: &ResourceKind,
    expected: &ExpectedState,
    names: &[S],
) -> String {
    let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    format!("{kind} not {expected}: {names:?}")
}
