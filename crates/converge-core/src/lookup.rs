//! Comparison of DNS lookup results against an expectation.

use std::collections::BTreeSet;
use std::fmt;

/// Which record set a lookup check resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    /// Host addresses (A and AAAA records).
    Host,
    /// TXT record strings.
    Txt,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Txt => f.write_str("TXT"),
        }
    }
}

/// Returns true if `actual` and `expected` hold the same distinct values,
/// ignoring order. Neither extra nor missing values are tolerated.
#[must_use]
pub fn same_values<A: AsRef<str>, E: AsRef<str>>(actual: &[A], expected: &[E]) -> bool {
    let actual: BTreeSet<&str> = actual.iter().map(AsRef::as_ref).collect();
    let expected: BTreeSet<&str> = expected.iter().map(AsRef::as_ref).collect();
    actual == expected
}

/// Description of a lookup check, used in timeout reports.
#[must_use]
pub fn describe_lookup<E: AsRef<str>>(kind: LookupKind, name: &str, expected: &[E]) -> String {
    let expected: Vec<&str> = expected.iter().map(AsRef::as_ref).collect();
    format!("{kind} lookup of {name} not {expected:?}")
}
