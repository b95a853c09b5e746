//! Logical scope keys.

use std::fmt;

use serde::Serialize;
use ulid::Ulid;

/// Identity of one logical unit of work.
///
/// Every layer that takes part in the same unit of work is handed the same
/// key; the context store binds at most one connection to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ScopeKey(Ulid);

impl ScopeKey {
    /// Create a fresh key.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get the underlying ULID.
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for ScopeKey {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Ulid> for ScopeKey {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}
