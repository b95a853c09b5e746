//! Identifiers and row types shared by every driver.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A single column value. Drivers exchange values as JSON.
pub type Value = serde_json::Value;

/// A row as a map of column name to value.
pub type Row = BTreeMap<String, Value>;

/// Identity of one physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw numeric id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn{}", self.0)
    }
}

/// A prepared statement, valid only on the connection that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementId(u32);

impl StatementId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt{}", self.0)
    }
}

/// An open result cursor, valid only on the connection that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId(u32);

impl CursorId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor{}", self.0)
    }
}
