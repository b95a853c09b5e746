//! Low-level connection contract.
//!
//! Everything above this module reaches the backing store through two traits:
//! [`DataSource`] hands out physical connections and [`Connection`] runs
//! statements on one of them. Any SQL-capable transactional store can sit
//! behind these traits; the crate ships an in-memory one in [`crate::memdb`].
//!
//! Statements and cursors are addressed by id rather than borrowed from the
//! connection, so a connection can be stored, shared behind a lock and
//! released without lifetime gymnastics.
//!
//! ```text
//!   DataSource ──get_connection()──► Connection
//!                                      │ prepare(sql)        → StatementId
//!                                      │ execute_query(stmt) → CursorId
//!                                      │ next_row(cursor)    → Row
//!                                      ▼
//!                           commit / rollback / close
//! ```

mod error;
mod types;

use std::fmt;

pub use error::{
    VendorError, VendorResult, SQL_STATE_CONNECTION_CLOSED, SQL_STATE_CONNECTION_UNAVAILABLE,
    SQL_STATE_INVALID_TRANSACTION_STATE,
};
pub use types::{ConnectionId, CursorId, Row, StatementId, Value};

/// One physical connection to a backing store.
///
/// A fresh connection starts in auto-commit mode: each statement is committed
/// as soon as it executes. Turning auto-commit off starts a local transaction
/// that lasts until [`commit`](Connection::commit) or
/// [`rollback`](Connection::rollback).
pub trait Connection: Send + fmt::Debug {
    /// Identity of the physical connection.
    fn id(&self) -> ConnectionId;

    /// Whether statements are committed individually.
    fn auto_commit(&self) -> bool;

    /// Switch auto-commit mode.
    ///
    /// Turning auto-commit back on while a transaction has pending work
    /// commits that work.
    fn set_auto_commit(&mut self, auto_commit: bool) -> VendorResult<()>;

    /// Prepare a statement. `?` marks a positional parameter.
    fn prepare(&mut self, sql: &str) -> VendorResult<StatementId>;

    /// Execute a data-modifying or DDL statement; returns affected rows.
    fn execute_update(&mut self, statement: StatementId, params: &[Value]) -> VendorResult<usize>;

    /// Execute a query and open a cursor over its rows.
    fn execute_query(&mut self, statement: StatementId, params: &[Value]) -> VendorResult<CursorId>;

    /// Advance a cursor.
    fn next_row(&mut self, cursor: CursorId) -> VendorResult<Option<Row>>;

    fn close_cursor(&mut self, cursor: CursorId) -> VendorResult<()>;

    fn close_statement(&mut self, statement: StatementId) -> VendorResult<()>;

    /// Make all work since auto-commit was turned off permanent.
    fn commit(&mut self) -> VendorResult<()>;

    /// Discard all work since auto-commit was turned off.
    fn rollback(&mut self) -> VendorResult<()>;

    /// Give the connection back to where it came from: a pool or the OS.
    fn close(self: Box<Self>) -> VendorResult<()>;
}

/// A factory of physical connections.
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Obtain a connection in auto-commit mode. May block.
    fn get_connection(&self) -> VendorResult<Box<dyn Connection>>;

    /// Identity of the backing store (`"MemDB"`, `"PostgreSQL"`, ...), used to
    /// select an error-code table.
    fn vendor(&self) -> &str;
}
