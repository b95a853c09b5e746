//! Connection-plus-cursors bundle with exactly-once release.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::driver::{
    Connection, ConnectionId, CursorId, DataSource, Row, StatementId, Value, VendorError,
    VendorResult,
};
use crate::transaction::error::{ReleaseError, ReleaseFailure, ReleaseResult, ReleaseStep};

/// One physical connection and the statements and cursors opened on it.
///
/// The handle remembers the auto-commit mode the connection had when it was
/// acquired and whether it started a local transaction, so [`release`]
/// can put the connection back the way it found it before closing it.
///
/// [`release`]: ResourceHandle::release
pub struct ResourceHandle {
    id: ConnectionId,
    conn: Option<Box<dyn Connection>>,
    statements: Vec<StatementId>,
    cursors: Vec<CursorId>,
    original_auto_commit: bool,
    tx_open: bool,
    rollback_only: bool,
    acquired_at: DateTime<Utc>,
}

impl ResourceHandle {
    /// Obtain a fresh connection from `source`.
    pub fn acquire(source: &dyn DataSource) -> VendorResult<Self> {
        let conn = source.get_connection()?;
        Ok(Self::from_connection(conn))
    }

    /// Take ownership of an already open connection.
    pub fn from_connection(conn: Box<dyn Connection>) -> Self {
        let handle = Self {
            id: conn.id(),
            original_auto_commit: conn.auto_commit(),
            conn: Some(conn),
            statements: Vec::new(),
            cursors: Vec::new(),
            tx_open: false,
            rollback_only: false,
            acquired_at: Utc::now(),
        };
        debug!(target: "txsync::handle", connection = %handle.id, "handle acquired");
        handle
    }

    /// Get the id of the underlying connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// False once the handle has been released.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Get the connection's auto-commit mode. False once released.
    pub fn auto_commit(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.auto_commit())
    }

    /// When the handle was acquired.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Whether a local transaction started by this handle is still open.
    pub fn in_transaction(&self) -> bool {
        self.tx_open
    }

    /// Number of statements not yet closed.
    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    /// Number of cursors not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.cursors.len()
    }

    fn conn(&mut self) -> VendorResult<&mut (dyn Connection + 'static)> {
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(VendorError::connection_closed(&format!("resource handle {}", self.id))),
        }
    }

    /// Turn auto-commit off, opening a local transaction.
    pub fn begin_transaction(&mut self) -> VendorResult<()> {
        let conn = self.conn()?;
        if conn.auto_commit() {
            conn.set_auto_commit(false)?;
        }
        self.tx_open = true;
        self.rollback_only = false;
        Ok(())
    }

    /// Commit the local transaction. On failure the transaction stays open.
    pub fn commit(&mut self) -> VendorResult<()> {
        self.conn()?.commit()?;
        self.tx_open = false;
        Ok(())
    }

    /// Roll back the local transaction and clear the rollback-only flag.
    pub fn rollback(&mut self) -> VendorResult<()> {
        self.conn()?.rollback()?;
        self.tx_open = false;
        self.rollback_only = false;
        Ok(())
    }

    /// Flag the transaction so that its owner rolls back instead of
    /// committing.
    pub fn mark_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    /// Check whether a participant asked for a rollback.
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Prepare `sql`. The statement is tracked until closed or released.
    pub fn prepare(&mut self, sql: &str) -> VendorResult<StatementId> {
        let statement = self.conn()?.prepare(sql)?;
        self.statements.push(statement);
        Ok(statement)
    }

    /// Execute a prepared data-modifying statement.
    pub fn execute_update(
        &mut self,
        statement: StatementId,
        params: &[Value],
    ) -> VendorResult<usize> {
        self.conn()?.execute_update(statement, params)
    }

    /// Execute a prepared query. The cursor is tracked until closed or released.
    pub fn execute_query(
        &mut self,
        statement: StatementId,
        params: &[Value],
    ) -> VendorResult<CursorId> {
        let cursor = self.conn()?.execute_query(statement, params)?;
        self.cursors.push(cursor);
        Ok(cursor)
    }

    /// Fetch the next row from `cursor`.
    pub fn next_row(&mut self, cursor: CursorId) -> VendorResult<Option<Row>> {
        self.conn()?.next_row(cursor)
    }

    /// Close `cursor` and stop tracking it.
    pub fn close_cursor(&mut self, cursor: CursorId) -> VendorResult<()> {
        self.cursors.retain(|c| *c != cursor);
        self.conn()?.close_cursor(cursor)
    }

    /// Close `statement` and stop tracking it.
    pub fn close_statement(&mut self, statement: StatementId) -> VendorResult<()> {
        self.statements.retain(|s| *s != statement);
        self.conn()?.close_statement(statement)
    }

    /// Prepare, execute and close a data-modifying statement.
    pub fn update(&mut self, sql: &str, params: &[Value]) -> VendorResult<usize> {
        let statement = self.prepare(sql)?;
        let result = self.execute_update(statement, params);
        let closed = self.close_statement(statement);
        let affected = result?;
        closed?;
        Ok(affected)
    }

    /// Prepare and run a query, collecting every row. The cursor and the
    /// statement are closed before returning.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> VendorResult<Vec<Row>> {
        let statement = self.prepare(sql)?;
        let result = self.fetch_all(statement, params);
        let closed = self.close_statement(statement);
        let rows = result?;
        closed?;
        Ok(rows)
    }

    fn fetch_all(&mut self, statement: StatementId, params: &[Value]) -> VendorResult<Vec<Row>> {
        let cursor = self.execute_query(statement, params)?;
        let mut rows = Vec::new();
        let drained = loop {
            match self.next_row(cursor) {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        let closed = self.close_cursor(cursor);
        drained?;
        closed?;
        Ok(rows)
    }

    /// Release every resource and close the connection.
    ///
    /// Steps run in order: close cursors (newest first), close statements,
    /// roll back a transaction this handle left open, restore the original
    /// auto-commit mode, close the connection. A failing step does not stop
    /// the ones after it; all failures are reported together. The one
    /// exception: when the rollback fails, auto-commit is left off and the
    /// connection is closed with the work still uncommitted. Releasing an
    /// already released handle does nothing.
    pub fn release(&mut self) -> ReleaseResult {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        let mut failures = Vec::new();
        let mut record = |step: ReleaseStep, result: VendorResult<()>| {
            if let Err(source) = result {
                warn!(
                    target: "txsync::handle",
                    connection = %self.id,
                    step = %step,
                    error = %source,
                    "release step failed"
                );
                failures.push(ReleaseFailure { step, source });
            }
        };

        for cursor in self.cursors.drain(..).rev() {
            record(ReleaseStep::CloseCursor, conn.close_cursor(cursor));
        }
        for statement in self.statements.drain(..).rev() {
            record(ReleaseStep::CloseStatement, conn.close_statement(statement));
        }
        let mut rolled_back = true;
        if self.tx_open {
            let result = conn.rollback();
            rolled_back = result.is_ok();
            record(ReleaseStep::Rollback, result);
            self.tx_open = false;
        }
        if conn.auto_commit() != self.original_auto_commit {
            // Turning auto-commit back on would commit the work the rollback left behind.
            let restored = if rolled_back {
                conn.set_auto_commit(self.original_auto_commit)
            } else {
                Err(VendorError::invalid_transaction_state(
                    "auto-commit not restored after failed rollback",
                ))
            };
            record(ReleaseStep::RestoreAutoCommit, restored);
        }
        record(ReleaseStep::CloseConnection, conn.close());

        debug!(
            target: "txsync::handle",
            connection = %self.id,
            failed_steps = failures.len(),
            "handle released"
        );
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ReleaseError { failures })
        }
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        if self.conn.is_some() {
            warn!(
                target: "txsync::handle",
                connection = %self.id,
                "handle dropped without release"
            );
            let _ = self.release();
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("in_transaction", &self.tx_open)
            .field("rollback_only", &self.rollback_only)
            .field("statements", &self.statements.len())
            .field("cursors", &self.cursors.len())
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}
