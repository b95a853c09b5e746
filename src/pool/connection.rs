//! Connection pooling over any data source.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ConfigResult, DataSourceConfig};
use crate::driver::{
    Connection, ConnectionId, CursorId, DataSource, Row, StatementId, Value, VendorError,
    VendorResult, SQL_STATE_CONNECTION_UNAVAILABLE,
};

/// Vendor code of the error raised when no connection becomes free in time.
pub const CONNECTION_NOT_AVAILABLE: i32 = 90117;

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Physical connections currently owned by the pool (idle + active).
    pub created: usize,
    pub idle: usize,
    pub active: usize,
    /// Total successful `get_connection` calls.
    pub acquired: u64,
    /// Total connections handed back.
    pub returned: u64,
}

#[derive(Debug, Default)]
struct PoolState {
    idle: VecDeque<Box<dyn Connection>>,
    created: usize,
    active: usize,
    closed: bool,
}

#[derive(Debug)]
struct PoolInner {
    config: DataSourceConfig,
    source: Arc<dyn DataSource>,
    state: Mutex<PoolState>,
    available: Condvar,
    acquired: AtomicU64,
    returned: AtomicU64,
}

impl PoolInner {
    fn unavailable(&self) -> VendorError {
        VendorError::with_sql_state(
            CONNECTION_NOT_AVAILABLE,
            SQL_STATE_CONNECTION_UNAVAILABLE,
            format!(
                "{} - Connection is not available, request timed out after {}ms",
                self.config.pool_name, self.config.connection_timeout
            ),
        )
    }

    fn checkout(
        self: &Arc<Self>,
        state: &mut MutexGuard<'_, PoolState>,
        conn: Box<dyn Connection>,
    ) -> PooledConnection {
        state.active += 1;
        self.acquired.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "txsync::pool",
            pool = %self.config.pool_name,
            connection = %conn.id(),
            active = state.active,
            "connection checked out"
        );
        PooledConnection {
            id: conn.id(),
            conn: Some(conn),
            pool: Arc::clone(self),
        }
    }

    /// Take a connection back. A connection still inside a transaction is
    /// rolled back and reset; one that cannot be reset is thrown away.
    fn restore(&self, mut conn: Box<dyn Connection>) {
        self.returned.fetch_add(1, Ordering::Relaxed);

        let mut usable = true;
        if !conn.auto_commit() {
            warn!(
                target: "txsync::pool",
                pool = %self.config.pool_name,
                connection = %conn.id(),
                "connection returned with auto-commit off, rolling back"
            );
            if let Err(e) = conn.rollback().and_then(|_| conn.set_auto_commit(true)) {
                warn!(
                    target: "txsync::pool",
                    connection = %conn.id(),
                    error = %e,
                    "could not reset returned connection, discarding it"
                );
                usable = false;
            }
        }

        let discard = {
            let mut state = self.state.lock();
            state.active = state.active.saturating_sub(1);
            let discard = if usable && !state.closed {
                state.idle.push_back(conn);
                None
            } else {
                state.created = state.created.saturating_sub(1);
                Some(conn)
            };
            self.available.notify_one();
            discard
        };

        if let Some(conn) = discard {
            let id = conn.id();
            if let Err(e) = conn.close() {
                warn!(
                    target: "txsync::pool",
                    connection = %id,
                    error = %e,
                    "failed to close discarded connection"
                );
            }
        }
    }
}

/// A bounded pool of physical connections.
///
/// Cloning the pool is cheap; all clones share the same connections.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool in front of `source`. Connections are opened lazily.
    pub fn new(config: DataSourceConfig, source: Arc<dyn DataSource>) -> ConfigResult<Self> {
        config.validate()?;
        debug!(
            target: "txsync::pool",
            pool = %config.pool_name,
            url = %config.url,
            maximum_pool_size = config.maximum_pool_size,
            "pool created"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                source,
                state: Mutex::new(PoolState::default()),
                available: Condvar::new(),
                acquired: AtomicU64::new(0),
                returned: AtomicU64::new(0),
            }),
        })
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &DataSourceConfig {
        &self.inner.config
    }

    /// Get a connection, waiting up to `connection_timeout` when every
    /// connection is in use.
    pub fn get_connection(&self) -> VendorResult<PooledConnection> {
        let deadline = Instant::now() + self.inner.config.connection_timeout_duration();
        let mut state = self.inner.state.lock();

        loop {
            if state.closed {
                return Err(self.inner.unavailable());
            }

            if let Some(conn) = state.idle.pop_back() {
                return Ok(self.inner.checkout(&mut state, conn));
            }

            if state.created < self.inner.config.maximum_pool_size {
                // Reserve the slot, then dial without holding the lock.
                state.created += 1;
                let opened =
                    MutexGuard::unlocked(&mut state, || self.inner.source.get_connection());
                match opened {
                    Ok(conn) => {
                        debug!(
                            target: "txsync::pool",
                            pool = %self.inner.config.pool_name,
                            connection = %conn.id(),
                            created = state.created,
                            "physical connection opened"
                        );
                        return Ok(self.inner.checkout(&mut state, conn));
                    }
                    Err(e) => {
                        state.created -= 1;
                        self.inner.available.notify_one();
                        return Err(e);
                    }
                }
            }

            if self.inner.available.wait_until(&mut state, deadline).timed_out() {
                warn!(
                    target: "txsync::pool",
                    pool = %self.inner.config.pool_name,
                    active = state.active,
                    "timed out waiting for a connection"
                );
                return Err(self.inner.unavailable());
            }
        }
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            created: state.created,
            idle: state.idle.len(),
            active: state.active,
            acquired: self.inner.acquired.load(Ordering::Relaxed),
            returned: self.inner.returned.load(Ordering::Relaxed),
        }
    }

    /// Close every idle connection and refuse new requests. Connections
    /// still checked out are closed when they come back.
    pub fn shutdown(&self) {
        let drained: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.created -= drained.len();
            self.inner.available.notify_all();
            drained
        };

        debug!(
            target: "txsync::pool",
            pool = %self.inner.config.pool_name,
            closing = drained.len(),
            "pool shut down"
        );
        for conn in drained {
            let id = conn.id();
            if let Err(e) = conn.close() {
                warn!(
                    target: "txsync::pool",
                    connection = %id,
                    error = %e,
                    "failed to close idle connection"
                );
            }
        }
    }
}

impl DataSource for ConnectionPool {
    fn get_connection(&self) -> VendorResult<Box<dyn Connection>> {
        Ok(Box::new(ConnectionPool::get_connection(self)?))
    }

    fn vendor(&self) -> &str {
        self.inner.source.vendor()
    }
}

/// A connection on loan from a [`ConnectionPool`].
///
/// `close` and `Drop` both hand the physical connection back.
pub struct PooledConnection {
    id: ConnectionId,
    conn: Option<Box<dyn Connection>>,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    fn inner(&mut self) -> VendorResult<&mut (dyn Connection + 'static)> {
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(VendorError::connection_closed("pooled connection")),
        }
    }

    fn give_back(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.restore(conn);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("pool", &self.pool.config.pool_name)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl Connection for PooledConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn auto_commit(&self) -> bool {
        self.conn.as_ref().map_or(true, |c| c.auto_commit())
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> VendorResult<()> {
        self.inner()?.set_auto_commit(auto_commit)
    }

    fn prepare(&mut self, sql: &str) -> VendorResult<StatementId> {
        self.inner()?.prepare(sql)
    }

    fn execute_update(&mut self, statement: StatementId, params: &[Value]) -> VendorResult<usize> {
        self.inner()?.execute_update(statement, params)
    }

    fn execute_query(
        &mut self,
        statement: StatementId,
        params: &[Value],
    ) -> VendorResult<CursorId> {
        self.inner()?.execute_query(statement, params)
    }

    fn next_row(&mut self, cursor: CursorId) -> VendorResult<Option<Row>> {
        self.inner()?.next_row(cursor)
    }

    fn close_cursor(&mut self, cursor: CursorId) -> VendorResult<()> {
        self.inner()?.close_cursor(cursor)
    }

    fn close_statement(&mut self, statement: StatementId) -> VendorResult<()> {
        self.inner()?.close_statement(statement)
    }

    fn commit(&mut self) -> VendorResult<()> {
        self.inner()?.commit()
    }

    fn rollback(&mut self) -> VendorResult<()> {
        self.inner()?.rollback()
    }

    fn close(mut self: Box<Self>) -> VendorResult<()> {
        self.give_back();
        Ok(())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.give_back();
    }
}
