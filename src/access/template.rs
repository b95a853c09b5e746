//! Statement execution with translated errors.

use crate::access::utils::ConnectionUtils;
use crate::dao::{DaoResult, DataAccessError};
use crate::driver::{Row, Value};
use crate::transaction::{ScopeKey, TransactionManager};

/// Runs SQL on the scope's connection.
///
/// Inside a transaction every call uses the bound connection; outside one
/// each call gets its own auto-commit connection and releases it. Vendor
/// failures come back translated, with the statement verb as the
/// operation name.
#[derive(Debug, Clone)]
pub struct SqlTemplate {
    utils: ConnectionUtils,
}

impl SqlTemplate {
    /// Create a template over the given connection lookup.
    pub fn new(utils: ConnectionUtils) -> Self {
        Self { utils }
    }

    /// Create a template that shares the manager's data source, store and translator.
    pub fn from_manager(manager: &TransactionManager) -> Self {
        Self::new(ConnectionUtils::from_manager(manager))
    }

    /// Get a reference to the underlying connection lookup.
    pub fn utils(&self) -> &ConnectionUtils {
        &self.utils
    }

    /// Execute an insert, update, delete or DDL statement.
    pub fn update(&self, scope: &ScopeKey, sql: &str, params: &[Value]) -> DaoResult<usize> {
        let translator = self.utils.translator();
        self.utils.with_connection(scope, |handle| {
            handle
                .update(sql, params)
                .map_err(|e| translator.translate(&operation_name(sql), sql, e))
        })
    }

    /// Execute a statement without parameters, ignoring the row count.
    pub fn execute(&self, scope: &ScopeKey, sql: &str) -> DaoResult<()> {
        self.update(scope, sql, &[]).map(|_| ())
    }

    /// Run a query and map every row.
    pub fn query<T, F>(
        &self,
        scope: &ScopeKey,
        sql: &str,
        params: &[Value],
        mut mapper: F,
    ) -> DaoResult<Vec<T>>
    where
        F: FnMut(&Row) -> DaoResult<T>,
    {
        let translator = self.utils.translator();
        let rows = self.utils.with_connection(scope, |handle| {
            handle
                .query(sql, params)
                .map_err(|e| translator.translate(&operation_name(sql), sql, e))
        })?;
        rows.iter().map(&mut mapper).collect()
    }

    /// Run a query expected to return exactly one row.
    pub fn query_for_object<T, F>(
        &self,
        scope: &ScopeKey,
        sql: &str,
        params: &[Value],
        mapper: F,
    ) -> DaoResult<T>
    where
        F: FnMut(&Row) -> DaoResult<T>,
    {
        let mut results = self.query(scope, sql, params, mapper)?;
        match results.len() {
            1 => Ok(results.remove(0)),
            0 => Err(DataAccessError::not_found(
                operation_name(sql),
                format!("no row returned by [{}]", sql),
            )),
            actual => Err(DataAccessError::IncorrectResultSize {
                operation: operation_name(sql),
                expected: 1,
                actual,
            }),
        }
    }
}

/// First keyword of the statement, lowercased.
fn operation_name(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .map_or_else(|| "execute".to_string(), str::to_ascii_lowercase)
}
