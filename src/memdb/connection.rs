//! Connections to an in-memory database.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::driver::{
    Connection, ConnectionId, CursorId, DataSource, Row, StatementId, Value, VendorError,
    VendorResult,
};
use crate::memdb::codes;
use crate::memdb::database::{self, BoundStatement, MemoryDatabase, Tables};
use crate::memdb::VENDOR;
use crate::sql::{ParseError, Parser, Statement};

/// Private state of an open local transaction: a working copy of the
/// tables plus every write applied to it, in order.
#[derive(Debug)]
struct WorkingSet {
    tables: Tables,
    log: Vec<BoundStatement>,
}

/// A physical connection to a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    id: ConnectionId,
    db: Arc<MemoryDatabase>,
    auto_commit: bool,
    working: Option<WorkingSet>,
    statements: HashMap<StatementId, Statement>,
    cursors: HashMap<CursorId, VecDeque<Row>>,
    next_object: u32,
}

impl MemoryConnection {
    pub(crate) fn new(id: ConnectionId, db: Arc<MemoryDatabase>) -> Self {
        Self {
            id,
            db,
            auto_commit: true,
            working: None,
            statements: HashMap::new(),
            cursors: HashMap::new(),
            next_object: 0,
        }
    }

    /// Whether a local transaction has uncommitted writes.
    pub fn has_pending_changes(&self) -> bool {
        self.working.as_ref().is_some_and(|w| !w.log.is_empty())
    }

    fn next_object(&mut self) -> u32 {
        self.next_object += 1;
        self.next_object
    }

    fn statement(&self, id: StatementId) -> VendorResult<Statement> {
        self.statements
            .get(&id)
            .cloned()
            .ok_or_else(|| object_closed(id))
    }

    fn working_set(&mut self) -> &mut WorkingSet {
        let db = &self.db;
        self.working.get_or_insert_with(|| WorkingSet {
            tables: db.snapshot(),
            log: Vec::new(),
        })
    }

    fn check_parameters(statement: &Statement, params: &[Value]) -> VendorResult<()> {
        let expected = statement.parameter_count();
        if params.len() < expected {
            return Err(database::parameter_not_set(params.len()));
        }
        Ok(())
    }
}

fn object_closed(object: impl std::fmt::Display) -> VendorError {
    VendorError::new(
        codes::OBJECT_CLOSED,
        format!("The object is already closed: {}", object),
    )
}

fn translate_parse_error(sql: &str, err: ParseError) -> VendorError {
    let code = if err.is_syntax() {
        codes::SYNTAX_ERROR
    } else {
        codes::UNSUPPORTED_SYNTAX
    };
    VendorError::new(code, format!("Syntax error in SQL statement \"{}\"; {}", sql, err))
}

impl Connection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> VendorResult<()> {
        if auto_commit && !self.auto_commit {
            self.commit()?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn prepare(&mut self, sql: &str) -> VendorResult<StatementId> {
        let statement = Parser::parse(sql).map_err(|e| translate_parse_error(sql, e))?;
        let id = StatementId::new(self.next_object());
        self.statements.insert(id, statement);
        Ok(id)
    }

    fn execute_update(&mut self, statement: StatementId, params: &[Value]) -> VendorResult<usize> {
        let statement = self.statement(statement)?;
        if statement.is_query() {
            return Err(VendorError::new(
                codes::METHOD_NOT_ALLOWED_FOR_QUERY,
                "Method is not allowed for a query",
            ));
        }
        Self::check_parameters(&statement, params)?;

        let bound = BoundStatement {
            statement,
            params: params.to_vec(),
        };

        if self.auto_commit {
            return self.db.apply(std::slice::from_ref(&bound));
        }

        let working = self.working_set();
        let mut next = working.tables.clone();
        let affected = database::execute_write(&mut next, &bound.statement, &bound.params)?;
        working.tables = next;
        working.log.push(bound);
        Ok(affected)
    }

    fn execute_query(
        &mut self,
        statement: StatementId,
        params: &[Value],
    ) -> VendorResult<CursorId> {
        let statement = self.statement(statement)?;
        Self::check_parameters(&statement, params)?;
        let select = match statement {
            Statement::Select(select) => select,
            _ => {
                return Err(VendorError::new(
                    codes::METHOD_ONLY_ALLOWED_FOR_QUERY,
                    "Method is only allowed for a query",
                ))
            }
        };

        let rows = if self.auto_commit {
            self.db.query(&select, params)?
        } else {
            database::execute_query(&self.working_set().tables, &select, params)?
        };

        let id = CursorId::new(self.next_object());
        self.cursors.insert(id, rows.into());
        Ok(id)
    }

    fn next_row(&mut self, cursor: CursorId) -> VendorResult<Option<Row>> {
        self.cursors
            .get_mut(&cursor)
            .map(VecDeque::pop_front)
            .ok_or_else(|| object_closed(cursor))
    }

    fn close_cursor(&mut self, cursor: CursorId) -> VendorResult<()> {
        self.cursors.remove(&cursor);
        Ok(())
    }

    fn close_statement(&mut self, statement: StatementId) -> VendorResult<()> {
        self.statements.remove(&statement);
        Ok(())
    }

    fn commit(&mut self) -> VendorResult<()> {
        if let Some(working) = self.working.take() {
            if !working.log.is_empty() {
                self.db.apply(&working.log)?;
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> VendorResult<()> {
        self.working = None;
        Ok(())
    }

    fn close(self: Box<Self>) -> VendorResult<()> {
        // uncommitted work dies with the connection
        self.db.mark_closed(self.id);
        Ok(())
    }
}

/// A data source that dials a fresh connection on every request.
#[derive(Debug, Clone)]
pub struct MemoryDataSource {
    db: Arc<MemoryDatabase>,
}

impl MemoryDataSource {
    /// Create a data source over `db`.
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self { db }
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Arc<MemoryDatabase> {
        &self.db
    }
}

impl DataSource for MemoryDataSource {
    fn get_connection(&self) -> VendorResult<Box<dyn Connection>> {
        Ok(Box::new(self.db.connect()))
    }

    fn vendor(&self) -> &str {
        VENDOR
    }
}
