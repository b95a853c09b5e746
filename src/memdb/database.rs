//! Committed state of an in-memory database and the statement engine that
//! runs against it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::driver::{ConnectionId, Row, Value, VendorError, VendorResult};
use crate::memdb::codes;
use crate::memdb::connection::MemoryConnection;
use crate::sql::{
    ColumnDef, Condition, CreateTable, Delete, DropTable, Insert, Operand, Select, SelectColumn,
    Statement, Update,
};

pub(crate) type Tables = BTreeMap<String, Table>;

/// A statement together with the parameters it ran with.
#[derive(Debug, Clone)]
pub(crate) struct BoundStatement {
    pub statement: Statement,
    pub params: Vec<Value>,
}

/// One table: column definitions plus rows keyed by primary key.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: usize,
    rows: BTreeMap<String, Row>,
}

impl Table {
    fn new(create: &CreateTable) -> VendorResult<Self> {
        let keys: Vec<usize> = create
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();

        match keys.as_slice() {
            [primary_key] => Ok(Self {
                name: create.name.clone(),
                columns: create.columns.clone(),
                primary_key: *primary_key,
                rows: BTreeMap::new(),
            }),
            _ => Err(VendorError::new(
                codes::FEATURE_NOT_SUPPORTED,
                format!(
                    "Feature not supported: table \"{}\" must declare exactly one PRIMARY KEY column",
                    create.name
                ),
            )),
        }
    }

    fn column(&self, name: &str) -> VendorResult<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| column_not_found(name))
    }

    fn primary_key_name(&self) -> &str {
        &self.columns[self.primary_key].name
    }

    fn empty_row(&self) -> Row {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), Value::Null))
            .collect()
    }

    fn check_row(&self, row: &Row) -> VendorResult<()> {
        for column in &self.columns {
            let value = row.get(&column.name).unwrap_or(&Value::Null);
            if value.is_null() && column.not_null {
                return Err(VendorError::new(
                    codes::NULL_NOT_ALLOWED,
                    format!("NULL not allowed for column \"{}\"", column.name.to_uppercase()),
                ));
            }
            if !column.data_type.accepts(value) {
                return Err(VendorError::new(
                    codes::DATA_CONVERSION_ERROR,
                    format!(
                        "Data conversion error converting {} for column \"{}\"",
                        value,
                        column.name.to_uppercase()
                    ),
                ));
            }
        }
        Ok(())
    }

    fn key_of(&self, row: &Row) -> VendorResult<String> {
        match row.get(self.primary_key_name()) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Null) | None => Err(VendorError::new(
                codes::NULL_NOT_ALLOWED,
                format!(
                    "NULL not allowed for column \"{}\"",
                    self.primary_key_name().to_uppercase()
                ),
            )),
            Some(other) => Ok(other.to_string()),
        }
    }

    fn duplicate_key(&self, key: &str) -> VendorError {
        VendorError::new(
            codes::DUPLICATE_KEY,
            format!(
                "Unique index or primary key violation: \"PRIMARY KEY ON {}({}) VALUES ('{}')\"",
                self.name.to_uppercase(),
                self.primary_key_name().to_uppercase(),
                key
            ),
        )
    }

    fn matching_keys(&self, filter: &[(String, Value)]) -> Vec<String> {
        self.rows
            .iter()
            .filter(|(_, row)| filter.iter().all(|(column, value)| row.get(column) == Some(value)))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// An in-memory transactional database.
///
/// Committed tables live behind a lock; each connection works on its own
/// copy while a transaction is open and replays its statements here on
/// commit.
#[derive(Debug)]
pub struct MemoryDatabase {
    name: String,
    tables: RwLock<Tables>,
    next_connection: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
}

impl MemoryDatabase {
    /// Create an empty database.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            tables: RwLock::new(Tables::new()),
            next_connection: AtomicU64::new(0),
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
        })
    }

    /// Get the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dial a new physical connection.
    pub fn connect(self: &Arc<Self>) -> MemoryConnection {
        let id = ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed) + 1);
        self.opened.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "txsync::memdb",
            database = %self.name,
            connection = %id,
            "connection opened"
        );
        MemoryConnection::new(id, Arc::clone(self))
    }

    /// Physical connections dialed so far.
    pub fn connections_opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Physical connections closed so far.
    pub fn connections_closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    /// Names of all committed tables.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Committed rows of a table in key order, or `None` if it doesn't exist.
    pub fn committed_rows(&self, table: &str) -> Option<Vec<Row>> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
    }

    pub(crate) fn mark_closed(&self, id: ConnectionId) {
        self.closed.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "txsync::memdb",
            database = %self.name,
            connection = %id,
            "connection closed"
        );
    }

    pub(crate) fn snapshot(&self) -> Tables {
        self.tables.read().clone()
    }

    pub(crate) fn query(&self, select: &Select, params: &[Value]) -> VendorResult<Vec<Row>> {
        execute_query(&self.tables.read(), select, params)
    }

    /// Apply statements in order, all or nothing. Returns total affected rows.
    pub(crate) fn apply(&self, statements: &[BoundStatement]) -> VendorResult<usize> {
        let mut tables = self.tables.write();
        let mut next = tables.clone();
        let mut affected = 0;
        for bound in statements {
            affected += execute_write(&mut next, &bound.statement, &bound.params)?;
        }
        *tables = next;
        Ok(affected)
    }
}

/// Run a data-modifying or DDL statement.
///
/// Callers pass a scratch copy; on error the copy is partially modified and
/// must be discarded.
pub(crate) fn execute_write(
    tables: &mut Tables,
    statement: &Statement,
    params: &[Value],
) -> VendorResult<usize> {
    match statement {
        Statement::CreateTable(create) => create_table(tables, create),
        Statement::DropTable(drop) => drop_table(tables, drop),
        Statement::Insert(insert) => insert_rows(tables, insert, params),
        Statement::Update(update) => update_rows(tables, update, params),
        Statement::Delete(delete) => delete_rows(tables, delete, params),
        Statement::Select(_) => Err(VendorError::new(
            codes::METHOD_NOT_ALLOWED_FOR_QUERY,
            "Method is not allowed for a query",
        )),
    }
}

/// Run a SELECT.
pub(crate) fn execute_query(
    tables: &Tables,
    select: &Select,
    params: &[Value],
) -> VendorResult<Vec<Row>> {
    let table = tables.get(&select.from).ok_or_else(|| table_not_found(&select.from))?;
    let filter = resolve_filter(table, &select.filter, params)?;

    let projection: Option<Vec<&str>> = if select.columns.contains(&SelectColumn::Wildcard) {
        None
    } else {
        let names = select
            .columns
            .iter()
            .filter_map(|c| match c {
                SelectColumn::Column(name) => Some(name.as_str()),
                SelectColumn::Wildcard => None,
            })
            .collect::<Vec<_>>();
        for name in &names {
            table.column(name)?;
        }
        Some(names)
    };

    let rows = table
        .matching_keys(&filter)
        .iter()
        .filter_map(|key| table.rows.get(key))
        .map(|row| match &projection {
            None => row.clone(),
            Some(names) => names
                .iter()
                .map(|n| ((*n).to_string(), row.get(*n).cloned().unwrap_or(Value::Null)))
                .collect(),
        })
        .collect();
    Ok(rows)
}

fn create_table(tables: &mut Tables, create: &CreateTable) -> VendorResult<usize> {
    if tables.contains_key(&create.name) {
        if create.if_not_exists {
            return Ok(0);
        }
        return Err(VendorError::new(
            codes::TABLE_ALREADY_EXISTS,
            format!("Table \"{}\" already exists", create.name.to_uppercase()),
        ));
    }
    tables.insert(create.name.clone(), Table::new(create)?);
    Ok(0)
}

fn drop_table(tables: &mut Tables, drop: &DropTable) -> VendorResult<usize> {
    if tables.remove(&drop.name).is_none() && !drop.if_exists {
        return Err(table_not_found(&drop.name));
    }
    Ok(0)
}

fn insert_rows(tables: &mut Tables, insert: &Insert, params: &[Value]) -> VendorResult<usize> {
    let table = tables.get_mut(&insert.table).ok_or_else(|| table_not_found(&insert.table))?;

    let columns: Vec<String> = if insert.columns.is_empty() {
        table.columns.iter().map(|c| c.name.clone()).collect()
    } else {
        insert.columns.clone()
    };
    for column in &columns {
        table.column(column)?;
    }

    for operands in &insert.rows {
        if operands.len() != columns.len() {
            return Err(VendorError::new(
                codes::COLUMN_COUNT_DOES_NOT_MATCH,
                "Column count does not match",
            ));
        }

        let mut row = table.empty_row();
        for (column, operand) in columns.iter().zip(operands) {
            row.insert(column.clone(), resolve(operand, params)?);
        }
        table.check_row(&row)?;

        let key = table.key_of(&row)?;
        if table.rows.contains_key(&key) {
            return Err(table.duplicate_key(&key));
        }
        table.rows.insert(key, row);
    }

    Ok(insert.rows.len())
}

fn update_rows(tables: &mut Tables, update: &Update, params: &[Value]) -> VendorResult<usize> {
    let table = tables.get_mut(&update.table).ok_or_else(|| table_not_found(&update.table))?;

    let mut assignments = Vec::with_capacity(update.assignments.len());
    for assignment in &update.assignments {
        table.column(&assignment.column)?;
        assignments.push((assignment.column.clone(), resolve(&assignment.value, params)?));
    }
    let filter = resolve_filter(table, &update.filter, params)?;

    let keys = table.matching_keys(&filter);
    let mut updated = Vec::with_capacity(keys.len());
    for key in &keys {
        if let Some(mut row) = table.rows.remove(key) {
            for (column, value) in &assignments {
                row.insert(column.clone(), value.clone());
            }
            table.check_row(&row)?;
            updated.push(row);
        }
    }
    for row in updated {
        let key = table.key_of(&row)?;
        if table.rows.contains_key(&key) {
            return Err(table.duplicate_key(&key));
        }
        table.rows.insert(key, row);
    }

    Ok(keys.len())
}

fn delete_rows(tables: &mut Tables, delete: &Delete, params: &[Value]) -> VendorResult<usize> {
    let table = tables.get_mut(&delete.table).ok_or_else(|| table_not_found(&delete.table))?;
    let filter = resolve_filter(table, &delete.filter, params)?;

    let keys = table.matching_keys(&filter);
    for key in &keys {
        table.rows.remove(key);
    }
    Ok(keys.len())
}

fn resolve_filter(
    table: &Table,
    filter: &[Condition],
    params: &[Value],
) -> VendorResult<Vec<(String, Value)>> {
    filter
        .iter()
        .map(|c| {
            table.column(&c.column)?;
            Ok((c.column.clone(), resolve(&c.value, params)?))
        })
        .collect()
}

fn resolve(operand: &Operand, params: &[Value]) -> VendorResult<Value> {
    operand.resolve(params).ok_or_else(|| match operand {
        Operand::Parameter(i) => parameter_not_set(*i),
        Operand::Literal(_) => VendorError::new(codes::PARAMETER_NOT_SET, "Parameter is not set"),
    })
}

pub(crate) fn parameter_not_set(index: usize) -> VendorError {
    VendorError::new(
        codes::PARAMETER_NOT_SET,
        format!("Parameter \"#{}\" is not set", index + 1),
    )
}

fn table_not_found(name: &str) -> VendorError {
    VendorError::new(
        codes::TABLE_NOT_FOUND,
        format!("Table \"{}\" not found", name.to_uppercase()),
    )
}

fn column_not_found(name: &str) -> VendorError {
    VendorError::new(
        codes::COLUMN_NOT_FOUND,
        format!("Column \"{}\" not found", name.to_uppercase()),
    )
}
