//! Internal AST for the statement subset the in-memory store executes.
//!
//! Filters are conjunctions of column equalities, which is all keyed
//! data-access code needs.

use crate::driver::Value;

/// A parsed SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    DropTable(DropTable),
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    /// Number of `?` placeholders the statement expects.
    pub fn parameter_count(&self) -> usize {
        fn max_index<'a>(operands: impl Iterator<Item = &'a Operand>) -> usize {
            operands
                .filter_map(|op| match op {
                    Operand::Parameter(i) => Some(i + 1),
                    Operand::Literal(_) => None,
                })
                .max()
                .unwrap_or(0)
        }

        match self {
            Statement::CreateTable(_) | Statement::DropTable(_) => 0,
            Statement::Select(s) => max_index(s.filter.iter().map(|c| &c.value)),
            Statement::Insert(i) => max_index(i.rows.iter().flatten()),
            Statement::Update(u) => max_index(
                u.assignments
                    .iter()
                    .map(|a| &a.value)
                    .chain(u.filter.iter().map(|c| &c.value)),
            ),
            Statement::Delete(d) => max_index(d.filter.iter().map(|c| &c.value)),
        }
    }

    /// Whether the statement produces rows.
    pub fn is_query(&self) -> bool {
        matches!(self, Statement::Select(_))
    }

    /// Whether the statement changes data or schema.
    pub fn is_write(&self) -> bool {
        !self.is_query()
    }
}

/// CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

/// Column definition in CREATE TABLE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: SqlDataType,
    pub primary_key: bool,
    pub not_null: bool,
}

/// SQL data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDataType {
    Text,
    Integer,
    Float,
    Boolean,
}

impl SqlDataType {
    /// Whether `value` can be stored in a column of this type. NULL is
    /// accepted by every type; nullability is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (SqlDataType::Text, Value::String(_)) => true,
            (SqlDataType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (SqlDataType::Float, Value::Number(_)) => true,
            (SqlDataType::Boolean, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

/// DROP TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub name: String,
    pub if_exists: bool,
}

/// SELECT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub columns: Vec<SelectColumn>,
    pub from: String,
    pub filter: Vec<Condition>,
}

/// Column in SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Wildcard,
    Column(String),
}

/// INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Operand>>,
}

/// UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub filter: Vec<Condition>,
}

/// SET clause in UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Operand,
}

/// DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub filter: Vec<Condition>,
}

/// `column = operand`; a filter is the conjunction of its conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub value: Operand,
}

/// A literal or a positional parameter (zero-based).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Parameter(usize),
}

impl Operand {
    /// Resolve against bound parameters. Returns `None` for an unbound
    /// parameter.
    pub fn resolve(&self, params: &[Value]) -> Option<Value> {
        match self {
            Operand::Literal(v) => Some(v.clone()),
            Operand::Parameter(i) => params.get(*i).cloned(),
        }
    }
}
