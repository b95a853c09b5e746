//! SQL parser implementation.
//!
//! Converts SQL strings to our internal AST using sqlparser. Unquoted
//! identifiers are folded to lower case; `?` placeholders are numbered in
//! the order they appear.

use serde_json::{Number, Value};
use sqlparser::ast as sp;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;

use super::ast::*;
use super::error::{ParseError, ParseResult};

/// SQL parser for the in-memory store.
pub struct Parser;

impl Parser {
    /// Parse a SQL string into a statement.
    pub fn parse(sql: &str) -> ParseResult<Statement> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(ParseError::EmptyQuery);
        }

        let dialect = GenericDialect {};
        let statements = SqlParser::parse_sql(&dialect, sql)?;

        if statements.is_empty() {
            return Err(ParseError::EmptyQuery);
        }
        if statements.len() > 1 {
            return Err(ParseError::MultipleStatements);
        }

        let mut params = ParamCounter::default();
        Self::convert_statement(&statements[0], &mut params)
    }

    fn convert_statement(
        stmt: &sp::Statement,
        params: &mut ParamCounter,
    ) -> ParseResult<Statement> {
        match stmt {
            sp::Statement::CreateTable(create) => Self::convert_create_table(create),
            sp::Statement::Drop { object_type, names, if_exists, .. } => {
                Self::convert_drop(object_type, names, *if_exists)
            }
            sp::Statement::Query(query) => Self::convert_query(query, params),
            sp::Statement::Insert(insert) => Self::convert_insert(insert, params),
            sp::Statement::Update { table, assignments, selection, .. } => {
                Self::convert_update(table, assignments, selection, params)
            }
            sp::Statement::Delete(delete) => Self::convert_delete(delete, params),
            other => Err(ParseError::UnsupportedStatement(other.to_string())),
        }
    }

    fn convert_create_table(create: &sp::CreateTable) -> ParseResult<Statement> {
        if !create.constraints.is_empty() {
            return Err(ParseError::UnsupportedStatement(
                "table-level constraints are not supported; declare PRIMARY KEY on the column"
                    .into(),
            ));
        }

        let name = Self::extract_table_name(&create.name)?;
        let columns = create
            .columns
            .iter()
            .map(Self::convert_column_def)
            .collect::<ParseResult<Vec<_>>>()?;

        Ok(Statement::CreateTable(CreateTable {
            name,
            columns,
            if_not_exists: create.if_not_exists,
        }))
    }

    fn convert_column_def(col: &sp::ColumnDef) -> ParseResult<ColumnDef> {
        let data_type = Self::convert_data_type(&col.data_type)?;
        let mut def = ColumnDef {
            name: Self::ident(&col.name),
            data_type,
            primary_key: false,
            not_null: false,
        };

        for opt in &col.options {
            match &opt.option {
                sp::ColumnOption::NotNull => def.not_null = true,
                sp::ColumnOption::Unique { is_primary: true, .. } => {
                    def.primary_key = true;
                    def.not_null = true;
                }
                _ => {}
            }
        }

        Ok(def)
    }

    fn convert_data_type(dt: &sp::DataType) -> ParseResult<SqlDataType> {
        match dt {
            sp::DataType::Text
            | sp::DataType::Varchar(_)
            | sp::DataType::CharVarying(_)
            | sp::DataType::Character(_)
            | sp::DataType::Char(_)
            | sp::DataType::String(_) => Ok(SqlDataType::Text),

            sp::DataType::Int(_)
            | sp::DataType::Integer(_)
            | sp::DataType::BigInt(_)
            | sp::DataType::SmallInt(_)
            | sp::DataType::TinyInt(_) => Ok(SqlDataType::Integer),

            sp::DataType::Float(_)
            | sp::DataType::Real
            | sp::DataType::Double(_)
            | sp::DataType::DoublePrecision
            | sp::DataType::Decimal(_)
            | sp::DataType::Numeric(_) => Ok(SqlDataType::Float),

            sp::DataType::Boolean | sp::DataType::Bool => Ok(SqlDataType::Boolean),

            other => Err(ParseError::UnsupportedDataType(other.to_string())),
        }
    }

    fn convert_drop(
        object_type: &sp::ObjectType,
        names: &[sp::ObjectName],
        if_exists: bool,
    ) -> ParseResult<Statement> {
        match object_type {
            sp::ObjectType::Table => {
                if names.len() != 1 {
                    return Err(ParseError::UnsupportedStatement(
                        "DROP multiple tables not supported".into(),
                    ));
                }
                let name = Self::extract_table_name(&names[0])?;
                Ok(Statement::DropTable(DropTable { name, if_exists }))
            }
            other => Err(ParseError::UnsupportedStatement(format!("DROP {}", other))),
        }
    }

    fn convert_query(query: &sp::Query, params: &mut ParamCounter) -> ParseResult<Statement> {
        let select = match query.body.as_ref() {
            sp::SetExpr::Select(s) => s,
            other => {
                return Err(ParseError::UnsupportedStatement(format!(
                    "unsupported query type: {}",
                    other
                )))
            }
        };

        if select.from.len() != 1 {
            return Err(ParseError::UnsupportedStatement(
                "exactly one table in FROM required".into(),
            ));
        }
        let from = Self::extract_from_table(&select.from[0])?;

        let columns = select
            .projection
            .iter()
            .map(|item| match item {
                sp::SelectItem::Wildcard(_) => Ok(SelectColumn::Wildcard),
                sp::SelectItem::UnnamedExpr(expr) => Self::column_name(expr)
                    .map(SelectColumn::Column)
                    .ok_or_else(|| ParseError::UnsupportedExpression(expr.to_string())),
                other => Err(ParseError::UnsupportedExpression(other.to_string())),
            })
            .collect::<ParseResult<Vec<_>>>()?;

        let filter = Self::convert_selection(select.selection.as_ref(), params)?;

        Ok(Statement::Select(Select { columns, from, filter }))
    }

    fn convert_insert(insert: &sp::Insert, params: &mut ParamCounter) -> ParseResult<Statement> {
        let table = match &insert.table {
            sp::TableObject::TableName(name) => Self::extract_table_name(name)?,
            sp::TableObject::TableFunction(_) => {
                return Err(ParseError::UnsupportedStatement("table function not supported".into()))
            }
        };

        let columns = insert.columns.iter().map(Self::ident).collect();

        let rows = match insert.source.as_ref().map(|s| s.body.as_ref()) {
            Some(sp::SetExpr::Values(sp::Values { rows, .. })) => rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|e| Self::convert_operand(e, params))
                        .collect::<ParseResult<Vec<_>>>()
                })
                .collect::<ParseResult<Vec<_>>>()?,
            _ => {
                return Err(ParseError::UnsupportedStatement(
                    "INSERT ... SELECT not supported".into(),
                ))
            }
        };

        Ok(Statement::Insert(Insert { table, columns, rows }))
    }

    fn convert_update(
        table: &sp::TableWithJoins,
        assignments: &[sp::Assignment],
        selection: &Option<sp::Expr>,
        params: &mut ParamCounter,
    ) -> ParseResult<Statement> {
        let table = Self::extract_from_table(table)?;

        let assignments = assignments
            .iter()
            .map(|a| {
                let column = match &a.target {
                    sp::AssignmentTarget::ColumnName(name) => Self::extract_table_name(name)?,
                    sp::AssignmentTarget::Tuple(_) => {
                        return Err(ParseError::UnsupportedExpression(
                            "tuple assignment not supported".into(),
                        ))
                    }
                };
                let value = Self::convert_operand(&a.value, params)?;
                Ok(Assignment { column, value })
            })
            .collect::<ParseResult<Vec<_>>>()?;

        let filter = Self::convert_selection(selection.as_ref(), params)?;

        Ok(Statement::Update(Update { table, assignments, filter }))
    }

    fn convert_delete(delete: &sp::Delete, params: &mut ParamCounter) -> ParseResult<Statement> {
        let tables = match &delete.from {
            sp::FromTable::WithFromKeyword(tables) => tables,
            sp::FromTable::WithoutKeyword(tables) => tables,
        };

        if tables.len() != 1 {
            return Err(ParseError::UnsupportedStatement(
                "DELETE from multiple tables not supported".into(),
            ));
        }

        let table = Self::extract_from_table(&tables[0])?;
        let filter = Self::convert_selection(delete.selection.as_ref(), params)?;

        Ok(Statement::Delete(Delete { table, filter }))
    }

    fn convert_selection(
        selection: Option<&sp::Expr>,
        params: &mut ParamCounter,
    ) -> ParseResult<Vec<Condition>> {
        let mut filter = Vec::new();
        if let Some(expr) = selection {
            Self::collect_conditions(expr, params, &mut filter)?;
        }
        Ok(filter)
    }

    /// Flatten `a = x AND b = y AND ...` into conditions.
    fn collect_conditions(
        expr: &sp::Expr,
        params: &mut ParamCounter,
        out: &mut Vec<Condition>,
    ) -> ParseResult<()> {
        match expr {
            sp::Expr::Nested(inner) => Self::collect_conditions(inner, params, out),
            sp::Expr::BinaryOp { left, op: sp::BinaryOperator::And, right } => {
                Self::collect_conditions(left, params, out)?;
                Self::collect_conditions(right, params, out)
            }
            sp::Expr::BinaryOp { left, op: sp::BinaryOperator::Eq, right } => {
                let condition = match (Self::column_name(left), Self::column_name(right)) {
                    (Some(column), None) => Condition {
                        column,
                        value: Self::convert_operand(right, params)?,
                    },
                    (None, Some(column)) => Condition {
                        column,
                        value: Self::convert_operand(left, params)?,
                    },
                    _ => return Err(ParseError::UnsupportedExpression(expr.to_string())),
                };
                out.push(condition);
                Ok(())
            }
            other => Err(ParseError::UnsupportedExpression(other.to_string())),
        }
    }

    fn convert_operand(expr: &sp::Expr, params: &mut ParamCounter) -> ParseResult<Operand> {
        match expr {
            sp::Expr::Value(v) => match &v.value {
                sp::Value::Placeholder(p) => params.next(p).map(Operand::Parameter),
                other => Self::convert_value(other).map(Operand::Literal),
            },
            sp::Expr::UnaryOp { op: sp::UnaryOperator::Minus, expr } => {
                match Self::convert_operand(expr, params)? {
                    Operand::Literal(Value::Number(n)) => Self::negate(&n).map(Operand::Literal),
                    _ => Err(ParseError::UnsupportedExpression(format!("-{}", expr))),
                }
            }
            sp::Expr::Nested(inner) => Self::convert_operand(inner, params),
            other => Err(ParseError::UnsupportedExpression(other.to_string())),
        }
    }

    fn convert_value(v: &sp::Value) -> ParseResult<Value> {
        match v {
            sp::Value::Null => Ok(Value::Null),
            sp::Value::Boolean(b) => Ok(Value::Bool(*b)),
            sp::Value::Number(s, _) => {
                if let Ok(i) = s.parse::<i64>() {
                    Ok(Value::from(i))
                } else {
                    s.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .ok_or_else(|| {
                            ParseError::UnsupportedExpression(format!("invalid number: {}", s))
                        })
                }
            }
            sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => {
                Ok(Value::String(s.clone()))
            }
            other => Err(ParseError::UnsupportedExpression(format!(
                "unsupported value: {}",
                other
            ))),
        }
    }

    fn negate(n: &Number) -> ParseResult<Value> {
        if let Some(i) = n.as_i64() {
            return Ok(Value::from(-i));
        }
        n.as_f64()
            .and_then(|f| Number::from_f64(-f))
            .map(Value::Number)
            .ok_or_else(|| ParseError::UnsupportedExpression(format!("cannot negate {}", n)))
    }

    fn column_name(expr: &sp::Expr) -> Option<String> {
        match expr {
            sp::Expr::Identifier(id) => Some(Self::ident(id)),
            sp::Expr::CompoundIdentifier(parts) => parts.last().map(Self::ident),
            _ => None,
        }
    }

    fn ident(id: &sp::Ident) -> String {
        if id.quote_style.is_some() {
            id.value.clone()
        } else {
            id.value.to_lowercase()
        }
    }

    fn extract_table_name(name: &sp::ObjectName) -> ParseResult<String> {
        // Use just the table name, ignoring schema
        name.0
            .last()
            .map(|part| part.as_ident().map(Self::ident).unwrap_or_else(|| part.to_string()))
            .ok_or_else(|| ParseError::InvalidIdentifier("empty table name".into()))
    }

    fn extract_from_table(from: &sp::TableWithJoins) -> ParseResult<String> {
        if !from.joins.is_empty() {
            return Err(ParseError::UnsupportedStatement("joins not supported".into()));
        }
        match &from.relation {
            sp::TableFactor::Table { name, .. } => Self::extract_table_name(name),
            other => Err(ParseError::UnsupportedStatement(format!(
                "unsupported FROM clause: {}",
                other
            ))),
        }
    }
}

/// Hands out zero-based parameter positions.
#[derive(Default)]
struct ParamCounter {
    next: usize,
}

impl ParamCounter {
    fn next(&mut self, placeholder: &str) -> ParseResult<usize> {
        if placeholder == "?" {
            let index = self.next;
            self.next += 1;
            return Ok(index);
        }
        // $1, $2, ... are explicit and one-based
        placeholder
            .strip_prefix('$')
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(|n| n - 1)
            .ok_or_else(|| {
                ParseError::UnsupportedExpression(format!("placeholder {}", placeholder))
            })
    }
}
