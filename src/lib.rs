//! txsync - transaction-scoped connection coordination
//!
//! Lets several data-access components take part in one database
//! transaction without passing a connection between them. A unit of work
//! is named by a [`ScopeKey`](transaction::ScopeKey); the first caller to
//! begin a transaction in that scope binds a connection to it, and every
//! later caller with the same key reuses that connection. Backing-store
//! failures are translated into one portable error taxonomy
//! ([`DataAccessError`](dao::DataAccessError)) so callers never branch on
//! vendor codes.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use txsync::access::{column, SqlTemplate};
//! use txsync::dao::DataAccessError;
//! use txsync::memdb::{MemoryDataSource, MemoryDatabase};
//! use txsync::transaction::{
//!     ScopeKey, TransactionContextStore, TransactionManager, TransactionTemplate,
//! };
//!
//! let db = MemoryDatabase::new("example");
//! let manager = TransactionManager::new(
//!     Arc::new(MemoryDataSource::new(db)),
//!     Arc::new(TransactionContextStore::new()),
//! );
//! let sql = SqlTemplate::from_manager(&manager);
//! let tx = TransactionTemplate::new(manager);
//!
//! let ddl = "create table member (member_id text primary key, money integer)";
//! sql.execute(&ScopeKey::new(), ddl).unwrap();
//!
//! let scope = ScopeKey::new();
//! tx.run(&scope, || -> Result<(), DataAccessError> {
//!     let insert = "insert into member values (?, ?)";
//!     sql.update(&scope, insert, &[json!("memberA"), json!(10000)])?;
//!     let debit = "update member set money = ? where member_id = ?";
//!     sql.update(&scope, debit, &[json!(8000), json!("memberA")])?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! let select = "select money from member where member_id = ?";
//! let money: i64 = sql
//!     .query_for_object(&scope, select, &[json!("memberA")], |row| column(row, "money"))
//!     .unwrap();
//! assert_eq!(money, 8000);
//! ```

pub mod access;
pub mod config;
pub mod dao;
pub mod driver;
pub mod memdb;
pub mod pool;
pub mod sql;
pub mod transaction;
