//! In-memory transactional SQL store.
//!
//! Stands in for a real database server: it speaks the [`crate::driver`]
//! contract, honours auto-commit and local transactions, and reports
//! failures with H2-style vendor codes so the error translator has real
//! input to classify.
//!
//! # Transactions
//!
//! In auto-commit mode every write is applied to the committed tables
//! immediately. With auto-commit off, the connection snapshots the
//! committed tables on first use, runs statements against that private
//! copy and records every successful write. `commit` replays the record
//! against the latest committed state under the write lock, all or
//! nothing; `rollback` throws the copy away.
//!
//! # Usage
//!
//! ```
//! use txsync::driver::{Connection, DataSource};
//! use txsync::memdb::{MemoryDataSource, MemoryDatabase};
//!
//! let db = MemoryDatabase::new("docs");
//! let source = MemoryDataSource::new(db.clone());
//! let mut conn = source.get_connection().unwrap();
//! let stmt = conn.prepare("create table t (id text primary key)").unwrap();
//! conn.execute_update(stmt, &[]).unwrap();
//! assert_eq!(db.table_names(), vec!["t".to_string()]);
//! ```

pub mod codes;
mod connection;
mod database;

pub use connection::{MemoryConnection, MemoryDataSource};
pub use database::MemoryDatabase;

/// Backing-store identity reported by [`MemoryDataSource`].
pub const VENDOR: &str = "MemDB";
