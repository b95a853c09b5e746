//! Transaction-scoped resource coordination.
//!
//! A unit of work is identified by a [`ScopeKey`]. Beginning a transaction
//! acquires a connection, wraps it in a [`ResourceHandle`], turns
//! auto-commit off and binds the handle to the scope in the
//! [`TransactionContextStore`]. Any code given the same key finds that
//! handle and runs on the same connection, so all its statements commit or
//! roll back together.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        TransactionTemplate / Transactional<S>               │
//! │   (unit-of-work boundary: commit on Ok, rollback on Err)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TransactionManager                        │
//! │     (begin / join, owner-only commit, rollback, release)    │
//! └─────────────────────────────────────────────────────────────┘
//!              │                                │
//!              ▼                                ▼
//!  ┌───────────────────────┐        ┌───────────────────────┐
//!  │ TransactionContext-   │ binds  │    ResourceHandle     │
//!  │ Store (scope → handle)│───────►│ (connection, cursors) │
//!  └───────────────────────┘        └───────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use txsync::memdb::{MemoryDataSource, MemoryDatabase};
//! use txsync::transaction::{ScopeKey, TransactionContextStore, TransactionManager};
//!
//! let db = MemoryDatabase::new("tx-docs");
//! let manager = TransactionManager::new(
//!     Arc::new(MemoryDataSource::new(db.clone())),
//!     Arc::new(TransactionContextStore::new()),
//! );
//!
//! let scope = ScopeKey::new();
//! let tx = manager.begin(&scope).unwrap();
//! tx.handle().lock().update("create table t (id text primary key)", &[]).unwrap();
//! manager.commit(tx).unwrap();
//!
//! assert_eq!(db.connections_opened(), db.connections_closed());
//! ```

mod boundary;
mod context;
mod error;
mod handle;
mod manager;
mod scope;
mod status;

pub use boundary::{TransactionTemplate, Transactional};
pub use context::{SharedHandle, TransactionContextStore};
pub use error::{ReleaseError, ReleaseFailure, ReleaseResult, ReleaseStep};
pub use handle::ResourceHandle;
pub use manager::TransactionManager;
pub use scope::ScopeKey;
pub use status::{
    Active, Committed, RolledBack, StateMarker, TransactionInfo, TransactionStatus, TxState,
};
