//! Bounded connection pool.
//!
//! [`ConnectionPool`] sits in front of any [`DataSource`](crate::driver::DataSource)
//! and is a data source itself, so everything above it works the same with
//! or without pooling. Closing a [`PooledConnection`] returns the physical
//! connection to the idle queue instead of closing it.

mod connection;

pub use connection::{ConnectionPool, PoolStats, PooledConnection, CONNECTION_NOT_AVAILABLE};
