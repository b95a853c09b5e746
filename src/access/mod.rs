//! Data-access helpers for repositories.
//!
//! Repositories written against [`SqlTemplate`] never see a connection:
//! they pass the scope key they were given and get the scope's
//! transactional connection when a transaction is running, or a private
//! auto-commit one when it is not. [`ConnectionUtils`] is the lower-level
//! form for code that wants the handle itself.

mod row;
mod template;
mod utils;

pub use row::column;
pub use template::SqlTemplate;
pub use utils::{ConnectionLease, ConnectionUtils};
