//! Portable data-access errors.
//!
//! Everything below this layer speaks [`VendorError`](crate::driver::VendorError);
//! everything above it speaks [`DataAccessError`]. [`ErrorTranslator`] is
//! the single crossing point, driven by the per-vendor tables in
//! [`ErrorCodeRegistry`]:
//!
//! | category                 | variant                                  |
//! |--------------------------|------------------------------------------|
//! | duplicate key            | `ConstraintViolation { duplicate_key: true }` |
//! | other integrity failures | `ConstraintViolation { duplicate_key: false }` |
//! | bad grammar / schema     | `BadSqlGrammar`                          |
//! | anything else            | `DataAccess`                             |
//!
//! A translated error cannot be fed back into the translator, so an error
//! is translated at most once.

mod codes;
mod error;
mod translator;

pub use codes::{ErrorCodeRegistry, ErrorCodeTable};
pub use error::{DaoResult, DataAccessError, ErrorKind};
pub use translator::ErrorTranslator;
