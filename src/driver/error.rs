//! Raw backing-store errors.

use thiserror::Error;

/// Result type for driver-level operations.
pub type VendorResult<T> = Result<T, VendorError>;

/// SQLSTATE for "connection does not exist".
pub const SQL_STATE_CONNECTION_CLOSED: &str = "08003";

/// SQLSTATE for "unable to establish connection".
pub const SQL_STATE_CONNECTION_UNAVAILABLE: &str = "08001";

/// SQLSTATE for "invalid transaction state".
pub const SQL_STATE_INVALID_TRANSACTION_STATE: &str = "25000";

/// A failure reported by the backing store, exactly as the store reported it.
///
/// The `code` is the vendor's numeric error code and `sql_state` the
/// five-character SQLSTATE. Nothing above the driver layer should branch on
/// either; they exist so the error translator can classify the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} [{code}-{sql_state}]")]
pub struct VendorError {
    code: i32,
    sql_state: String,
    message: String,
}

impl VendorError {
    /// Create an error whose SQLSTATE is derived from the vendor code.
    ///
    /// Stores that number their codes after SQLSTATE (H2 and friends) use the
    /// first five digits of the code as the state.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        let mut sql_state = format!("{:05}", code);
        sql_state.truncate(5);
        Self {
            code,
            sql_state,
            message: message.into(),
        }
    }

    /// Create an error with an explicit SQLSTATE.
    pub fn with_sql_state(
        code: i32,
        sql_state: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }

    /// The error raised when a closed connection, statement or cursor is used.
    pub fn connection_closed(what: &str) -> Self {
        Self::with_sql_state(0, SQL_STATE_CONNECTION_CLOSED, format!("{} is closed", what))
    }

    /// The error raised when an operation is refused because of the
    /// connection's transaction state.
    pub fn invalid_transaction_state(message: impl Into<String>) -> Self {
        Self::with_sql_state(0, SQL_STATE_INVALID_TRANSACTION_STATE, message)
    }

    /// Vendor-specific numeric code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Five-character SQLSTATE.
    pub fn sql_state(&self) -> &str {
        &self.sql_state
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The two-character SQLSTATE class (`"23"` for integrity violations).
    pub fn sql_state_class(&self) -> &str {
        self.sql_state.get(..2).unwrap_or("")
    }
}
