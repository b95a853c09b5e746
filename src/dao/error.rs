//! Portable data-access errors.

use thiserror::Error;

use crate::driver::VendorError;
use crate::transaction::ScopeKey;

/// Result type for data-access operations.
pub type DaoResult<T> = Result<T, DataAccessError>;

/// Coarse classification of a [`DataAccessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyBound,
    NotFound,
    ConstraintViolation,
    SyntaxOrSchema,
    DataAccess,
}

/// A backing-store independent failure.
///
/// Callers branch on the variant (or on [`kind`](DataAccessError::kind));
/// the vendor's original error stays reachable through
/// [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum DataAccessError {
    /// A resource is already bound to this scope.
    #[error("a connection is already bound to scope {scope}")]
    AlreadyBound { scope: ScopeKey },

    /// The requested entity does not exist.
    #[error("{operation}: {message}")]
    NotFound { operation: String, message: String },

    /// Integrity constraint violated: duplicate key, null in a not-null column, ...
    #[error("{operation}: constraint violation for SQL [{sql}]: {source}")]
    ConstraintViolation {
        operation: String,
        sql: String,
        /// True when the violated constraint is a unique or primary key.
        duplicate_key: bool,
        #[source]
        source: VendorError,
    },

    /// Malformed statement or reference to a missing table/column.
    #[error("{operation}: bad SQL grammar [{sql}]: {source}")]
    BadSqlGrammar {
        operation: String,
        sql: String,
        #[source]
        source: VendorError,
    },

    /// Any other backing-store failure.
    #[error("{operation}: data access failure for SQL [{sql}]: {source}")]
    DataAccess {
        operation: String,
        sql: String,
        #[source]
        source: VendorError,
    },

    /// A single-row query returned a different number of rows.
    #[error("{operation}: incorrect result size, expected {expected}, actual {actual}")]
    IncorrectResultSize {
        operation: String,
        expected: usize,
        actual: usize,
    },

    /// A row value could not be converted to the requested type.
    #[error("cannot map column '{column}': {message}")]
    RowMapping { column: String, message: String },

    /// The transaction was marked rollback-only by a participant and has
    /// been rolled back instead of committed.
    #[error("transaction in scope {scope} was rolled back because it was marked rollback-only")]
    UnexpectedRollback { scope: ScopeKey },
}

impl DataAccessError {
    /// Get the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyBound { .. } => ErrorKind::AlreadyBound,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Self::BadSqlGrammar { .. } => ErrorKind::SyntaxOrSchema,
            Self::DataAccess { .. }
            | Self::IncorrectResultSize { .. }
            | Self::RowMapping { .. }
            | Self::UnexpectedRollback { .. } => ErrorKind::DataAccess,
        }
    }

    /// Whether a caller can sensibly react to this error at runtime, for
    /// example by choosing another key after a duplicate.
    ///
    /// Programming errors (bad grammar, double binding) are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::AlreadyBound | ErrorKind::SyntaxOrSchema)
    }

    /// Name of the operation that failed, when known.
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::NotFound { operation, .. }
            | Self::ConstraintViolation { operation, .. }
            | Self::BadSqlGrammar { operation, .. }
            | Self::DataAccess { operation, .. }
            | Self::IncorrectResultSize { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Statement text of a translated failure.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::ConstraintViolation { sql, .. }
            | Self::BadSqlGrammar { sql, .. }
            | Self::DataAccess { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// The untranslated vendor error.
    pub fn vendor_error(&self) -> Option<&VendorError> {
        match self {
            Self::ConstraintViolation { source, .. }
            | Self::BadSqlGrammar { source, .. }
            | Self::DataAccess { source, .. } => Some(source),
            _ => None,
        }
    }

    /// True for a unique or primary key violation.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::ConstraintViolation { duplicate_key: true, .. })
    }

    /// Create a `NotFound` error.
    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
