//! Vendor error to [`DataAccessError`] translation.

use tracing::{debug, error};

use crate::dao::codes::{CodeCategory, ErrorCodeRegistry, ErrorCodeTable};
use crate::dao::error::DataAccessError;
use crate::driver::{DataSource, VendorError};

/// Turns a [`VendorError`] into the portable error taxonomy.
///
/// Classification looks the error up in the vendor's code table first and
/// falls back to the SQLSTATE class when the vendor has no table or the
/// table does not know the code. Translation is total: every input maps to
/// some variant.
#[derive(Debug, Clone)]
pub struct ErrorTranslator {
    vendor: String,
    table: Option<ErrorCodeTable>,
}

impl ErrorTranslator {
    /// Translator using the bundled table for `vendor`.
    pub fn for_vendor(vendor: &str) -> Self {
        Self::from_registry(ErrorCodeRegistry::builtin(), vendor)
    }

    /// Create a translator using `vendor`'s table from `registry`.
    pub fn from_registry(registry: &ErrorCodeRegistry, vendor: &str) -> Self {
        let table = registry.table(vendor).cloned();
        if table.is_none() {
            debug!(target: "txsync::dao", vendor, "no error-code table, classifying by SQLSTATE");
        }
        Self {
            vendor: vendor.to_string(),
            table,
        }
    }

    /// Create a translator for the vendor `source` reports.
    pub fn for_data_source(source: &dyn DataSource) -> Self {
        Self::for_vendor(source.vendor())
    }

    /// Get the vendor name this translator was built for.
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Classify `err`, raised while running `sql` as part of `operation`.
    pub fn translate(&self, operation: &str, sql: &str, err: VendorError) -> DataAccessError {
        let category = self
            .table
            .as_ref()
            .and_then(|t| t.classify(&err))
            .or_else(|| classify_sql_state(&err));

        let operation = operation.to_string();
        let sql = sql.to_string();
        match category {
            Some(CodeCategory::BadSqlGrammar) => {
                error!(
                    target: "txsync::dao",
                    vendor = %self.vendor,
                    operation = %operation,
                    sql = %sql,
                    code = err.code(),
                    "bad SQL grammar: {}",
                    err.message()
                );
                DataAccessError::BadSqlGrammar {
                    operation,
                    sql,
                    source: err,
                }
            }
            Some(CodeCategory::DuplicateKey) => DataAccessError::ConstraintViolation {
                operation,
                sql,
                duplicate_key: true,
                source: err,
            },
            Some(CodeCategory::DataIntegrityViolation) => DataAccessError::ConstraintViolation {
                operation,
                sql,
                duplicate_key: false,
                source: err,
            },
            None => DataAccessError::DataAccess {
                operation,
                sql,
                source: err,
            },
        }
    }
}

fn classify_sql_state(err: &VendorError) -> Option<CodeCategory> {
    match err.sql_state_class() {
        "23" if err.sql_state() == "23505" => Some(CodeCategory::DuplicateKey),
        "23" => Some(CodeCategory::DataIntegrityViolation),
        "42" => Some(CodeCategory::BadSqlGrammar),
        _ => None,
    }
}
