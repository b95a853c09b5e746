//! Per-vendor error-code tables.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::error;

use crate::config::ConfigResult;
use crate::driver::VendorError;

static BUILTIN: Lazy<ErrorCodeRegistry> = Lazy::new(|| {
    ErrorCodeRegistry::from_json_str(include_str!("error_codes.json")).unwrap_or_else(|e| {
        error!(target: "txsync::dao", error = %e, "bundled error-code tables are unreadable");
        ErrorCodeRegistry::default()
    })
});

/// How one vendor's error codes map onto portable categories.
///
/// Codes are compared as strings: the numeric vendor code rendered in
/// decimal, or the SQLSTATE when `use_sql_state` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorCodeTable {
    pub bad_sql_grammar_codes: BTreeSet<String>,
    pub duplicate_key_codes: BTreeSet<String>,
    pub data_integrity_violation_codes: BTreeSet<String>,
    pub use_sql_state: bool,
}

/// Category a table assigns to a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodeCategory {
    BadSqlGrammar,
    DuplicateKey,
    DataIntegrityViolation,
}

impl ErrorCodeTable {
    pub(crate) fn classify(&self, err: &VendorError) -> Option<CodeCategory> {
        let code = if self.use_sql_state {
            err.sql_state().to_string()
        } else {
            err.code().to_string()
        };

        if self.bad_sql_grammar_codes.contains(&code) {
            Some(CodeCategory::BadSqlGrammar)
        } else if self.duplicate_key_codes.contains(&code) {
            Some(CodeCategory::DuplicateKey)
        } else if self.data_integrity_violation_codes.contains(&code) {
            Some(CodeCategory::DataIntegrityViolation)
        } else {
            None
        }
    }
}

/// Error-code tables keyed by vendor name. Lookup ignores case.
#[derive(Debug, Clone, Default)]
pub struct ErrorCodeRegistry {
    tables: HashMap<String, ErrorCodeTable>,
}

impl ErrorCodeRegistry {
    /// Tables shipped with the crate: MemDB, H2, PostgreSQL and MySQL.
    pub fn builtin() -> &'static ErrorCodeRegistry {
        &BUILTIN
    }

    /// Parse a JSON object of `{ "<vendor>": { ...table... } }`.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let raw: HashMap<String, ErrorCodeTable> = serde_json::from_str(json)?;
        let mut registry = Self::default();
        for (vendor, table) in raw {
            registry.register(vendor, table);
        }
        Ok(registry)
    }

    /// Load a registry from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Add or replace the table for `vendor`.
    pub fn register(&mut self, vendor: impl AsRef<str>, table: ErrorCodeTable) -> &mut Self {
        self.tables.insert(vendor.as_ref().to_ascii_lowercase(), table);
        self
    }

    /// Look up the table for `vendor`, ignoring case.
    pub fn table(&self, vendor: &str) -> Option<&ErrorCodeTable> {
        self.tables.get(&vendor.to_ascii_lowercase())
    }

    /// Names of every registered vendor.
    pub fn vendors(&self) -> Vec<&str> {
        let mut vendors: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        vendors.sort_unstable();
        vendors
    }
}
