//! Vendor error codes reported by the in-memory store.
//!
//! Numbers follow H2's numbering so the same error-code table shape works
//! for both.

pub const COLUMN_COUNT_DOES_NOT_MATCH: i32 = 21002;
pub const DATA_CONVERSION_ERROR: i32 = 22018;
pub const NULL_NOT_ALLOWED: i32 = 23502;
pub const DUPLICATE_KEY: i32 = 23505;
pub const SYNTAX_ERROR: i32 = 42000;
pub const UNSUPPORTED_SYNTAX: i32 = 42001;
pub const TABLE_ALREADY_EXISTS: i32 = 42101;
pub const TABLE_NOT_FOUND: i32 = 42102;
pub const COLUMN_NOT_FOUND: i32 = 42122;
pub const FEATURE_NOT_SUPPORTED: i32 = 50100;
pub const METHOD_NOT_ALLOWED_FOR_QUERY: i32 = 90001;
pub const METHOD_ONLY_ALLOWED_FOR_QUERY: i32 = 90002;
pub const OBJECT_CLOSED: i32 = 90007;
pub const PARAMETER_NOT_SET: i32 = 90012;
