//! SQL parsing for the in-memory store.
//!
//! Uses `sqlparser` for parsing, then converts to a small internal AST with
//! positional `?` parameters.

mod ast;
mod error;
mod parser;

pub use ast::*;
pub use error::{ParseError, ParseResult};
pub use parser::Parser;
