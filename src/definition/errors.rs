//! # Definition Error Types
//!
//! Failures while loading a YAML query definition or turning it into a
//! [`QueryGraph`](crate::query_compiler::QueryGraph). Catalog and compiler
//! failures are wrapped unchanged so callers can still match on them.

use crate::catalog::CatalogError;
use crate::query_compiler::CompileError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("Invalid query definition: {message}")]
    Invalid { message: String },
    #[error("Invalid date `{value}` for {field} (expected {expected})")]
    InvalidDate {
        field: String,
        value: String,
        expected: String,
    },
    #[error("Failed to read query definition: {error}")]
    ReadError { error: String },
    #[error("Failed to parse query definition: {error}")]
    ParseError { error: String },
}

impl DefinitionError {
    /// Create an Invalid error naming the node it was raised for
    pub fn invalid_with_context(message: impl Into<String>, node: &str) -> Self {
        DefinitionError::Invalid {
            message: format!("{}\n  Context: node `{}`", message.into(), node),
        }
    }
}
