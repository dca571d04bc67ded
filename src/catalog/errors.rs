//! # Catalog Error Types
//!
//! Failures while resolving object types, tables and link types, and while
//! loading catalog definitions from YAML.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No table descriptor registered for object type {object_type_id}")]
    UnknownObjectType { object_type_id: i64 },
    #[error("No table descriptor registered under the name `{name}`")]
    UnknownTable { name: String },
    #[error("No link type `{name}` between object types {type_a} and {type_b}")]
    UnknownLinkType {
        name: String,
        type_a: i64,
        type_b: i64,
    },
    #[error("Duplicate catalog entry: {0}")]
    Duplicate(String),
    #[error("Failed to read catalog file: {error}")]
    ReadError { error: String },
    #[error("Failed to parse catalog: {error}")]
    ParseError { error: String },
}

impl CatalogError {
    /// Create an UnknownTable error with context information
    pub fn table_error_with_context(name: impl Into<String>, context: impl Into<String>) -> Self {
        CatalogError::UnknownTable {
            name: format!("{}\n  Context: {}", name.into(), context.into()),
        }
    }
}
