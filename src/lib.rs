//! RepoQuery - declarative query compiler for versioned object repositories
//!
//! This crate turns a graph of query nodes into one parameterized SQL
//! statement:
//! - Object-type resolution through a catalog of table descriptors
//! - Forward chains and reverse trees of joined nodes
//! - Temporal validity filters and link-table joins
//! - YAML query definitions for tooling and tests

pub mod catalog;
pub mod config;
pub mod definition;
pub mod query_compiler;

pub use catalog::{Catalog, CatalogError, StaticCatalog, TableDescriptor};
pub use config::{CompilerConfig, ConfigError};
pub use definition::{DefinitionError, QueryDefinition};
pub use query_compiler::{
    CompileEnv, CompileError, CompileMode, CompiledQuery, Criterion, Param, Query, QueryGraph,
    QueryNode,
};
