//! Catalog collaborator
//!
//! Resolves object-type identifiers into table, field and link-type
//! descriptors. The compiler only consumes these while nodes are being
//! constructed, never during traversal.

pub mod descriptors;
pub mod errors;
pub mod static_catalog;

pub use descriptors::{
    default_repo_fields, repo_columns, FieldDescriptor, FieldType, LinkDescriptor,
    TableDescriptor,
};
pub use errors::CatalogError;
pub use static_catalog::{CatalogConfig, StaticCatalog};

use std::sync::Arc;

/// Metadata service resolving object types.
#[cfg_attr(test, mockall::automock)]
pub trait Catalog {
    fn resolve_table(&self, object_type_id: i64) -> Result<Arc<TableDescriptor>, CatalogError>;

    fn resolve_table_by_name(&self, name: &str) -> Result<Arc<TableDescriptor>, CatalogError>;

    fn resolve_fields(&self, object_type_id: i64) -> Result<Vec<FieldDescriptor>, CatalogError>;

    fn resolve_link_type(
        &self,
        name: &str,
        type_a: i64,
        type_b: i64,
    ) -> Result<LinkDescriptor, CatalogError>;
}
