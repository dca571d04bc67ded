use super::descriptors::{FieldDescriptor, LinkDescriptor, TableDescriptor};
use super::errors::CatalogError;
use super::Catalog;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Catalog file layout:
///
/// ```yaml
/// tables:
///   - object_type_id: 1
///     name: FARMER
///     schema: farm
///     table_name: farmer
///     type_fields:
///       - { name: pkid, type: integer }
///       - { name: full_name }
/// link_types:
///   - { id: 12, name: SUPPORTS, type_a: 3, type_b: 2 }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub tables: Vec<TableDescriptor>,
    #[serde(default)]
    pub link_types: Vec<LinkDescriptor>,
}

/// In-memory catalog built once at start-up and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    by_id: HashMap<i64, Arc<TableDescriptor>>,
    by_name: HashMap<String, i64>,
    link_types: Vec<LinkDescriptor>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: CatalogConfig) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for table in config.tables {
            catalog.register_table(table)?;
        }
        for link in config.link_types {
            catalog.register_link_type(link)?;
        }
        debug!(
            "Catalog loaded: {} tables, {} link types",
            catalog.by_id.len(),
            catalog.link_types.len()
        );
        Ok(catalog)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let config: CatalogConfig =
            serde_yaml::from_str(yaml).map_err(|e| CatalogError::ParseError {
                error: e.to_string(),
            })?;
        Self::from_config(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::ReadError {
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn register_table(&mut self, table: TableDescriptor) -> Result<(), CatalogError> {
        if self.by_id.contains_key(&table.object_type_id) {
            return Err(CatalogError::Duplicate(format!(
                "object type {}",
                table.object_type_id
            )));
        }
        if self.by_name.contains_key(&table.name) {
            return Err(CatalogError::Duplicate(format!("table `{}`", table.name)));
        }
        self.by_name.insert(table.name.clone(), table.object_type_id);
        self.by_id.insert(table.object_type_id, Arc::new(table));
        Ok(())
    }

    pub fn register_link_type(&mut self, link: LinkDescriptor) -> Result<(), CatalogError> {
        if self.link_types.iter().any(|l| l.id == link.id) {
            return Err(CatalogError::Duplicate(format!("link type {}", link.id)));
        }
        self.link_types.push(link);
        Ok(())
    }
}

impl Catalog for StaticCatalog {
    fn resolve_table(&self, object_type_id: i64) -> Result<Arc<TableDescriptor>, CatalogError> {
        self.by_id
            .get(&object_type_id)
            .cloned()
            .ok_or(CatalogError::UnknownObjectType { object_type_id })
    }

    fn resolve_table_by_name(&self, name: &str) -> Result<Arc<TableDescriptor>, CatalogError> {
        let id = self
            .by_name
            .get(name)
            .ok_or_else(|| CatalogError::UnknownTable {
                name: name.to_string(),
            })?;
        self.resolve_table(*id)
    }

    fn resolve_fields(&self, object_type_id: i64) -> Result<Vec<FieldDescriptor>, CatalogError> {
        let table = self.resolve_table(object_type_id)?;
        Ok(table
            .repo_fields
            .iter()
            .chain(table.type_fields.iter())
            .cloned()
            .collect())
    }

    /// Link types are undirected in the catalog: `(a, b)` also matches a
    /// registration as `(b, a)`.
    fn resolve_link_type(
        &self,
        name: &str,
        type_a: i64,
        type_b: i64,
    ) -> Result<LinkDescriptor, CatalogError> {
        self.link_types
            .iter()
            .find(|l| {
                l.name == name
                    && ((l.type_a == type_a && l.type_b == type_b)
                        || (l.type_a == type_b && l.type_b == type_a))
            })
            .cloned()
            .ok_or_else(|| CatalogError::UnknownLinkType {
                name: name.to_string(),
                type_a,
                type_b,
            })
    }
}
