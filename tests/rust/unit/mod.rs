//! Unit tests - fast tests of the public API, no database required
//!
//! These tests compile query graphs and YAML definitions and inspect the
//! generated SQL text and bind values.

mod test_join_resolution;
mod test_yaml_pipeline;

use repoquery::catalog::{FieldDescriptor, FieldType, TableDescriptor};
use repoquery::query_compiler::CompiledQuery;
use std::sync::Arc;

pub fn farmer() -> Arc<TableDescriptor> {
    Arc::new(TableDescriptor::new(
        1,
        "FARMER",
        "farm",
        "farmer",
        vec![FieldDescriptor::new("full_name", FieldType::Text)],
    ))
}

pub fn animal() -> Arc<TableDescriptor> {
    Arc::new(TableDescriptor::new(
        2,
        "ANIMAL",
        "farm",
        "animal",
        vec![
            FieldDescriptor::new("breed", FieldType::Text),
            FieldDescriptor::new("pasture", FieldType::Geometry),
        ],
    ))
}

pub fn assert_parity(compiled: &CompiledQuery) {
    assert_eq!(
        compiled.placeholder_count(),
        compiled.params.len(),
        "placeholder/param mismatch in:\n{}",
        compiled.sql
    );
}
