//! Whole-graph compilation tests

mod forward_tests;

use crate::catalog::{FieldDescriptor, FieldType, TableDescriptor};
use crate::query_compiler::{default_max_date, CompileEnv, CompiledQuery, LinkTableConfig, Param};
use std::sync::Arc;

pub(super) fn farmer() -> Arc<TableDescriptor> {
    Arc::new(TableDescriptor::new(
        1,
        "FARMER",
        "farm",
        "farmer",
        vec![FieldDescriptor::new("name", FieldType::Text)],
    ))
}

pub(super) fn animal() -> Arc<TableDescriptor> {
    Arc::new(TableDescriptor::new(
        2,
        "ANIMAL",
        "farm",
        "animal",
        vec![
            FieldDescriptor::new("breed", FieldType::Text),
            FieldDescriptor::new("weight", FieldType::Float),
            FieldDescriptor::new("farmer_ref", FieldType::Integer),
            FieldDescriptor::new("pasture", FieldType::Geometry),
        ],
    ))
}

pub(super) fn support_claim() -> Arc<TableDescriptor> {
    Arc::new(TableDescriptor::new(
        3,
        "SUPPORT_CLAIM",
        "farm",
        "support_claim",
        vec![FieldDescriptor::new("amount", FieldType::Float)],
    ))
}

pub(super) fn tag() -> Arc<TableDescriptor> {
    Arc::new(TableDescriptor::new(
        4,
        "TAG",
        "farm",
        "tag",
        vec![FieldDescriptor::new("code", FieldType::Text)],
    ))
}

pub(super) fn env() -> Arc<CompileEnv> {
    CompileEnv::shared_default()
}

pub(super) fn link_table() -> LinkTableConfig {
    LinkTableConfig::new("core", "link")
}

pub(super) fn max_date() -> Param {
    Param::Date(default_max_date())
}

/// The Nth `?` must bind to the Nth value
pub(super) fn assert_parity(compiled: &CompiledQuery) {
    assert_eq!(
        compiled.placeholder_count(),
        compiled.params.len(),
        "placeholder/param mismatch in:\n{}\nparams: {:?}",
        compiled.sql,
        compiled.params
    );
}

/// Text after the outer `WHERE`
pub(super) fn where_clause(sql: &str) -> &str {
    sql.split("\nWHERE ").nth(1).unwrap_or("")
}

/// Text between `SELECT` and the outer `FROM`
pub(super) fn select_list(sql: &str) -> &str {
    sql.split("\nFROM ").next().unwrap_or("")
}
