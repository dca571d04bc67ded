//! Compile environment and results

use super::dialect::{Dialect, Tokens};
use super::geometry::{GeometrySql, OgcGeometrySql};
use super::link::LinkTableConfig;
use super::param::Param;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Flags shared by `compile_ex` and `param_values`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompileMode {
    /// Join base tables (repository + type table) instead of the pre-joined view
    pub force_physical: bool,
    /// Project GEOMETRY columns through the geometry collaborator
    pub include_geometry: bool,
}

impl CompileMode {
    pub fn new(force_physical: bool, include_geometry: bool) -> Self {
        Self {
            force_physical,
            include_geometry,
        }
    }
}

/// `9999-12-31 23:59:59`, the `dt_delete` value of a live row
pub fn default_max_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Read-only configuration every compile consults.
///
/// Built once at start-up (see `CompilerConfig::build_env`) and shared by `Arc`.
#[derive(Clone)]
pub struct CompileEnv {
    pub dialect: Dialect,
    /// Sentinel stored in `dt_delete` for rows that were never deleted
    pub max_date: NaiveDateTime,
    pub geometry: Arc<dyn GeometrySql>,
}

impl fmt::Debug for CompileEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileEnv")
            .field("dialect", &self.dialect)
            .field("max_date", &self.max_date)
            .finish_non_exhaustive()
    }
}

impl Default for CompileEnv {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            max_date: default_max_date(),
            geometry: Arc::new(OgcGeometrySql::default()),
        }
    }
}

lazy_static::lazy_static! {
    static ref DEFAULT_ENV: Arc<CompileEnv> = Arc::new(CompileEnv::default());
}

impl CompileEnv {
    pub fn new(dialect: Dialect, max_date: NaiveDateTime, geometry: Arc<dyn GeometrySql>) -> Self {
        Self {
            dialect,
            max_date,
            geometry,
        }
    }

    /// Process-wide default environment (default dialect, OGC geometry)
    pub fn shared_default() -> Arc<CompileEnv> {
        Arc::clone(&DEFAULT_ENV)
    }
}

/// SQL text plus its ordered bind values. The Nth `?` binds to `params[N]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Param>,
}

impl CompiledQuery {
    /// Number of `?` placeholders outside single-quoted literals
    pub fn placeholder_count(&self) -> usize {
        let mut in_literal = false;
        let mut count = 0;
        for c in self.sql.chars() {
            match c {
                '\'' => in_literal = !in_literal,
                '?' if !in_literal => count += 1,
                _ => {}
            }
        }
        count
    }
}

/// Everything a renderer needs during one compile.
pub(crate) struct RenderCx<'a> {
    pub tokens: &'a Tokens,
    pub env: &'a CompileEnv,
    pub mode: CompileMode,
    pub link_table: Option<&'a LinkTableConfig>,
    pub link_statuses: &'a [String],
}
