//! Declarative-to-SQL query compiler
//!
//! A [`QueryGraph`] of [`QueryNode`]s (each a catalog table or raw sub-query)
//! compiles into parameterized SQL text plus its ordered bind values:
//!
//! ```text
//! QueryGraph (forward chain | reverse tree)
//!   -> traversal (depth-first, shared accumulators)
//!      -> QueryNode: table reference, projection, validity + Criterion
//!      -> LinkKind -> JoinPlan: inline JOIN or derived LEFT JOIN table
//!   -> CompiledQuery { sql, params }
//! ```
//!
//! The Nth `?` in the emitted text always binds to the Nth parameter.

pub mod criterion;
pub mod dialect;
pub mod env;
pub mod errors;
pub mod geometry;
mod legacy;
pub mod link;
pub mod param;
pub mod query_graph;
pub mod query_node;
mod scope;
mod traversal;

#[cfg(test)]
mod tests;

pub use criterion::{
    Between, CompareOp, Condition, Criterion, LinkFilter, LogicOp, Operand, PredicateGroup,
};
pub use dialect::Dialect;
pub use env::{default_max_date, CompileEnv, CompileMode, CompiledQuery};
pub use errors::CompileError;
pub use geometry::{BoundingBox, GeometrySql, OgcGeometrySql};
pub use link::{JoinKind, LinkColumns, LinkKind, LinkTableConfig};
pub use param::{Param, SqlFragment};
pub use query_graph::{GraphMode, NodeId, QueryGraph};
pub use query_node::{NodeSource, QueryNode, SortField, SubQuery};

/// Compilation surface shared by [`QueryNode`] and [`QueryGraph`].
///
/// `param_values` replays the mode of the last `compile_ex` call, so the
/// Nth placeholder of the returned text binds to the Nth returned value.
pub trait Query {
    /// Text only, against views and without geometry columns
    fn compile(&mut self) -> Result<String, CompileError> {
        self.compile_ex(false, false)
    }

    fn compile_ex(
        &mut self,
        force_physical: bool,
        include_geometry: bool,
    ) -> Result<String, CompileError>;

    fn param_values(&self) -> Result<Vec<Param>, CompileError>;
}
