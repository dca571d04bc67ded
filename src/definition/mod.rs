//! Declarative query definitions
//!
//! YAML documents describing a forward chain (`nodes`) or a reverse tree
//! (`root` with nested `children`). [`QueryDefinition::build`] resolves them
//! through a [`Catalog`](crate::catalog::Catalog) into a compilable
//! [`QueryGraph`](crate::query_compiler::QueryGraph).

mod builder;
pub mod errors;
pub mod model;

pub use errors::DefinitionError;
pub use model::{ConditionDef, CriterionDef, LinkDef, NodeDef, QueryDefinition, SubQueryDef};
