//! Join relationships between participating nodes
//!
//! A [`LinkKind`] describes how two nodes relate; resolving it yields a
//! [`JoinPlan`] the traversal renders either inline (`JOIN ... ON ...`) or
//! inside a derived LEFT JOIN table.

use super::dialect::Tokens;
use super::errors::CompileError;
use super::scope::TableScope;
use crate::catalog::{repo_columns, LinkDescriptor};
use crate::config::SQL_IDENTIFIER;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub(crate) fn keyword<'t>(&self, tokens: &'t Tokens) -> &'t str {
        match self {
            JoinKind::Inner => &tokens.inner_join,
            JoinKind::Left => &tokens.left_join,
            JoinKind::Right => &tokens.right_join,
        }
    }
}

/// Relationship between a node and its join partner.
///
/// `prev` is the partner already present in the FROM clause, `next` the node
/// being joined.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkKind {
    /// `next.object_id = prev.parent_id`
    Child,
    /// `next.parent_id = prev.object_id`
    Parent,
    /// `prev.left[i] = next.right[i]` for every i
    Custom { left: Vec<String>, right: Vec<String> },
    /// Raw ON clause, used verbatim. Not validated or escaped.
    CustomFreeText(String),
    /// Through the link table: `prev.object_id = lnk.link_obj_id_1`, `lnk.link_obj_id_2 = next.object_id`
    DbLink { link_type_id: Option<i64> },
    /// Through the link table with the two object-id columns swapped
    DbLinkReverse { link_type_id: Option<i64> },
    /// `prev.object_id = next.field`
    Denormalized { field: String },
    /// `prev.field = next.object_id`
    DenormalizedReverse { field: String },
    /// `prev.left_field = next.right_field`
    DenormalizedFull {
        left_field: String,
        right_field: String,
    },
}

impl LinkKind {
    /// Custom column-pair join; both lists must have the same length.
    pub fn custom(left: Vec<String>, right: Vec<String>) -> Result<Self, CompileError> {
        check_custom_arity(&left, &right)?;
        Ok(LinkKind::Custom { left, right })
    }

    pub fn db_link(link_type_id: i64) -> Self {
        LinkKind::DbLink {
            link_type_id: Some(link_type_id),
        }
    }

    pub fn db_link_reverse(link_type_id: i64) -> Self {
        LinkKind::DbLinkReverse {
            link_type_id: Some(link_type_id),
        }
    }

    /// Link through a catalog-resolved link type
    pub fn from_descriptor(descriptor: &LinkDescriptor, reverse: bool) -> Self {
        if reverse {
            Self::db_link_reverse(descriptor.id)
        } else {
            Self::db_link(descriptor.id)
        }
    }

    pub fn uses_link_table(&self) -> bool {
        matches!(self, LinkKind::DbLink { .. } | LinkKind::DbLinkReverse { .. })
    }

    pub(crate) fn plan(&self) -> Result<JoinPlan, CompileError> {
        let id = repo_columns::OBJECT_ID.to_string();
        let plan = match self {
            LinkKind::Child => JoinPlan::Columns {
                pairs: vec![(repo_columns::PARENT_ID.to_string(), id)],
                next_first: true,
            },
            LinkKind::Parent => JoinPlan::Columns {
                pairs: vec![(id, repo_columns::PARENT_ID.to_string())],
                next_first: true,
            },
            LinkKind::Custom { left, right } => {
                check_custom_arity(left, right)?;
                JoinPlan::Columns {
                    pairs: left.iter().cloned().zip(right.iter().cloned()).collect(),
                    next_first: false,
                }
            }
            LinkKind::CustomFreeText(sql) => JoinPlan::FreeText(sql.clone()),
            LinkKind::DbLink { link_type_id } => JoinPlan::LinkTable {
                link_type_id: link_type_id.ok_or_else(|| {
                    CompileError::LinkTypeUnresolved("DbLink without a link type id".to_string())
                })?,
                near: LinkEnd::First,
            },
            LinkKind::DbLinkReverse { link_type_id } => JoinPlan::LinkTable {
                link_type_id: link_type_id.ok_or_else(|| {
                    CompileError::LinkTypeUnresolved(
                        "DbLinkReverse without a link type id".to_string(),
                    )
                })?,
                near: LinkEnd::Second,
            },
            LinkKind::Denormalized { field } => JoinPlan::Columns {
                pairs: vec![(id, field.clone())],
                next_first: false,
            },
            LinkKind::DenormalizedReverse { field } => JoinPlan::Columns {
                pairs: vec![(field.clone(), id)],
                next_first: false,
            },
            LinkKind::DenormalizedFull {
                left_field,
                right_field,
            } => JoinPlan::Columns {
                pairs: vec![(left_field.clone(), right_field.clone())],
                next_first: false,
            },
        };
        Ok(plan)
    }
}

fn check_custom_arity(left: &[String], right: &[String]) -> Result<(), CompileError> {
    if left.len() != right.len() || left.is_empty() {
        return Err(CompileError::JoinConfigurationError(format!(
            "custom join needs equal, non-empty column lists (left has {}, right has {})",
            left.len(),
            right.len()
        )));
    }
    Ok(())
}

/// Which link-table object-id column faces the join partner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkEnd {
    First,
    Second,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JoinPlan {
    /// Column equalities `(prev column, next column)`
    Columns {
        pairs: Vec<(String, String)>,
        /// Render `next = prev` instead of `prev = next`
        next_first: bool,
    },
    FreeText(String),
    LinkTable { link_type_id: i64, near: LinkEnd },
}

impl JoinPlan {
    /// ON condition for joins that do not go through the link table
    pub fn on_clause(&self, prev: &TableScope, next: &TableScope, tokens: &Tokens) -> String {
        match self {
            JoinPlan::Columns { pairs, next_first } => pairs
                .iter()
                .map(|(p, n)| {
                    let prev_col = prev.column(tokens, p);
                    let next_col = next.column(tokens, n);
                    if *next_first {
                        format!("{} {} {}", next_col, tokens.eq, prev_col)
                    } else {
                        format!("{} {} {}", prev_col, tokens.eq, next_col)
                    }
                })
                .collect::<Vec<_>>()
                .join(&format!(" {} ", tokens.and)),
            JoinPlan::FreeText(sql) => sql.clone(),
            JoinPlan::LinkTable { .. } => String::new(),
        }
    }
}

fn default_link_type_id() -> String {
    "link_type_id".to_string()
}
fn default_obj_id_1() -> String {
    "link_obj_id_1".to_string()
}
fn default_obj_id_2() -> String {
    "link_obj_id_2".to_string()
}
fn default_status() -> String {
    repo_columns::STATUS.to_string()
}
fn default_dt_insert() -> String {
    repo_columns::DT_INSERT.to_string()
}
fn default_dt_delete() -> String {
    repo_columns::DT_DELETE.to_string()
}

/// Column names of the generic link table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkColumns {
    #[serde(default = "default_link_type_id")]
    pub link_type_id: String,
    #[serde(default = "default_obj_id_1")]
    pub obj_id_1: String,
    #[serde(default = "default_obj_id_2")]
    pub obj_id_2: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_dt_insert")]
    pub dt_insert: String,
    #[serde(default = "default_dt_delete")]
    pub dt_delete: String,
}

impl Default for LinkColumns {
    fn default() -> Self {
        Self {
            link_type_id: default_link_type_id(),
            obj_id_1: default_obj_id_1(),
            obj_id_2: default_obj_id_2(),
            status: default_status(),
            dt_insert: default_dt_insert(),
            dt_delete: default_dt_delete(),
        }
    }
}

impl LinkColumns {
    /// All columns, in projection order
    pub fn all(&self) -> [&str; 6] {
        [
            &self.link_type_id,
            &self.obj_id_1,
            &self.obj_id_2,
            &self.status,
            &self.dt_insert,
            &self.dt_delete,
        ]
    }

    /// `(column facing prev, column facing next)`
    pub(crate) fn ends(&self, near: LinkEnd) -> (&str, &str) {
        match near {
            LinkEnd::First => (&self.obj_id_1, &self.obj_id_2),
            LinkEnd::Second => (&self.obj_id_2, &self.obj_id_1),
        }
    }
}

/// Location of the generic link table. Graph-level configuration shared by
/// every `DbLink`/`DbLinkReverse` resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LinkTableConfig {
    #[validate(regex(path = *SQL_IDENTIFIER, message = "link table schema must be a plain SQL identifier"))]
    pub schema: String,
    #[validate(regex(path = *SQL_IDENTIFIER, message = "link table name must be a plain SQL identifier"))]
    pub table: String,
    #[serde(default)]
    pub columns: LinkColumns,
}

impl LinkTableConfig {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns: LinkColumns::default(),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// The link table is always aliased after the node it leads to
    pub fn link_alias(&self, target_alias: &str) -> String {
        format!("lnk{}", target_alias)
    }

    /// `(lnk."status" = 'A' OR lnk."status" = 'B')`, or `None` for an empty list
    pub(crate) fn status_filter(
        &self,
        tokens: &Tokens,
        link_alias: &str,
        statuses: &[String],
    ) -> Option<String> {
        if statuses.is_empty() {
            return None;
        }
        let column = tokens.qualified(link_alias, &self.columns.status);
        let terms: Vec<String> = statuses
            .iter()
            .map(|s| format!("{} {} '{}'", column, tokens.eq, s.replace('\'', "''")))
            .collect();
        Some(format!("({})", terms.join(&format!(" {} ", tokens.or))))
    }
}
