//! Predicate model
//!
//! A [`Criterion`] is one comparison or a [`PredicateGroup`]. Groups are flat
//! lists: each member carries the connector that joins it to the *next*
//! member, so `a (OR) b (AND) c` renders as `(a OR b AND c)`.
//!
//! Field names are always relative to the node the predicate is attached to;
//! the node supplies the alias when rendering.

use super::env::RenderCx;
use super::errors::CompileError;
use super::geometry::BoundingBox;
use super::param::{Param, SqlFragment};
use super::query_node::QueryNode;
use super::scope::TableScope;
use crate::catalog::repo_columns;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOp {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Param),
    /// Another column of the same node
    Field(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Between {
    /// `field BETWEEN ? AND ?`
    FieldBetweenValues {
        field: String,
        low: Param,
        high: Param,
    },
    /// `? BETWEEN low_field AND high_field`
    ValueBetweenFields {
        value: Param,
        low_field: String,
        high_field: String,
    },
}

/// Correlated link-table filter: the node's object must be linked (with the
/// given link type, optionally to one of `related_ids`).
#[derive(Debug, Clone, PartialEq)]
pub struct LinkFilter {
    pub link_type_id: i64,
    pub related_ids: Vec<i64>,
    pub reference_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: CompareOp,
        operand: Operand,
    },
    IsNull {
        field: String,
    },
    Between(Between),
    /// Delegates to the geometry collaborator
    Bbox {
        field: String,
        bbox: BoundingBox,
    },
    InList {
        field: String,
        values: Vec<Param>,
    },
    /// `field IN (SELECT ... FROM <node>)`
    InSubquery {
        field: String,
        query: Box<QueryNode>,
    },
    DbLink(LinkFilter),
    DbLinkReverse(LinkFilter),
    /// Raw SQL with its own bind values. Not validated or escaped: the caller
    /// owns whatever ends up in `sql`.
    FreeText {
        sql: String,
        params: Vec<Param>,
    },
    Group(PredicateGroup),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub condition: Condition,
    /// Render as `NOT (...)`
    pub negated: bool,
    /// Connector to the next sibling
    pub connector: LogicOp,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredicateGroup {
    pub members: Vec<Criterion>,
}

impl From<Condition> for Criterion {
    fn from(condition: Condition) -> Self {
        Criterion {
            condition,
            negated: false,
            connector: LogicOp::And,
        }
    }
}

impl Criterion {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Param>) -> Self {
        Condition::Compare {
            field: field.into(),
            op,
            operand: Operand::Value(value.into()),
        }
        .into()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Param>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Field-to-field comparison on the same node
    pub fn compare_fields(
        field: impl Into<String>,
        op: CompareOp,
        other: impl Into<String>,
    ) -> Self {
        Condition::Compare {
            field: field.into(),
            op,
            operand: Operand::Field(other.into()),
        }
        .into()
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Condition::IsNull {
            field: field.into(),
        }
        .into()
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<Param>,
        high: impl Into<Param>,
    ) -> Self {
        Condition::Between(Between::FieldBetweenValues {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        })
        .into()
    }

    pub fn value_between_fields(
        value: impl Into<Param>,
        low_field: impl Into<String>,
        high_field: impl Into<String>,
    ) -> Self {
        Condition::Between(Between::ValueBetweenFields {
            value: value.into(),
            low_field: low_field.into(),
            high_field: high_field.into(),
        })
        .into()
    }

    pub fn bbox(field: impl Into<String>, bbox: BoundingBox) -> Self {
        Condition::Bbox {
            field: field.into(),
            bbox,
        }
        .into()
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Param>) -> Self {
        Condition::InList {
            field: field.into(),
            values,
        }
        .into()
    }

    pub fn in_subquery(field: impl Into<String>, query: QueryNode) -> Self {
        Condition::InSubquery {
            field: field.into(),
            query: Box::new(query),
        }
        .into()
    }

    pub fn db_link(link_type_id: i64, related_ids: Vec<i64>) -> Self {
        Condition::DbLink(LinkFilter {
            link_type_id,
            related_ids,
            reference_date: None,
        })
        .into()
    }

    pub fn db_link_reverse(link_type_id: i64, related_ids: Vec<i64>) -> Self {
        Condition::DbLinkReverse(LinkFilter {
            link_type_id,
            related_ids,
            reference_date: None,
        })
        .into()
    }

    pub fn free_text(sql: impl Into<String>, params: Vec<Param>) -> Self {
        Condition::FreeText {
            sql: sql.into(),
            params,
        }
        .into()
    }

    /// Group whose members are all joined with AND
    pub fn all(members: Vec<Criterion>) -> Self {
        Self::group(
            members
                .into_iter()
                .map(|m| m.connected_by(LogicOp::And))
                .collect(),
        )
    }

    /// Group whose members are all joined with OR
    pub fn any(members: Vec<Criterion>) -> Self {
        Self::group(
            members
                .into_iter()
                .map(|m| m.connected_by(LogicOp::Or))
                .collect(),
        )
    }

    /// Group keeping each member's own connector
    pub fn group(members: Vec<Criterion>) -> Self {
        Condition::Group(PredicateGroup { members }).into()
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn connected_by(mut self, connector: LogicOp) -> Self {
        self.connector = connector;
        self
    }

    /// Temporal validity of a row:
    /// `? BETWEEN dt_insert AND dt_delete` with a reference date, otherwise
    /// `dt_delete = MAX_DATE`, widened with `OR dt_delete IS NULL` when the row
    /// sits on the right side of a LEFT join.
    pub fn validity(
        dt_insert: &str,
        dt_delete: &str,
        reference_date: Option<NaiveDateTime>,
        left_joined: bool,
        max_date: NaiveDateTime,
    ) -> Self {
        match reference_date {
            Some(date) => Self::value_between_fields(date, dt_insert, dt_delete),
            None if left_joined => Self::group(vec![
                Self::eq(dt_delete, max_date).connected_by(LogicOp::Or),
                Self::is_null(dt_delete),
            ]),
            None => Self::eq(dt_delete, max_date),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.condition, Condition::Group(_))
    }

    pub(crate) fn render(
        &self,
        cx: &RenderCx<'_>,
        scope: &TableScope,
    ) -> Result<Option<SqlFragment>, CompileError> {
        let Some(inner) = self.condition.render(cx, scope)? else {
            return Ok(None);
        };
        if !self.negated {
            return Ok(Some(inner));
        }
        let inner = if self.is_group() {
            inner
        } else {
            inner.parenthesized()
        };
        Ok(Some(SqlFragment::new(
            format!("{} {}", cx.tokens.not, inner.sql),
            inner.params,
        )))
    }

    /// Render with exactly one pair of enclosing parentheses
    pub(crate) fn render_enclosed(
        &self,
        cx: &RenderCx<'_>,
        scope: &TableScope,
    ) -> Result<Option<SqlFragment>, CompileError> {
        let rendered = self.render(cx, scope)?;
        Ok(rendered.map(|f| {
            if self.is_group() && !self.negated {
                f
            } else {
                f.parenthesized()
            }
        }))
    }
}

impl CompareOp {
    fn token<'t>(&self, tokens: &'t super::dialect::Tokens) -> &'t str {
        match self {
            CompareOp::Eq => &tokens.eq,
            CompareOp::NotEq => &tokens.ne,
            CompareOp::Lt => &tokens.lt,
            CompareOp::LtEq => &tokens.le,
            CompareOp::Gt => &tokens.gt,
            CompareOp::GtEq => &tokens.ge,
            CompareOp::Like => &tokens.like,
            CompareOp::NotLike => &tokens.not_like,
        }
    }
}

impl Condition {
    fn render(
        &self,
        cx: &RenderCx<'_>,
        scope: &TableScope,
    ) -> Result<Option<SqlFragment>, CompileError> {
        let t = cx.tokens;
        let fragment = match self {
            Condition::Compare { field, op, operand } => {
                let lhs = scope.column(t, field);
                match operand {
                    Operand::Value(v) => SqlFragment::new(
                        format!("{} {} ?", lhs, op.token(t)),
                        vec![v.clone()],
                    ),
                    Operand::Field(other) => SqlFragment::text(format!(
                        "{} {} {}",
                        lhs,
                        op.token(t),
                        scope.column(t, other)
                    )),
                }
            }
            Condition::IsNull { field } => {
                SqlFragment::text(format!("{} {}", scope.column(t, field), t.is_null))
            }
            Condition::Between(Between::FieldBetweenValues { field, low, high }) => {
                SqlFragment::new(
                    format!("{} {} ? {} ?", scope.column(t, field), t.between, t.and),
                    vec![low.clone(), high.clone()],
                )
            }
            Condition::Between(Between::ValueBetweenFields {
                value,
                low_field,
                high_field,
            }) => SqlFragment::new(
                format!(
                    "? {} {} {} {}",
                    t.between,
                    scope.column(t, low_field),
                    t.and,
                    scope.column(t, high_field)
                ),
                vec![value.clone()],
            ),
            Condition::Bbox { field, bbox } => {
                let geometry = &cx.env.geometry;
                SqlFragment::new(
                    geometry.bbox_sql(&scope.column(t, field)),
                    geometry.bbox_params(bbox),
                )
            }
            Condition::InList { field, values } => {
                if values.is_empty() {
                    SqlFragment::text(format!("1 {} 0", t.eq))
                } else {
                    let marks = vec!["?"; values.len()].join(", ");
                    SqlFragment::new(
                        format!("{} {} ({})", scope.column(t, field), t.in_, marks),
                        values.clone(),
                    )
                }
            }
            Condition::InSubquery { field, query } => {
                let sub_alias = format!("{}_sq", scope.alias);
                let sub = query.render_subselect(cx, &sub_alias)?;
                SqlFragment::new(
                    format!("{} {} ({})", scope.column(t, field), t.in_, sub.sql),
                    sub.params,
                )
            }
            Condition::DbLink(filter) => render_link_filter(cx, scope, filter, false)?,
            Condition::DbLinkReverse(filter) => render_link_filter(cx, scope, filter, true)?,
            Condition::FreeText { sql, params } => SqlFragment::new(sql.clone(), params.clone()),
            Condition::Group(group) => return group.render(cx, scope),
        };
        Ok(Some(fragment))
    }
}

impl PredicateGroup {
    pub fn new(members: Vec<Criterion>) -> Self {
        Self { members }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members joined by their trailing connectors; the last connector is
    /// dropped. Members that render to nothing are skipped.
    fn render(
        &self,
        cx: &RenderCx<'_>,
        scope: &TableScope,
    ) -> Result<Option<SqlFragment>, CompileError> {
        let mut rendered: Vec<(SqlFragment, LogicOp)> = Vec::new();
        for member in &self.members {
            if let Some(fragment) = member.render(cx, scope)? {
                rendered.push((fragment, member.connector));
            }
        }
        if rendered.is_empty() {
            return Ok(None);
        }
        Ok(Some(join_with_connectors(cx, rendered).parenthesized()))
    }
}

/// `a OP0 b OP1 c`: each part's connector joins it to the following part
pub(crate) fn join_with_connectors(
    cx: &RenderCx<'_>,
    parts: Vec<(SqlFragment, LogicOp)>,
) -> SqlFragment {
    let mut out = SqlFragment::default();
    let mut pending: Option<LogicOp> = None;
    for (fragment, connector) in parts {
        if let Some(op) = pending {
            let keyword = match op {
                LogicOp::And => &cx.tokens.and,
                LogicOp::Or => &cx.tokens.or,
            };
            out.push_str(&format!(" {} ", keyword));
        }
        out.append(fragment);
        pending = Some(connector);
    }
    out
}

/// `EXISTS (SELECT 1 FROM link l WHERE l.near = alias.object_id AND l.link_type_id = N AND <validity> ...)`
fn render_link_filter(
    cx: &RenderCx<'_>,
    scope: &TableScope,
    filter: &LinkFilter,
    reverse: bool,
) -> Result<SqlFragment, CompileError> {
    let t = cx.tokens;
    let link_table = cx.link_table.ok_or_else(|| {
        CompileError::link_error_with_context(
            "link filter requires a configured link table",
            format!("predicate on '{}'", scope.alias),
        )
    })?;
    let cols = &link_table.columns;
    let (near, far) = if reverse {
        (&cols.obj_id_2, &cols.obj_id_1)
    } else {
        (&cols.obj_id_1, &cols.obj_id_2)
    };
    let link_alias = format!("{}_f", link_table.link_alias(&scope.alias));
    let link_scope = TableScope::uniform(link_alias.clone());

    let mut conditions = vec![
        SqlFragment::text(format!(
            "{} {} {}",
            link_scope.column(t, near),
            t.eq,
            scope.column(t, repo_columns::OBJECT_ID)
        )),
        SqlFragment::text(format!(
            "{} {} {}",
            link_scope.column(t, &cols.link_type_id),
            t.eq,
            filter.link_type_id
        )),
    ];
    let validity = Criterion::validity(
        &cols.dt_insert,
        &cols.dt_delete,
        filter.reference_date,
        false,
        cx.env.max_date,
    );
    if let Some(fragment) = validity.render(cx, &link_scope)? {
        conditions.push(fragment);
    }
    if !filter.related_ids.is_empty() {
        let marks = vec!["?"; filter.related_ids.len()].join(", ");
        conditions.push(SqlFragment::new(
            format!("{} {} ({})", link_scope.column(t, far), t.in_, marks),
            filter
                .related_ids
                .iter()
                .map(|id| Param::Integer(*id))
                .collect(),
        ));
    }
    if let Some(status) = link_table.status_filter(t, &link_alias, cx.link_statuses) {
        conditions.push(SqlFragment::text(status));
    }

    let body = SqlFragment::join(conditions, &format!(" {} ", t.and));
    Ok(SqlFragment::new(
        format!(
            "{} ({} 1 {} {} {} {} {})",
            t.exists,
            t.select,
            t.from,
            link_table.qualified_name(),
            link_alias,
            t.where_,
            body.sql
        ),
        body.params,
    ))
}
