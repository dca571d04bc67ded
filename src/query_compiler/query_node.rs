//! One participating table or sub-query
//!
//! A [`QueryNode`] is a builder: the caller configures it, hands it to a
//! [`QueryGraph`](super::query_graph::QueryGraph) (or compiles it alone) and
//! never shares it between graphs. Its validity predicate is derived on every
//! render from the current reference date, join kind and history flag, so
//! changing any of them takes effect immediately.

use super::criterion::{Criterion, LogicOp};
use super::dialect::{Dialect, Tokens};
use super::env::{CompileEnv, CompileMode, CompiledQuery, RenderCx};
use super::errors::CompileError;
use super::geometry::GeometrySql;
use super::link::{JoinKind, LinkKind, LinkTableConfig};
use super::param::{Param, SqlFragment};
use super::query_graph::QueryGraph;
use super::scope::TableScope;
use super::Query;
use crate::catalog::{repo_columns, TableDescriptor};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

/// Raw sub-query used in place of a table. The text is never parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub sql: String,
    /// Columns the sub-query exposes
    pub fields: Vec<String>,
    /// Values for the `?` inside `sql`
    pub params: Vec<Param>,
}

impl SubQuery {
    pub fn new(sql: impl Into<String>, fields: Vec<String>, params: Vec<Param>) -> Self {
        Self {
            sql: sql.into(),
            fields,
            params,
        }
    }
}

/// Settings a node compiled on its own uses in place of an owning graph's
#[derive(Debug, Clone, Default)]
struct StandaloneEnv {
    env: Option<Arc<CompileEnv>>,
    link_table: Option<LinkTableConfig>,
    link_statuses: Vec<String>,
}

impl PartialEq for StandaloneEnv {
    fn eq(&self, other: &Self) -> bool {
        let same_env = match (&self.env, &other.env) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same_env && self.link_table == other.link_table && self.link_statuses == other.link_statuses
    }
}

/// A node reads either a catalog table or a sub-query, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSource {
    Table(Arc<TableDescriptor>),
    SubQuery(SubQuery),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryNode {
    source: Option<NodeSource>,
    alias: Option<String>,
    /// Position inside the owning graph; names the default alias `t<seq>`
    pub(crate) seq: usize,
    predicate: Option<Criterion>,
    /// Overrides the predicate's own connector; kept even without a predicate
    connector: Option<LogicOp>,
    history: bool,
    reference_date: Option<NaiveDateTime>,
    link_reference_date: Option<NaiveDateTime>,
    link: Option<LinkKind>,
    join_kind: JoinKind,
    sort_fields: Vec<SortField>,
    return_projection: bool,
    project_link_columns: bool,
    custom_fields: Option<Vec<String>>,
    last_mode: CompileMode,
    standalone: StandaloneEnv,
}

impl QueryNode {
    pub fn new(table: Arc<TableDescriptor>) -> Self {
        Self {
            source: Some(NodeSource::Table(table)),
            ..Default::default()
        }
    }

    pub fn from_sub_query(sub_query: SubQuery) -> Self {
        Self {
            source: Some(NodeSource::SubQuery(sub_query)),
            ..Default::default()
        }
    }

    /// Node without a source yet; compiling it fails until one is set
    pub fn unbound() -> Self {
        Self::default()
    }

    // ---- builder ----

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_predicate(mut self, predicate: Criterion) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Connector to the next node's WHERE part, whether or not a predicate is set
    pub fn with_connector(mut self, connector: LogicOp) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Environment used by [`Query`] calls on this node alone. Graphs use their own.
    pub fn with_env(mut self, env: Arc<CompileEnv>) -> Self {
        self.standalone.env = Some(env);
        self
    }

    /// Link table and accepted statuses used by [`Query`] calls on this node alone
    pub fn with_link_table(mut self, link_table: LinkTableConfig, statuses: Vec<String>) -> Self {
        self.standalone.link_table = Some(link_table);
        self.standalone.link_statuses = statuses;
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDateTime) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn with_link_reference_date(mut self, date: NaiveDateTime) -> Self {
        self.link_reference_date = Some(date);
        self
    }

    pub fn with_history(mut self, history: bool) -> Self {
        self.history = history;
        self
    }

    pub fn with_link(mut self, link: LinkKind) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_join(mut self, join_kind: JoinKind) -> Self {
        self.join_kind = join_kind;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort_fields.push(SortField {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn as_return_projection(mut self) -> Self {
        self.return_projection = true;
        self
    }

    pub fn with_link_columns(mut self) -> Self {
        self.project_link_columns = true;
        self
    }

    /// Replace the default all-columns projection
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.custom_fields = Some(fields);
        self
    }

    // ---- mutation ----

    pub fn set_table(&mut self, table: Arc<TableDescriptor>) {
        self.source = Some(NodeSource::Table(table));
    }

    pub fn set_sub_query(&mut self, sub_query: SubQuery) {
        self.source = Some(NodeSource::SubQuery(sub_query));
    }

    pub fn set_alias(&mut self, alias: Option<String>) {
        self.alias = alias;
    }

    pub fn set_predicate(&mut self, predicate: Option<Criterion>) {
        self.predicate = predicate;
    }

    pub fn set_connector(&mut self, connector: Option<LogicOp>) {
        self.connector = connector;
    }

    pub fn set_env(&mut self, env: Option<Arc<CompileEnv>>) {
        self.standalone.env = env;
    }

    pub fn set_reference_date(&mut self, date: Option<NaiveDateTime>) {
        self.reference_date = date;
    }

    pub fn set_link_reference_date(&mut self, date: Option<NaiveDateTime>) {
        self.link_reference_date = date;
    }

    pub fn set_history(&mut self, history: bool) {
        self.history = history;
    }

    pub fn set_join_kind(&mut self, join_kind: JoinKind) {
        self.join_kind = join_kind;
    }

    pub fn set_link(&mut self, link: Option<LinkKind>) {
        self.link = link;
    }

    pub fn set_return_projection(&mut self, flag: bool) {
        self.return_projection = flag;
    }

    pub fn set_project_link_columns(&mut self, flag: bool) {
        self.project_link_columns = flag;
    }

    pub fn set_fields(&mut self, fields: Option<Vec<String>>) {
        self.custom_fields = fields;
    }

    pub fn add_sort_field(&mut self, field: SortField) {
        self.sort_fields.push(field);
    }

    // ---- accessors ----

    pub fn source(&self) -> Option<&NodeSource> {
        self.source.as_ref()
    }

    pub fn table(&self) -> Option<&Arc<TableDescriptor>> {
        match &self.source {
            Some(NodeSource::Table(table)) => Some(table),
            _ => None,
        }
    }

    pub fn sub_query(&self) -> Option<&SubQuery> {
        match &self.source {
            Some(NodeSource::SubQuery(sub_query)) => Some(sub_query),
            _ => None,
        }
    }

    /// Explicit alias, else `t<seq>`
    pub fn alias(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| format!("t{}", self.seq))
    }

    pub fn predicate(&self) -> Option<&Criterion> {
        self.predicate.as_ref()
    }

    pub fn reference_date(&self) -> Option<NaiveDateTime> {
        self.reference_date
    }

    pub fn link_reference_date(&self) -> Option<NaiveDateTime> {
        self.link_reference_date
    }

    pub fn is_history(&self) -> bool {
        self.history
    }

    pub fn link(&self) -> Option<&LinkKind> {
        self.link.as_ref()
    }

    pub fn join_kind(&self) -> JoinKind {
        self.join_kind
    }

    pub fn sort_fields(&self) -> &[SortField] {
        &self.sort_fields
    }

    pub fn is_return_projection(&self) -> bool {
        self.return_projection
    }

    pub fn projects_link_columns(&self) -> bool {
        self.project_link_columns
    }

    pub fn custom_fields(&self) -> Option<&[String]> {
        self.custom_fields.as_deref()
    }

    /// Object type of the table this node reads, if any
    pub fn object_type_id(&self) -> Option<i64> {
        self.table().map(|t| t.object_type_id)
    }

    // ---- predicates ----

    /// Temporal validity filter, `None` in history mode or for sub-queries
    pub fn validity_predicate(&self, max_date: NaiveDateTime) -> Option<Criterion> {
        if self.history || self.table().is_none() {
            return None;
        }
        Some(Criterion::validity(
            repo_columns::DT_INSERT,
            repo_columns::DT_DELETE,
            self.reference_date,
            self.join_kind == JoinKind::Left,
            max_date,
        ))
    }

    /// Validity filter ANDed in front of the caller's predicate
    pub fn effective_predicate(&self, max_date: NaiveDateTime) -> Option<Criterion> {
        match (self.validity_predicate(max_date), &self.predicate) {
            (None, None) => None,
            (Some(validity), None) => Some(validity),
            (None, Some(user)) => Some(user.clone()),
            (Some(validity), Some(user)) => {
                let connector = user.connector;
                Some(
                    Criterion::group(vec![
                        validity.connected_by(LogicOp::And),
                        user.clone(),
                    ])
                    .connected_by(connector),
                )
            }
        }
    }

    /// Connector joining this node's predicate to the next one in the WHERE clause
    pub fn connector(&self) -> LogicOp {
        self.connector
            .or_else(|| self.predicate.as_ref().map(|p| p.connector))
            .unwrap_or_default()
    }

    pub(crate) fn render_predicate(
        &self,
        cx: &RenderCx<'_>,
        scope: &TableScope,
    ) -> Result<Option<SqlFragment>, CompileError> {
        match self.effective_predicate(cx.env.max_date) {
            Some(predicate) => predicate.render_enclosed(cx, scope),
            None => Ok(None),
        }
    }

    // ---- table reference and projection ----

    pub(crate) fn require_source(&self) -> Result<&NodeSource, CompileError> {
        self.source
            .as_ref()
            .ok_or_else(|| CompileError::MissingTableDescriptor {
                alias: self.alias(),
            })
    }

    pub(crate) fn scope(&self, alias: &str, physical: bool) -> TableScope {
        match self.table() {
            Some(table) if physical => TableScope::physical(
                alias,
                format!("r{}", alias),
                table.repo_fields.iter().map(|f| f.name.clone()).collect(),
            ),
            _ => TableScope::uniform(alias),
        }
    }

    /// `schema.v_table alias`, the physical repository/type join, or the
    /// sub-query text wrapped as a derived table
    pub(crate) fn table_reference(
        &self,
        tokens: &Tokens,
        alias: &str,
        physical: bool,
    ) -> Result<SqlFragment, CompileError> {
        match self.require_source()? {
            NodeSource::Table(table) if physical => {
                let repo_alias = format!("r{}", alias);
                Ok(SqlFragment::text(format!(
                    "({} {} {} {} {} {} {} {} {})",
                    table.qualified_repo_table(),
                    repo_alias,
                    tokens.inner_join,
                    table.qualified_table(),
                    alias,
                    tokens.on,
                    tokens.qualified(&repo_alias, repo_columns::PKID),
                    tokens.eq,
                    tokens.qualified(alias, &table.row_id_column)
                )))
            }
            NodeSource::Table(table) => Ok(SqlFragment::text(format!(
                "{} {}",
                table.qualified_view(),
                alias
            ))),
            NodeSource::SubQuery(sub_query) => Ok(SqlFragment::new(
                format!("({}) {}", sub_query.sql, alias),
                sub_query.params.clone(),
            )),
        }
    }

    /// `alias."COLUMN" AS "prefix_COLUMN"` items: repository columns first,
    /// then type columns without the row-id column. GEOMETRY columns are
    /// skipped unless `include_geometry`, in which case they are read through
    /// the geometry collaborator. A custom field list replaces all of this.
    pub(crate) fn projection(
        &self,
        tokens: &Tokens,
        geometry: &dyn GeometrySql,
        scope: &TableScope,
        include_geometry: bool,
    ) -> Result<Vec<String>, CompileError> {
        let prefix = self.alias();
        let plain = |name: &str| tokens.projected(scope.alias_for(name), name, &prefix);

        if let Some(fields) = &self.custom_fields {
            return Ok(fields
                .iter()
                .map(|name| match self.table() {
                    Some(table) if table.is_geometry_field(name) => {
                        geometry_item(tokens, geometry, scope, name, &prefix)
                    }
                    _ => plain(name),
                })
                .collect());
        }

        match self.require_source()? {
            NodeSource::SubQuery(sub_query) => {
                Ok(sub_query.fields.iter().map(|name| plain(name)).collect())
            }
            NodeSource::Table(table) => {
                let mut items = Vec::new();
                for field in table.repo_fields.iter().chain(table.projected_type_fields()) {
                    if field.is_geometry() {
                        if include_geometry {
                            items.push(geometry_item(tokens, geometry, scope, &field.name, &prefix));
                        }
                    } else {
                        items.push(plain(&field.name));
                    }
                }
                Ok(items)
            }
        }
    }

    /// Comma-separated projection for the given aliases. Passing the same
    /// alias twice renders against the view; distinct aliases render against
    /// the physical repository (`repo_alias`) and type (`table_alias`) tables.
    pub fn field_list(
        &self,
        dialect: &Dialect,
        geometry: &dyn GeometrySql,
        repo_alias: &str,
        table_alias: &str,
        include_geometry: bool,
    ) -> Result<String, CompileError> {
        let tokens = dialect.tokens()?;
        let scope = match self.table() {
            Some(table) if repo_alias != table_alias => TableScope::physical(
                table_alias,
                repo_alias,
                table.repo_fields.iter().map(|f| f.name.clone()).collect(),
            ),
            _ => TableScope::uniform(table_alias),
        };
        Ok(self
            .projection(&tokens, geometry, &scope, include_geometry)?
            .join(", "))
    }

    /// Plain column list for a derived table built from this node: `alias.*`
    /// for views and sub-queries, explicit columns in physical mode.
    pub(crate) fn derived_columns(&self, tokens: &Tokens, scope: &TableScope, physical: bool) -> String {
        match self.table() {
            Some(table) if physical => table
                .repo_fields
                .iter()
                .chain(table.projected_type_fields())
                .map(|f| scope.column(tokens, &f.name))
                .collect::<Vec<_>>()
                .join(", "),
            _ => format!("{}.*", scope.alias),
        }
    }

    /// `SELECT <fields> FROM <table> WHERE <predicate>` used by `InSubquery`.
    /// Selects the custom field list, else the sub-query's first field, else
    /// `object_id`.
    pub(crate) fn render_subselect(
        &self,
        cx: &RenderCx<'_>,
        default_alias: &str,
    ) -> Result<SqlFragment, CompileError> {
        let t = cx.tokens;
        let alias = self.alias.clone().unwrap_or_else(|| default_alias.to_string());
        let physical = cx.mode.force_physical;
        let scope = self.scope(&alias, physical);

        let columns = match (&self.custom_fields, self.require_source()?) {
            (Some(fields), _) => fields
                .iter()
                .map(|f| scope.column(t, f))
                .collect::<Vec<_>>()
                .join(", "),
            (None, NodeSource::SubQuery(sub_query)) => match sub_query.fields.first() {
                Some(first) => scope.column(t, first),
                None => format!("{}.*", alias),
            },
            (None, NodeSource::Table(_)) => scope.column(t, repo_columns::OBJECT_ID),
        };

        let mut fragment = SqlFragment::text(format!("{} {} {} ", t.select, columns, t.from));
        fragment.append(self.table_reference(t, &alias, physical)?);
        if let Some(predicate) = self.render_predicate(cx, &scope)? {
            fragment.push_str(&format!(" {} ", t.where_));
            fragment.append(predicate);
        }
        Ok(fragment)
    }

    /// Compile this node on its own as a one-node graph. The node's link
    /// table settings carry over; `env` replaces its own.
    pub fn compile_in(
        &self,
        env: Arc<CompileEnv>,
        mode: CompileMode,
    ) -> Result<CompiledQuery, CompileError> {
        let mut graph = QueryGraph::forward(env);
        graph.set_link_table(self.standalone.link_table.clone());
        graph.set_link_statuses(self.standalone.link_statuses.clone());
        let mut node = self.clone();
        node.seq = 0;
        graph.add_item(node)?;
        graph.compile_query(mode)
    }

    fn standalone_env(&self) -> Arc<CompileEnv> {
        self.standalone
            .env
            .clone()
            .unwrap_or_else(CompileEnv::shared_default)
    }
}

fn geometry_item(
    tokens: &Tokens,
    geometry: &dyn GeometrySql,
    scope: &TableScope,
    name: &str,
    prefix: &str,
) -> String {
    format!(
        "{} {} {}",
        geometry.geometry_read_sql(&scope.column(tokens, name)),
        tokens.as_,
        tokens.quote(&format!("{}_{}", prefix, name))
    )
}

impl Query for QueryNode {
    fn compile_ex(
        &mut self,
        force_physical: bool,
        include_geometry: bool,
    ) -> Result<String, CompileError> {
        self.last_mode = CompileMode::new(force_physical, include_geometry);
        Ok(self.compile_in(self.standalone_env(), self.last_mode)?.sql)
    }

    fn param_values(&self) -> Result<Vec<Param>, CompileError> {
        Ok(self
            .compile_in(self.standalone_env(), self.last_mode)?
            .params)
    }
}
