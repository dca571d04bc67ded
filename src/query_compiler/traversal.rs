//! Depth-first compilation of a [`QueryGraph`]
//!
//! Forward chains and reverse trees are walked by the same code; the
//! [`GraphMode`] only decides which node holds the link to the join partner
//! and whether LEFT joins get isolated in a derived table.
//!
//! Bind values follow the text: FROM-clause values (sub-query nodes, derived
//! LEFT tables) come first, then the WHERE clause.

use super::criterion::{join_with_connectors, Criterion, LogicOp};
use super::env::{CompileEnv, CompileMode, CompiledQuery, RenderCx};
use super::errors::CompileError;
use super::legacy;
use super::link::{JoinKind, JoinPlan, LinkEnd, LinkTableConfig};
use super::param::SqlFragment;
use super::query_graph::{GraphMode, NodeId, QueryGraph};
use super::query_node::QueryNode;
use super::scope::TableScope;
use crate::catalog::repo_columns;

pub(crate) fn compile(graph: &QueryGraph, mode: CompileMode) -> Result<CompiledQuery, CompileError> {
    if graph.is_empty() {
        return Err(CompileError::InvalidGraphMode(
            "cannot compile a graph without nodes".to_string(),
        ));
    }
    log::debug!(
        "Compiling {:?} graph with {} node(s), physical={}, geometry={}",
        graph.mode(),
        graph.len(),
        mode.force_physical,
        mode.include_geometry
    );

    let env: &CompileEnv = graph.env();
    let tokens = env.dialect.tokens()?;
    let cx = RenderCx {
        tokens: &tokens,
        env,
        mode,
        link_table: graph.link_table(),
        link_statuses: graph.link_statuses(),
    };

    let mut walker = Walker {
        graph,
        cx: &cx,
        projected: legacy::projected_nodes(graph),
        columns: Vec::new(),
        from: SqlFragment::default(),
        where_parts: Vec::new(),
        order_by: Vec::new(),
        scopes: vec![None; graph.len()],
    };
    for id in graph.walk_order() {
        walker.visit(id)?;
    }

    let compiled = walker.finish();
    log::debug!("Generated SQL:\n{}", compiled.sql);
    if compiled.placeholder_count() != compiled.params.len() {
        log::warn!(
            "SQL has {} placeholder(s) but {} bind value(s)",
            compiled.placeholder_count(),
            compiled.params.len()
        );
    }
    Ok(compiled)
}

/// Accumulators shared by every node visit
struct Walker<'g, 'c> {
    graph: &'g QueryGraph,
    cx: &'c RenderCx<'c>,
    projected: Vec<bool>,
    columns: Vec<String>,
    from: SqlFragment,
    where_parts: Vec<(SqlFragment, LogicOp)>,
    order_by: Vec<String>,
    /// How later nodes reach each visited node's columns
    scopes: Vec<Option<TableScope>>,
}

/// Link-table participation of one joined node
struct LinkJoin<'l> {
    config: &'l LinkTableConfig,
    alias: String,
    link_type_id: i64,
    near: LinkEnd,
    /// The link row sits on the right side of a LEFT join
    left: bool,
}

impl<'g, 'c> Walker<'g, 'c> {
    fn visit(&mut self, id: NodeId) -> Result<(), CompileError> {
        let graph = self.graph;
        let node = graph.node(id)?;
        let alias = node.alias();
        let physical = self.cx.mode.force_physical;
        node.require_source()?;

        let (scope, link, isolated) = match graph.parent(id) {
            None => {
                let scope = node.scope(&alias, physical);
                self.from
                    .append(node.table_reference(self.cx.tokens, &alias, physical)?);
                (scope, None, false)
            }
            Some(partner) => self.join(id, partner, node, &alias)?,
        };

        // the link row's date and history flag belong to the node holding the link
        let owned_link = match graph.mode() {
            GraphMode::Forward => self.outgoing_link(id, node)?,
            GraphMode::Reverse => None,
        };
        if !isolated {
            let own = match graph.mode() {
                GraphMode::Forward => owned_link.as_ref(),
                GraphMode::Reverse => link.as_ref(),
            };
            self.push_where(node, &scope, own)?;
        }

        if self.projected.get(id).copied().unwrap_or(false) {
            self.project(node, &scope, link.as_ref())?;
        }
        for sort in node.sort_fields() {
            let direction = if sort.descending {
                &self.cx.tokens.desc
            } else {
                &self.cx.tokens.asc
            };
            self.order_by
                .push(format!("{} {}", scope.column(self.cx.tokens, &sort.field), direction));
        }

        self.scopes[id] = Some(scope);
        Ok(())
    }

    /// Join `node` to `partner`, returning the scope later nodes use for it
    fn join(
        &mut self,
        id: NodeId,
        partner: NodeId,
        node: &'g QueryNode,
        alias: &str,
    ) -> Result<(TableScope, Option<LinkJoin<'c>>, bool), CompileError> {
        let prev_scope = self.scopes[partner]
            .clone()
            .ok_or(CompileError::UnknownNode(partner))?;
        let holder = self.graph.mode().link_holder(id, partner);
        let link_kind = self.graph.node(holder)?.link().ok_or_else(|| {
            CompileError::join_error_with_context(
                "no link kind configured between nodes",
                &prev_scope.alias,
                alias,
            )
        })?;
        let plan = link_kind.plan()?;
        log::trace!(
            "Joining '{}' to '{}' via {:?} ({:?})",
            alias,
            prev_scope.alias,
            link_kind,
            node.join_kind()
        );

        let link = self.link_join(&plan, node, alias, &prev_scope.alias)?;

        let isolate =
            node.join_kind() == JoinKind::Left && self.graph.mode().isolates_left_joins();
        let scope = if isolate {
            self.derived_join(node, alias, &prev_scope, &plan, link.as_ref())?
        } else {
            self.inline_join(node, alias, &prev_scope, &plan, link.as_ref())?
        };
        Ok((scope, link, isolate))
    }

    /// Link-table details of a join into `target`, `None` for direct joins
    fn link_join(
        &self,
        plan: &JoinPlan,
        target: &QueryNode,
        target_alias: &str,
        prev_alias: &str,
    ) -> Result<Option<LinkJoin<'c>>, CompileError> {
        let JoinPlan::LinkTable { link_type_id, near } = *plan else {
            return Ok(None);
        };
        let config = self.cx.link_table.ok_or_else(|| {
            CompileError::link_error_with_context(
                "link table is not configured for this graph",
                format!("joining '{}' to '{}'", target_alias, prev_alias),
            )
        })?;
        Ok(Some(LinkJoin {
            config,
            alias: config.link_alias(target_alias),
            link_type_id,
            near,
            left: target.join_kind() == JoinKind::Left,
        }))
    }

    /// Forward chains: the link row leading from `node` to its successor
    fn outgoing_link(
        &self,
        id: NodeId,
        node: &QueryNode,
    ) -> Result<Option<LinkJoin<'c>>, CompileError> {
        let (Some(&next), Some(kind)) = (self.graph.children(id).first(), node.link()) else {
            return Ok(None);
        };
        let target = self.graph.node(next)?;
        self.link_join(&kind.plan()?, target, &target.alias(), &node.alias())
    }

    /// `JOIN ref ON ...`; the node's predicate goes to the shared WHERE
    fn inline_join(
        &mut self,
        node: &QueryNode,
        alias: &str,
        prev_scope: &TableScope,
        plan: &JoinPlan,
        link: Option<&LinkJoin<'_>>,
    ) -> Result<TableScope, CompileError> {
        let t = self.cx.tokens;
        let physical = self.cx.mode.force_physical;
        let keyword = node.join_kind().keyword(t);
        let scope = node.scope(alias, physical);

        let on = match link {
            Some(link) => {
                let link_scope = TableScope::uniform(link.alias.clone());
                let (near, far) = link.config.columns.ends(link.near);
                let mut link_on = vec![
                    format!(
                        "{} {} {}",
                        prev_scope.column(t, repo_columns::OBJECT_ID),
                        t.eq,
                        link_scope.column(t, near)
                    ),
                    self.link_type_term(link, &link_scope),
                ];
                link_on.extend(self.link_status_term(link));
                self.from.push_str(&format!(
                    "\n{} {} {} {} {}",
                    keyword,
                    link.config.qualified_name(),
                    link.alias,
                    t.on,
                    link_on.join(&format!(" {} ", t.and))
                ));
                format!(
                    "{} {} {}",
                    link_scope.column(t, far),
                    t.eq,
                    scope.column(t, repo_columns::OBJECT_ID)
                )
            }
            None => plan.on_clause(prev_scope, &scope, t),
        };

        self.from.push_str(&format!("\n{} ", keyword));
        self.from
            .append(node.table_reference(t, alias, physical)?);
        self.from.push_str(&format!(" {} {}", t.on, on));
        Ok(scope)
    }

    /// `LEFT JOIN (SELECT ... WHERE <own predicate>) alias ON ...`
    ///
    /// The node's predicate and the link row's validity stay inside the
    /// derived table; the outer WHERE never sees them.
    fn derived_join(
        &mut self,
        node: &QueryNode,
        alias: &str,
        prev_scope: &TableScope,
        plan: &JoinPlan,
        link: Option<&LinkJoin<'_>>,
    ) -> Result<TableScope, CompileError> {
        let t = self.cx.tokens;
        let physical = self.cx.mode.force_physical;
        let inner_scope = node.scope(alias, physical);
        let outer_scope = TableScope::uniform(alias);

        let mut columns = vec![node.derived_columns(t, &inner_scope, physical)];
        let mut inner = SqlFragment::default();
        let on = match link {
            Some(link) => {
                let link_scope = TableScope::uniform(link.alias.clone());
                let (near, far) = link.config.columns.ends(link.near);
                columns.extend(
                    link.config
                        .columns
                        .all()
                        .iter()
                        .map(|col| t.projected(&link.alias, col, &link.alias)),
                );
                let mut link_on = vec![
                    format!(
                        "{} {} {}",
                        link_scope.column(t, far),
                        t.eq,
                        inner_scope.column(t, repo_columns::OBJECT_ID)
                    ),
                    self.link_type_term(link, &link_scope),
                ];
                link_on.extend(self.link_status_term(link));
                inner.push_str(&format!(
                    "{} {} {} ",
                    link.config.qualified_name(),
                    link.alias,
                    t.inner_join
                ));
                inner.append(node.table_reference(t, alias, physical)?);
                inner.push_str(&format!(
                    " {} {}",
                    t.on,
                    link_on.join(&format!(" {} ", t.and))
                ));
                format!(
                    "{} {} {}",
                    prev_scope.column(t, repo_columns::OBJECT_ID),
                    t.eq,
                    t.qualified(alias, &format!("{}_{}", link.alias, near))
                )
            }
            None => {
                inner.append(node.table_reference(t, alias, physical)?);
                plan.on_clause(prev_scope, &outer_scope, t)
            }
        };

        let mut filters = Vec::new();
        if let Some(predicate) = node.render_predicate(self.cx, &inner_scope)? {
            filters.push(predicate);
        }
        if let Some(validity) = self.link_validity(node, link)? {
            filters.push(validity);
        }

        self.from.push_str(&format!(
            "\n{} ({} {} {} ",
            t.left_join,
            t.select,
            columns.join(", "),
            t.from
        ));
        self.from.append(inner);
        if !filters.is_empty() {
            self.from.push_str(&format!(" {} ", t.where_));
            self.from
                .append(SqlFragment::join(filters, &format!(" {} ", t.and)));
        }
        self.from
            .push_str(&format!(") {} {} {}", alias, t.on, on));
        Ok(outer_scope)
    }

    fn link_type_term(&self, link: &LinkJoin<'_>, link_scope: &TableScope) -> String {
        format!(
            "{} {} {}",
            link_scope.column(self.cx.tokens, &link.config.columns.link_type_id),
            self.cx.tokens.eq,
            link.link_type_id
        )
    }

    fn link_status_term(&self, link: &LinkJoin<'_>) -> Option<String> {
        link.config
            .status_filter(self.cx.tokens, &link.alias, self.cx.link_statuses)
    }

    /// Validity of the link row, from the link reference date of `holder`,
    /// the node the link is configured on
    fn link_validity(
        &self,
        holder: &QueryNode,
        link: Option<&LinkJoin<'_>>,
    ) -> Result<Option<SqlFragment>, CompileError> {
        let Some(link) = link else {
            return Ok(None);
        };
        if holder.is_history() {
            return Ok(None);
        }
        let columns = &link.config.columns;
        Criterion::validity(
            &columns.dt_insert,
            &columns.dt_delete,
            holder.link_reference_date(),
            link.left,
            self.cx.env.max_date,
        )
        .render_enclosed(self.cx, &TableScope::uniform(link.alias.clone()))
    }

    /// Node predicate, then the validity of the link row the node holds,
    /// into the shared WHERE. The node's connector follows whichever part
    /// comes last.
    fn push_where(
        &mut self,
        node: &QueryNode,
        scope: &TableScope,
        link: Option<&LinkJoin<'_>>,
    ) -> Result<(), CompileError> {
        let mut parts = Vec::new();
        if let Some(predicate) = node.render_predicate(self.cx, scope)? {
            parts.push(predicate);
        }
        if let Some(validity) = self.link_validity(node, link)? {
            parts.push(validity);
        }
        let last = parts.len().saturating_sub(1);
        for (i, part) in parts.into_iter().enumerate() {
            let connector = if i == last {
                node.connector()
            } else {
                LogicOp::And
            };
            self.where_parts.push((part, connector));
        }
        Ok(())
    }

    fn project(
        &mut self,
        node: &QueryNode,
        scope: &TableScope,
        link: Option<&LinkJoin<'_>>,
    ) -> Result<(), CompileError> {
        let t = self.cx.tokens;
        self.columns.extend(node.projection(
            t,
            self.cx.env.geometry.as_ref(),
            scope,
            self.cx.mode.include_geometry,
        )?);
        if let Some(link) = link.filter(|_| node.projects_link_columns()) {
            // derived tables already expose the link columns under their prefixed names
            let isolated = node.join_kind() == JoinKind::Left
                && self.graph.mode().isolates_left_joins();
            for col in link.config.columns.all() {
                let item = if isolated {
                    let exposed = format!("{}_{}", link.alias, col);
                    format!(
                        "{} {} {}",
                        t.qualified(&scope.alias, &exposed),
                        t.as_,
                        t.quote(&exposed)
                    )
                } else {
                    t.projected(&link.alias, col, &link.alias)
                };
                self.columns.push(item);
            }
        }
        Ok(())
    }

    fn finish(self) -> CompiledQuery {
        let t = self.cx.tokens;
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut query = SqlFragment::text(format!("{} {}\n{} ", t.select, columns, t.from));
        query.append(self.from);

        if !self.where_parts.is_empty() {
            query.push_str(&format!("\n{} ", t.where_));
            query.append(join_with_connectors(self.cx, self.where_parts));
        }
        if !self.order_by.is_empty() {
            query.push_str(&format!("\n{} {}", t.order_by, self.order_by.join(", ")));
        }
        CompiledQuery {
            sql: query.sql,
            params: query.params,
        }
    }
}
