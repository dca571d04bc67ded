//! Turns a [`QueryDefinition`] into a [`QueryGraph`]
//!
//! Every table, field list and named link type is resolved through the
//! [`Catalog`] here, before compilation. The graph that comes out holds
//! resolved descriptors only.

use super::errors::DefinitionError;
use super::model::{ConditionDef, CriterionDef, LinkDef, NodeDef, QueryDefinition};
use crate::catalog::Catalog;
use crate::config::{CompilerConfig, DATE_FORMAT};
use crate::query_compiler::{
    CompileEnv, Criterion, LinkKind, NodeId, QueryGraph, QueryNode, SubQuery,
};
use chrono::NaiveDateTime;
use log::debug;
use std::path::Path;
use std::sync::Arc;

impl QueryDefinition {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DefinitionError> {
        serde_yaml::from_str(yaml).map_err(|e| DefinitionError::ParseError {
            error: e.to_string(),
        })
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, DefinitionError> {
        let content = std::fs::read_to_string(path).map_err(|e| DefinitionError::ReadError {
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Resolve against `catalog` and assemble the graph. Link settings come
    /// from `config`.
    pub fn build(
        &self,
        catalog: &dyn Catalog,
        config: &CompilerConfig,
        env: Arc<CompileEnv>,
    ) -> Result<QueryGraph, DefinitionError> {
        let builder = GraphBuilder { catalog };
        let mut graph = match (&self.root, self.nodes.is_empty()) {
            (Some(root), true) => builder.reverse(root, config, env)?,
            (None, false) => builder.forward(&self.nodes, config, env)?,
            (Some(_), false) => {
                return Err(DefinitionError::Invalid {
                    message: "a definition has either `nodes` or `root`, not both".to_string(),
                })
            }
            (None, true) => {
                return Err(DefinitionError::Invalid {
                    message: "a definition needs `nodes` or `root`".to_string(),
                })
            }
        };

        if let Some(name) = &self.return_type {
            let table = catalog.resolve_table_by_name(name)?;
            graph.set_legacy_return_type(Some(table.object_type_id));
        }
        debug!(
            "Built {:?} graph with {} node(s) from definition",
            graph.mode(),
            graph.len()
        );
        Ok(graph)
    }
}

struct GraphBuilder<'a> {
    catalog: &'a dyn Catalog,
}

impl GraphBuilder<'_> {
    fn forward(
        &self,
        defs: &[NodeDef],
        config: &CompilerConfig,
        env: Arc<CompileEnv>,
    ) -> Result<QueryGraph, DefinitionError> {
        let mut nodes = defs
            .iter()
            .map(|def| self.node(def))
            .collect::<Result<Vec<_>, _>>()?;

        for (i, def) in defs.iter().enumerate() {
            if !def.children.is_empty() {
                return Err(DefinitionError::invalid_with_context(
                    "`children` is only allowed below `root`",
                    &def.label(),
                ));
            }
            let Some(link) = &def.link else {
                continue;
            };
            match nodes.get(i + 1) {
                Some(next) => {
                    let kind = self.link(link, &nodes[i], next, def)?;
                    nodes[i].set_link(Some(kind));
                }
                None => debug!("Link on last node `{}` has no partner, ignored", def.label()),
            }
        }

        let mut graph = config.forward_graph(env);
        for node in nodes {
            graph.add_item(node)?;
        }
        Ok(graph)
    }

    fn reverse(
        &self,
        root: &NodeDef,
        config: &CompilerConfig,
        env: Arc<CompileEnv>,
    ) -> Result<QueryGraph, DefinitionError> {
        if root.link.is_some() {
            debug!("Link on root `{}` has no parent, ignored", root.label());
        }
        let mut graph = config.reverse_graph(env, self.node(root)?);
        self.children(&mut graph, 0, root)?;
        Ok(graph)
    }

    fn children(
        &self,
        graph: &mut QueryGraph,
        parent: NodeId,
        parent_def: &NodeDef,
    ) -> Result<(), DefinitionError> {
        for def in &parent_def.children {
            let mut child = self.node(def)?;
            if let Some(link) = &def.link {
                let kind = self.link(link, graph.node(parent)?, &child, def)?;
                child.set_link(Some(kind));
            }
            let id = graph.add_child(parent, child)?;
            self.children(graph, id, def)?;
        }
        Ok(())
    }

    /// Node with everything but its link
    fn node(&self, def: &NodeDef) -> Result<QueryNode, DefinitionError> {
        let mut node = match (&def.table, def.object_type_id, &def.sub_query) {
            (Some(name), None, None) => QueryNode::new(self.catalog.resolve_table_by_name(name)?),
            (None, Some(id), None) => QueryNode::new(self.catalog.resolve_table(id)?),
            (None, None, Some(sub)) => QueryNode::from_sub_query(SubQuery::new(
                sub.sql.clone(),
                sub.fields.clone(),
                sub.params.clone(),
            )),
            _ => {
                return Err(DefinitionError::invalid_with_context(
                    "set exactly one of `table`, `object_type_id` or `sub_query`",
                    &def.label(),
                ))
            }
        };

        if let Some(fields) = &def.fields {
            self.check_fields(&node, fields, def)?;
            node.set_fields(Some(fields.clone()));
        }
        node.set_alias(def.alias.clone());
        node.set_join_kind(def.join);
        node.set_history(def.history);
        node.set_reference_date(parse_date("reference_date", def.reference_date.as_deref())?);
        node.set_link_reference_date(parse_date(
            "link_reference_date",
            def.link_reference_date.as_deref(),
        )?);
        node.set_return_projection(def.return_projection);
        node.set_project_link_columns(def.link_columns);
        for sort in &def.order_by {
            node.add_sort_field(sort.clone());
        }

        let mut criteria = self.criteria(&def.criteria)?;
        let predicate = match criteria.len() {
            0 => None,
            1 => criteria.pop(),
            _ => Some(Criterion::group(criteria)),
        };
        node.set_predicate(predicate.map(|p| p.connected_by(def.connector)));
        node.set_connector(Some(def.connector));
        Ok(node)
    }

    /// Custom field lists must name columns the catalog knows
    fn check_fields(
        &self,
        node: &QueryNode,
        fields: &[String],
        def: &NodeDef,
    ) -> Result<(), DefinitionError> {
        let Some(type_id) = node.object_type_id() else {
            return Ok(());
        };
        let known = self.catalog.resolve_fields(type_id)?;
        match fields
            .iter()
            .find(|name| !known.iter().any(|f| &f.name == *name))
        {
            Some(unknown) => Err(DefinitionError::invalid_with_context(
                format!("unknown field `{}`", unknown),
                &def.label(),
            )),
            None => Ok(()),
        }
    }

    fn link(
        &self,
        def: &LinkDef,
        prev: &QueryNode,
        next: &QueryNode,
        node_def: &NodeDef,
    ) -> Result<LinkKind, DefinitionError> {
        let kind = match def {
            LinkDef::Child => LinkKind::Child,
            LinkDef::Parent => LinkKind::Parent,
            LinkDef::Custom { left, right } => LinkKind::custom(left.clone(), right.clone())?,
            LinkDef::FreeText { sql } => LinkKind::CustomFreeText(sql.clone()),
            LinkDef::DbLink {
                link_type,
                link_type_id,
            } => LinkKind::DbLink {
                link_type_id: self.link_type_id(link_type, *link_type_id, prev, next, node_def)?,
            },
            LinkDef::DbLinkReverse {
                link_type,
                link_type_id,
            } => LinkKind::DbLinkReverse {
                link_type_id: self.link_type_id(link_type, *link_type_id, prev, next, node_def)?,
            },
            LinkDef::Denormalized { field } => LinkKind::Denormalized {
                field: field.clone(),
            },
            LinkDef::DenormalizedReverse { field } => LinkKind::DenormalizedReverse {
                field: field.clone(),
            },
            LinkDef::DenormalizedFull {
                left_field,
                right_field,
            } => LinkKind::DenormalizedFull {
                left_field: left_field.clone(),
                right_field: right_field.clone(),
            },
        };
        Ok(kind)
    }

    /// An explicit id wins; a name is looked up between the two object types.
    /// Neither leaves the id unset, which compilation reports.
    fn link_type_id(
        &self,
        name: &Option<String>,
        id: Option<i64>,
        prev: &QueryNode,
        next: &QueryNode,
        node_def: &NodeDef,
    ) -> Result<Option<i64>, DefinitionError> {
        if id.is_some() {
            return Ok(id);
        }
        let Some(name) = name else {
            return Ok(None);
        };
        let (Some(type_a), Some(type_b)) = (prev.object_type_id(), next.object_type_id()) else {
            return Err(DefinitionError::invalid_with_context(
                format!("link type `{}` needs table nodes on both sides", name),
                &node_def.label(),
            ));
        };
        Ok(Some(self.catalog.resolve_link_type(name, type_a, type_b)?.id))
    }

    fn criteria(&self, defs: &[CriterionDef]) -> Result<Vec<Criterion>, DefinitionError> {
        defs.iter().map(|def| self.criterion(def)).collect()
    }

    fn criterion(&self, def: &CriterionDef) -> Result<Criterion, DefinitionError> {
        let criterion = match &def.condition {
            ConditionDef::Compare {
                field,
                op,
                value,
                other_field,
            } => match (value, other_field) {
                (Some(value), None) => Criterion::compare(field.clone(), *op, value.clone()),
                (None, Some(other)) => Criterion::compare_fields(field.clone(), *op, other.clone()),
                _ => {
                    return Err(DefinitionError::Invalid {
                        message: format!(
                            "comparison on `{}` needs exactly one of `value` or `other_field`",
                            field
                        ),
                    })
                }
            },
            ConditionDef::IsNull { field } => Criterion::is_null(field.clone()),
            ConditionDef::Between { field, low, high } => {
                Criterion::between(field.clone(), low.clone(), high.clone())
            }
            ConditionDef::ValueBetween {
                value,
                low_field,
                high_field,
            } => Criterion::value_between_fields(value.clone(), low_field.clone(), high_field.clone()),
            ConditionDef::Bbox { field, bbox } => Criterion::bbox(field.clone(), *bbox),
            ConditionDef::InList { field, values } => {
                Criterion::in_list(field.clone(), values.clone())
            }
            ConditionDef::InSubquery { field, query } => {
                Criterion::in_subquery(field.clone(), self.node(query)?)
            }
            ConditionDef::DbLink {
                link_type_id,
                related_ids,
            } => Criterion::db_link(*link_type_id, related_ids.clone()),
            ConditionDef::DbLinkReverse {
                link_type_id,
                related_ids,
            } => Criterion::db_link_reverse(*link_type_id, related_ids.clone()),
            ConditionDef::FreeText { sql, params } => {
                Criterion::free_text(sql.clone(), params.clone())
            }
            ConditionDef::All { members } => Criterion::all(self.criteria(members)?),
            ConditionDef::Any { members } => Criterion::any(self.criteria(members)?),
            ConditionDef::Group { members } => Criterion::group(self.criteria(members)?),
        };
        let criterion = if def.not {
            criterion.negate()
        } else {
            criterion
        };
        Ok(criterion.connected_by(def.connector))
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDateTime>, DefinitionError> {
    value
        .map(|v| {
            NaiveDateTime::parse_from_str(v, DATE_FORMAT).map_err(|_| {
                DefinitionError::InvalidDate {
                    field: field.to_string(),
                    value: v.to_string(),
                    expected: DATE_FORMAT.to_string(),
                }
            })
        })
        .transpose()
}
