use crate::query_compiler::{
    BoundingBox, CompareOp, JoinKind, LogicOp, Param, SortField,
};
use serde::{Deserialize, Serialize};

/// A query as written in YAML.
///
/// Exactly one of `nodes` (forward chain) or `root` (reverse tree) is set.
///
/// ```yaml
/// return_type: ANIMAL
/// nodes:
///   - table: SUPPORT_CLAIM
///     link: { kind: db_link_reverse, link_type: SUPPORTS }
///     where:
///       - { kind: compare, field: amount, op: gt, value: 100.0 }
///   - table: ANIMAL
///     join: left
///     order_by:
///       - { field: breed }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<NodeDef>,
    /// Legacy single return type, by table name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    /// Table name as registered in the catalog
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub object_type_id: Option<i64>,
    #[serde(default)]
    pub sub_query: Option<SubQueryDef>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub join: JoinKind,
    /// Forward: link to the next node. Reverse: link to the parent.
    #[serde(default)]
    pub link: Option<LinkDef>,
    #[serde(default, rename = "where")]
    pub criteria: Vec<CriterionDef>,
    /// Connects this node's WHERE part to the next node's
    #[serde(default)]
    pub connector: LogicOp,
    /// `%Y-%m-%d %H:%M:%S`
    #[serde(default)]
    pub reference_date: Option<String>,
    #[serde(default)]
    pub link_reference_date: Option<String>,
    #[serde(default)]
    pub history: bool,
    #[serde(default)]
    pub order_by: Vec<SortField>,
    #[serde(default, rename = "return")]
    pub return_projection: bool,
    #[serde(default)]
    pub link_columns: bool,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub children: Vec<NodeDef>,
}

impl NodeDef {
    /// Name used in error messages
    pub fn label(&self) -> String {
        self.alias
            .clone()
            .or_else(|| self.table.clone())
            .or_else(|| self.object_type_id.map(|id| format!("#{}", id)))
            .unwrap_or_else(|| "<sub-query>".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQueryDef {
    pub sql: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkDef {
    Child,
    Parent,
    Custom {
        left: Vec<String>,
        right: Vec<String>,
    },
    FreeText {
        sql: String,
    },
    /// Link type by `link_type_id`, or by name resolved through the catalog
    DbLink {
        #[serde(default)]
        link_type: Option<String>,
        #[serde(default)]
        link_type_id: Option<i64>,
    },
    DbLinkReverse {
        #[serde(default)]
        link_type: Option<String>,
        #[serde(default)]
        link_type_id: Option<i64>,
    },
    Denormalized {
        field: String,
    },
    DenormalizedReverse {
        field: String,
    },
    DenormalizedFull {
        left_field: String,
        right_field: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionDef {
    #[serde(flatten)]
    pub condition: ConditionDef,
    #[serde(default)]
    pub not: bool,
    /// Connector to the next sibling
    #[serde(default)]
    pub connector: LogicOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionDef {
    /// `field op value`, or `field op other_field`
    Compare {
        field: String,
        op: CompareOp,
        #[serde(default)]
        value: Option<Param>,
        #[serde(default)]
        other_field: Option<String>,
    },
    IsNull {
        field: String,
    },
    Between {
        field: String,
        low: Param,
        high: Param,
    },
    ValueBetween {
        value: Param,
        low_field: String,
        high_field: String,
    },
    Bbox {
        field: String,
        bbox: BoundingBox,
    },
    InList {
        field: String,
        values: Vec<Param>,
    },
    InSubquery {
        field: String,
        query: Box<NodeDef>,
    },
    DbLink {
        link_type_id: i64,
        #[serde(default)]
        related_ids: Vec<i64>,
    },
    DbLinkReverse {
        link_type_id: i64,
        #[serde(default)]
        related_ids: Vec<i64>,
    },
    FreeText {
        sql: String,
        #[serde(default)]
        params: Vec<Param>,
    },
    All {
        members: Vec<CriterionDef>,
    },
    Any {
        members: Vec<CriterionDef>,
    },
    /// Members keep their own connectors
    Group {
        members: Vec<CriterionDef>,
    },
}
