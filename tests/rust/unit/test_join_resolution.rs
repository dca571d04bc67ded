//! Join resolution through the public `Query` API

use super::{animal, assert_parity, farmer};
use repoquery::query_compiler::{
    BoundingBox, CompileEnv, CompileMode, Criterion, JoinKind, LinkKind, Param, Query, QueryGraph,
    QueryNode,
};
use test_case::test_case;

fn chain(link: LinkKind, join: JoinKind) -> QueryGraph {
    let mut graph = QueryGraph::forward(CompileEnv::shared_default());
    graph
        .add_item(QueryNode::new(farmer()).with_link(link))
        .unwrap();
    graph
        .add_item(QueryNode::new(animal()).with_join(join))
        .unwrap();
    graph
}

#[test_case(LinkKind::Child, "t1.\"object_id\" = t0.\"parent_id\"" ; "child")]
#[test_case(LinkKind::Parent, "t1.\"parent_id\" = t0.\"object_id\"" ; "parent")]
#[test_case(
    LinkKind::Denormalized { field: "owner_ref".to_string() },
    "t0.\"object_id\" = t1.\"owner_ref\"" ; "denormalized"
)]
#[test_case(
    LinkKind::DenormalizedReverse { field: "herd_ref".to_string() },
    "t0.\"herd_ref\" = t1.\"object_id\"" ; "denormalized reverse"
)]
#[test_case(
    LinkKind::DenormalizedFull { left_field: "farm_code".to_string(), right_field: "farm_code".to_string() },
    "t0.\"farm_code\" = t1.\"farm_code\"" ; "denormalized full"
)]
#[test_case(
    LinkKind::CustomFreeText("t0.\"object_id\" = t1.\"owner_ref\" + 0".to_string()),
    "t0.\"object_id\" = t1.\"owner_ref\" + 0" ; "free text"
)]
fn test_on_clause_per_link_kind(link: LinkKind, expected_on: &str) {
    let mut graph = chain(link, JoinKind::Inner);
    let sql = graph.compile().unwrap();
    assert!(
        sql.contains(&format!("\nINNER JOIN farm.v_animal t1 ON {}", expected_on)),
        "unexpected join in:\n{}",
        sql
    );
}

#[test]
fn test_custom_link_pairs_columns_in_order() {
    let link = LinkKind::custom(
        vec!["object_id".to_string(), "farm_code".to_string()],
        vec!["owner_ref".to_string(), "farm_code".to_string()],
    )
    .unwrap();
    let sql = chain(link, JoinKind::Inner).compile().unwrap();
    assert!(sql.contains(
        "ON t0.\"object_id\" = t1.\"owner_ref\" AND t0.\"farm_code\" = t1.\"farm_code\""
    ));
}

#[test_case(JoinKind::Inner, "INNER JOIN" ; "inner")]
#[test_case(JoinKind::Left, "LEFT JOIN" ; "left")]
fn test_join_keyword_comes_from_joined_node(join: JoinKind, keyword: &str) {
    let sql = chain(LinkKind::Parent, join).compile().unwrap();
    assert!(sql.contains(&format!("\n{} farm.v_animal t1", keyword)));
}

#[test]
fn test_compile_and_param_values_agree_with_compile_query() {
    let mut graph = chain(LinkKind::Parent, JoinKind::Inner);
    graph
        .node_mut(1)
        .unwrap()
        .set_predicate(Some(Criterion::bbox(
            "pasture",
            BoundingBox {
                min_x: 1.0,
                min_y: 2.0,
                max_x: 3.0,
                max_y: 4.0,
            },
        )));

    let sql = graph.compile_ex(true, true).unwrap();
    let params = graph.param_values().unwrap();
    let compiled = graph.compile_query(CompileMode::new(true, true)).unwrap();
    assert_eq!(sql, compiled.sql);
    assert_eq!(params, compiled.params);
    assert_parity(&compiled);

    assert!(sql.contains("(farm.repository rt1 INNER JOIN farm.animal t1 ON rt1.\"pkid\" = t1.\"pkid\")"));
    assert!(sql.contains("ST_AsText(t1.\"pasture\") AS \"t1_pasture\""));
    assert!(sql.contains("ST_Intersects(t1.\"pasture\", ST_MakeEnvelope(?, ?, ?, ?))"));
    assert_eq!(&params[2..], &[
        Param::Float(1.0),
        Param::Float(2.0),
        Param::Float(3.0),
        Param::Float(4.0)
    ]);
}

#[test]
fn test_compiled_query_serializes_to_json() {
    let compiled = chain(LinkKind::Parent, JoinKind::Inner)
        .compile_query(CompileMode::default())
        .unwrap();
    let value = serde_json::to_value(&compiled).unwrap();
    assert_eq!(value["sql"], serde_json::json!(compiled.sql));
    assert_eq!(value["params"][0], serde_json::json!("9999-12-31T23:59:59"));
    assert_eq!(value["params"].as_array().unwrap().len(), compiled.params.len());
}
