//! Forward (chain) graphs: the link to node `i` lives on node `i - 1`

use super::*;
use crate::query_compiler::{
    BoundingBox, CompareOp, CompileError, CompileMode, Criterion, Dialect, JoinKind, LinkKind,
    LogicOp, Query, QueryGraph, QueryNode, SubQuery,
};
use chrono::NaiveDate;

fn farmer_animal(animal_join: JoinKind) -> QueryGraph {
    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(QueryNode::new(farmer()).with_link(LinkKind::Parent))
        .unwrap();
    graph
        .add_item(QueryNode::new(animal()).with_join(animal_join))
        .unwrap();
    graph
}

#[test]
fn test_single_node_default_validity() {
    let mut node = QueryNode::new(animal());
    let sql = node.compile().unwrap();
    assert!(sql.starts_with("SELECT t0.\"object_id\" AS \"t0_object_id\", "));
    assert!(sql.contains("\nFROM farm.v_animal t0\n"));
    assert!(sql.ends_with("\nWHERE (t0.\"dt_delete\" = ?)"));
    assert_eq!(node.param_values().unwrap(), vec![max_date()]);
}

#[test]
fn test_inner_and_left_validity_shapes() {
    let compiled = farmer_animal(JoinKind::Left)
        .compile_query(CompileMode::default())
        .unwrap();
    assert_parity(&compiled);
    assert!(compiled
        .sql
        .contains("\nLEFT JOIN farm.v_animal t1 ON t1.\"parent_id\" = t0.\"object_id\""));
    assert_eq!(
        where_clause(&compiled.sql),
        "(t0.\"dt_delete\" = ?) AND (t1.\"dt_delete\" = ? OR t1.\"dt_delete\" IS NULL)"
    );
    assert_eq!(compiled.params, vec![max_date(), max_date()]);
}

// Each table gets its own validity term, so an animal joined to its farmer
// binds the max date once for t0 and once for t1.
#[test]
fn test_animal_child_of_farmer_binds_max_date_per_table() {
    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(QueryNode::new(animal()).with_link(LinkKind::Child))
        .unwrap();
    graph.add_item(QueryNode::new(farmer())).unwrap();

    let sql = graph.compile().unwrap();
    assert!(sql.contains(
        "\nFROM farm.v_animal t0\nINNER JOIN farm.v_farmer t1 ON t1.\"object_id\" = t0.\"parent_id\""
    ));
    for alias in ["t0", "t1"] {
        let term = format!("({}.\"dt_delete\" = ?)", alias);
        assert_eq!(where_clause(&sql).matches(&term).count(), 1);
    }
    let params = graph.param_values().unwrap();
    assert_eq!(sql.matches('?').count(), params.len());
    assert!(params.iter().all(|p| *p == max_date()));
}

#[test]
fn test_node_connector_without_predicate() {
    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(
            QueryNode::new(farmer())
                .with_link(LinkKind::Parent)
                .with_connector(LogicOp::Or),
        )
        .unwrap();
    graph.add_item(QueryNode::new(animal())).unwrap();
    let sql = graph.compile().unwrap();
    assert_eq!(
        where_clause(&sql),
        "(t0.\"dt_delete\" = ?) OR (t1.\"dt_delete\" = ?)"
    );
}

#[test]
fn test_node_connector_overrides_predicate_connector() {
    let node = QueryNode::new(farmer())
        .with_predicate(Criterion::eq("name", "Ada").connected_by(LogicOp::Or))
        .with_connector(LogicOp::And);
    assert_eq!(node.connector(), LogicOp::And);
    let mut cleared = node.clone();
    cleared.set_connector(None);
    assert_eq!(cleared.connector(), LogicOp::Or);
}

#[test]
fn test_reference_date_uses_between() {
    let date = NaiveDate::from_ymd_opt(2020, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut node = QueryNode::new(farmer()).with_reference_date(date);
    let sql = node.compile().unwrap();
    assert!(sql.ends_with("WHERE (? BETWEEN t0.\"dt_insert\" AND t0.\"dt_delete\")"));
    assert_eq!(node.param_values().unwrap(), vec![Param::Date(date)]);

    // clearing the date falls back to the sentinel
    node.set_reference_date(None);
    assert!(node.compile().unwrap().ends_with("WHERE (t0.\"dt_delete\" = ?)"));
}

#[test]
fn test_history_mode_drops_validity() {
    let mut node = QueryNode::new(farmer()).with_history(true);
    let sql = node.compile().unwrap();
    assert!(!sql.contains("WHERE"));
    assert!(node.param_values().unwrap().is_empty());
}

#[test]
fn test_user_predicate_follows_validity() {
    let predicate = Criterion::any(vec![
        Criterion::eq("breed", "angus"),
        Criterion::compare("weight", CompareOp::GtEq, 400.0),
    ]);
    let mut node = QueryNode::new(animal()).with_predicate(predicate);
    let sql = node.compile().unwrap();
    assert!(sql.ends_with(
        "WHERE (t0.\"dt_delete\" = ? AND (t0.\"breed\" = ? OR t0.\"weight\" >= ?))"
    ));
    assert_eq!(
        node.param_values().unwrap(),
        vec![max_date(), Param::from("angus"), Param::Float(400.0)]
    );
}

#[test]
fn test_node_connectors_join_where_parts() {
    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(
            QueryNode::new(farmer())
                .with_link(LinkKind::Parent)
                .with_history(true)
                .with_predicate(Criterion::eq("name", "Ada").connected_by(LogicOp::Or)),
        )
        .unwrap();
    graph
        .add_item(
            QueryNode::new(animal())
                .with_history(true)
                .with_predicate(Criterion::eq("breed", "angus")),
        )
        .unwrap();
    let compiled = graph.compile_query(CompileMode::default()).unwrap();
    assert_parity(&compiled);
    assert_eq!(
        where_clause(&compiled.sql),
        "(t0.\"name\" = ?) OR (t1.\"breed\" = ?)"
    );
}

#[test]
fn test_custom_arity_mismatch_emits_nothing() {
    let err = LinkKind::custom(vec!["a".to_string()], vec![]).unwrap_err();
    assert!(matches!(err, CompileError::JoinConfigurationError(_)));

    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(QueryNode::new(farmer()).with_link(LinkKind::Custom {
            left: vec!["object_id".to_string(), "name".to_string()],
            right: vec!["parent_id".to_string()],
        }))
        .unwrap();
    graph.add_item(QueryNode::new(animal())).unwrap();
    assert!(matches!(
        graph.compile(),
        Err(CompileError::JoinConfigurationError(_))
    ));
}

#[test]
fn test_denormalized_joins() {
    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(QueryNode::new(farmer()).with_link(LinkKind::Denormalized {
            field: "farmer_ref".to_string(),
        }))
        .unwrap();
    graph
        .add_item(QueryNode::new(animal()).with_link(LinkKind::DenormalizedFull {
            left_field: "breed".to_string(),
            right_field: "code".to_string(),
        }))
        .unwrap();
    graph
        .add_item(QueryNode::new(tag()).with_link(LinkKind::DenormalizedReverse {
            field: "code".to_string(),
        }))
        .unwrap();
    graph.add_item(QueryNode::new(farmer())).unwrap();

    let compiled = graph.compile_query(CompileMode::default()).unwrap();
    assert_parity(&compiled);
    let sql = &compiled.sql;
    assert!(sql.contains("INNER JOIN farm.v_animal t1 ON t0.\"object_id\" = t1.\"farmer_ref\""));
    assert!(sql.contains("INNER JOIN farm.v_tag t2 ON t1.\"breed\" = t2.\"code\""));
    assert!(sql.contains("INNER JOIN farm.v_farmer t3 ON t2.\"code\" = t3.\"object_id\""));
    assert_eq!(compiled.params.len(), 4);
}

#[test]
fn test_free_text_join_used_verbatim() {
    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(
            QueryNode::new(farmer())
                .with_link(LinkKind::CustomFreeText("t1.parent_id = t0.object_id".to_string())),
        )
        .unwrap();
    graph.add_item(QueryNode::new(animal())).unwrap();
    let sql = graph.compile().unwrap();
    assert!(sql.contains("INNER JOIN farm.v_animal t1 ON t1.parent_id = t0.object_id"));
}

#[test]
fn test_missing_link_is_a_join_error() {
    let mut graph = QueryGraph::forward(env());
    graph.add_item(QueryNode::new(farmer())).unwrap();
    graph.add_item(QueryNode::new(animal())).unwrap();
    assert!(matches!(
        graph.compile(),
        Err(CompileError::JoinConfigurationError(_))
    ));
}

#[test]
fn test_missing_descriptor_fails() {
    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(QueryNode::new(farmer()).with_link(LinkKind::Parent))
        .unwrap();
    graph
        .add_item(QueryNode::unbound().with_alias("pending"))
        .unwrap();
    assert_eq!(
        graph.compile().unwrap_err(),
        CompileError::MissingTableDescriptor {
            alias: "pending".to_string()
        }
    );
}

#[test]
fn test_empty_graph_fails() {
    let mut graph = QueryGraph::forward(env());
    assert!(matches!(
        graph.compile(),
        Err(CompileError::InvalidGraphMode(_))
    ));
}

#[test]
fn test_unresolved_keyword_fails_before_any_sql() {
    let dialect = Dialect::default().without("between");
    let env = Arc::new(CompileEnv::new(
        dialect,
        default_max_date(),
        Arc::new(crate::query_compiler::OgcGeometrySql::default()),
    ));
    let mut graph = QueryGraph::forward(env);
    graph.add_item(QueryNode::new(farmer())).unwrap();
    assert_eq!(
        graph.compile().unwrap_err(),
        CompileError::UnresolvedKeyword("between".to_string())
    );
}

#[test]
fn test_dialect_overrides_quotes() {
    let overrides = [("quote_open", "`"), ("quote_close", "`")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let env = Arc::new(CompileEnv::new(
        Dialect::with_overrides(overrides),
        default_max_date(),
        Arc::new(crate::query_compiler::OgcGeometrySql::default()),
    ));
    let compiled = QueryNode::new(farmer())
        .compile_in(env, CompileMode::default())
        .unwrap();
    assert!(compiled.sql.contains("t0.`name` AS `t0_name`"));
    assert!(compiled.sql.ends_with("WHERE (t0.`dt_delete` = ?)"));
}

#[test]
fn test_physical_mode_joins_repository() {
    let mut graph = farmer_animal(JoinKind::Inner);
    let sql = graph.compile_ex(true, false).unwrap();
    assert!(sql.contains(
        "\nFROM (farm.repository rt0 INNER JOIN farm.farmer t0 ON rt0.\"pkid\" = t0.\"pkid\")"
    ));
    assert!(sql.contains(
        "\nINNER JOIN (farm.repository rt1 INNER JOIN farm.animal t1 ON rt1.\"pkid\" = t1.\"pkid\") \
         ON rt1.\"parent_id\" = rt0.\"object_id\""
    ));
    assert!(select_list(&sql).contains("rt0.\"object_id\" AS \"t0_object_id\""));
    assert!(select_list(&sql).contains("t1.\"breed\" AS \"t1_breed\""));
    assert_eq!(
        where_clause(&sql),
        "(rt0.\"dt_delete\" = ?) AND (rt1.\"dt_delete\" = ?)"
    );
    // param_values replays the physical mode
    assert_eq!(graph.param_values().unwrap().len(), 2);
}

#[test]
fn test_geometry_projection_toggle() {
    let mut node = QueryNode::new(animal());
    let plain = node.compile_ex(false, false).unwrap();
    assert!(!plain.contains("pasture"));
    let with_geometry = node.compile_ex(false, true).unwrap();
    assert!(with_geometry.contains("ST_AsText(t0.\"pasture\") AS \"t0_pasture\""));
}

#[test]
fn test_bbox_and_in_list_params_in_text_order() {
    let predicate = Criterion::all(vec![
        Criterion::bbox(
            "pasture",
            BoundingBox {
                min_x: 1.0,
                min_y: 2.0,
                max_x: 3.0,
                max_y: 4.0,
            },
        ),
        Criterion::in_list("breed", vec![Param::from("angus"), Param::from("hereford")]),
        Criterion::in_list("farmer_ref", vec![]),
    ]);
    let mut node = QueryNode::new(animal()).with_predicate(predicate);
    let sql = node.compile().unwrap();
    assert!(sql.contains("ST_Intersects(t0.\"pasture\", ST_MakeEnvelope(?, ?, ?, ?))"));
    assert!(sql.contains("t0.\"breed\" IN (?, ?)"));
    assert!(sql.contains("1 = 0"));
    assert_eq!(
        node.param_values().unwrap(),
        vec![
            max_date(),
            Param::Float(1.0),
            Param::Float(2.0),
            Param::Float(3.0),
            Param::Float(4.0),
            Param::from("angus"),
            Param::from("hereford"),
        ]
    );
}

#[test]
fn test_in_subquery_nests_node() {
    let inner = QueryNode::new(animal())
        .with_fields(vec!["parent_id".to_string()])
        .with_predicate(Criterion::eq("breed", "angus"));
    let mut node =
        QueryNode::new(farmer()).with_predicate(Criterion::in_subquery("object_id", inner));
    let sql = node.compile().unwrap();
    assert!(sql.contains(
        "t0.\"object_id\" IN (SELECT t0_sq.\"parent_id\" FROM farm.v_animal t0_sq \
         WHERE (t0_sq.\"dt_delete\" = ? AND t0_sq.\"breed\" = ?))"
    ));
    assert_eq!(
        node.param_values().unwrap(),
        vec![max_date(), max_date(), Param::from("angus")]
    );
}

#[test]
fn test_sub_query_params_precede_where_params() {
    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(QueryNode::new(farmer()).with_link(LinkKind::Denormalized {
            field: "farmer_ref".to_string(),
        }))
        .unwrap();
    graph
        .add_item(QueryNode::from_sub_query(SubQuery::new(
            "SELECT farmer_ref, count(*) AS herd FROM farm.v_animal WHERE weight > ? GROUP BY farmer_ref",
            vec!["farmer_ref".to_string(), "herd".to_string()],
            vec![Param::Float(100.0)],
        )))
        .unwrap();

    let compiled = graph.compile_query(CompileMode::default()).unwrap();
    assert_parity(&compiled);
    assert!(compiled.sql.contains("GROUP BY farmer_ref) t1 ON t0.\"object_id\" = t1.\"farmer_ref\""));
    assert!(select_list(&compiled.sql).contains("t1.\"herd\" AS \"t1_herd\""));
    assert_eq!(compiled.params, vec![Param::Float(100.0), max_date()]);
}

#[test]
fn test_order_by_accumulates_per_node() {
    let mut graph = QueryGraph::forward(env());
    graph
        .add_item(
            QueryNode::new(farmer())
                .with_link(LinkKind::Parent)
                .order_by("name", false),
        )
        .unwrap();
    graph
        .add_item(QueryNode::new(animal()).order_by("weight", true))
        .unwrap();
    let sql = graph.compile().unwrap();
    assert!(sql.ends_with("\nORDER BY t0.\"name\" ASC, t1.\"weight\" DESC"));
}

#[test]
fn test_legacy_return_type_pins_projection() {
    let mut graph = farmer_animal(JoinKind::Inner);
    graph.set_legacy_return_type(Some(2));
    let sql = graph.compile().unwrap();
    let select = select_list(&sql);
    assert!(select.contains("\"t1_breed\""));
    assert!(!select.contains("\"t0_"));
    assert_eq!(graph.return_type().unwrap().name, "ANIMAL");

    // no match: silently projects everything
    graph.set_legacy_return_type(Some(42));
    let sql = graph.compile().unwrap();
    assert!(select_list(&sql).contains("\"t0_name\""));
    assert_eq!(graph.return_types().len(), 2);
}

#[test]
fn test_negated_criterion_spacing() {
    let mut node = QueryNode::new(farmer())
        .with_history(true)
        .with_predicate(Criterion::eq("name", "Ada").negate());
    let sql = node.compile().unwrap();
    assert!(sql.ends_with("WHERE (NOT (t0.\"name\" = ?))"));
}

#[test]
fn test_mutation_after_compile_is_picked_up() {
    let mut graph = farmer_animal(JoinKind::Inner);
    let before = graph.compile().unwrap();
    assert!(!before.contains("IS NULL"));

    graph.node_mut(1).unwrap().set_join_kind(JoinKind::Left);
    let after = graph.compile().unwrap();
    assert!(after.contains("LEFT JOIN farm.v_animal t1"));
    assert!(after.contains("(t1.\"dt_delete\" = ? OR t1.\"dt_delete\" IS NULL)"));
    assert_eq!(graph.param_values().unwrap().len(), 2);
}
