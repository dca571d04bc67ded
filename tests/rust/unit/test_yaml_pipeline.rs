//! Catalog, config and query definition loaded from YAML files

use super::assert_parity;
use repoquery::catalog::CatalogError;
use repoquery::query_compiler::{CompileMode, Param};
use repoquery::{CompilerConfig, DefinitionError, QueryDefinition, StaticCatalog};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const CATALOG: &str = r#"
tables:
  - object_type_id: 1
    name: FARMER
    schema: farm
    table_name: farmer
    type_fields:
      - { name: pkid, type: integer }
      - { name: full_name }
  - object_type_id: 2
    name: ANIMAL
    schema: farm
    table_name: animal
    type_fields:
      - { name: pkid, type: integer }
      - { name: breed }
link_types:
  - { id: 12, name: OWNS, type_a: 1, type_b: 2 }
"#;

const CONFIG: &str = r#"
max_date: "2999-01-01 00:00:00"
link_table: { schema: core, table: link }
link_statuses: [VALID]
"#;

fn yaml_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

fn load(query: &str) -> (StaticCatalog, CompilerConfig, QueryDefinition) {
    let catalog = StaticCatalog::from_yaml_file(yaml_file(CATALOG).path()).unwrap();
    let config = CompilerConfig::from_yaml_file(yaml_file(CONFIG).path()).unwrap();
    let definition = QueryDefinition::from_yaml_file(yaml_file(query).path()).unwrap();
    (catalog, config, definition)
}

fn config_max_date(config: &CompilerConfig) -> Param {
    Param::Date(config.parsed_max_date().unwrap())
}

#[test]
fn test_forward_link_chain_from_files() {
    let (catalog, config, definition) = load(
        r#"
nodes:
  - table: FARMER
    link: { kind: db_link, link_type: OWNS }
  - table: ANIMAL
    where:
      - { kind: compare, field: breed, op: eq, value: angus }
"#,
    );
    let env = Arc::new(config.build_env().unwrap());
    let compiled = definition
        .build(&catalog, &config, env)
        .unwrap()
        .compile_query(CompileMode::default())
        .unwrap();
    assert_parity(&compiled);

    assert!(compiled.sql.contains(
        "\nINNER JOIN core.link lnkt1 ON t0.\"object_id\" = lnkt1.\"link_obj_id_1\" \
         AND lnkt1.\"link_type_id\" = 12 AND (lnkt1.\"status\" = 'VALID')\
         \nINNER JOIN farm.v_animal t1 ON lnkt1.\"link_obj_id_2\" = t1.\"object_id\""
    ));
    assert!(compiled.sql.ends_with(
        "\nWHERE (t0.\"dt_delete\" = ?) AND (lnkt1.\"dt_delete\" = ?) \
         AND (t1.\"dt_delete\" = ? AND t1.\"breed\" = ?)"
    ));

    let max = config_max_date(&config);
    assert_eq!(
        compiled.params,
        vec![max.clone(), max.clone(), max, Param::from("angus")]
    );
}

#[test]
fn test_link_type_resolution_is_undirected() {
    let (catalog, config, definition) = load(
        r#"
nodes:
  - table: ANIMAL
    link: { kind: db_link_reverse, link_type: OWNS }
  - table: FARMER
"#,
    );
    let env = Arc::new(config.build_env().unwrap());
    let compiled = definition
        .build(&catalog, &config, env)
        .unwrap()
        .compile_query(CompileMode::default())
        .unwrap();
    assert!(compiled.sql.contains(
        "ON t0.\"object_id\" = lnkt1.\"link_obj_id_2\" AND lnkt1.\"link_type_id\" = 12"
    ));
}

#[test]
fn test_unknown_link_type_is_reported() {
    let (catalog, config, definition) = load(
        r#"
nodes:
  - table: FARMER
    link: { kind: db_link, link_type: GRAZES }
  - table: ANIMAL
"#,
    );
    let env = Arc::new(config.build_env().unwrap());
    assert_eq!(
        definition.build(&catalog, &config, env).unwrap_err(),
        DefinitionError::Catalog(CatalogError::UnknownLinkType {
            name: "GRAZES".to_string(),
            type_a: 1,
            type_b: 2,
        })
    );
}

#[test]
fn test_reverse_tree_with_history_and_reference_date() {
    let (catalog, config, definition) = load(
        r#"
root:
  table: FARMER
  reference_date: "2021-06-01 12:00:00"
  children:
    - table: ANIMAL
      link: { kind: parent }
      history: true
"#,
    );
    let env = Arc::new(config.build_env().unwrap());
    let graph = definition.build(&catalog, &config, env).unwrap();
    let compiled = graph.compile_query(CompileMode::default()).unwrap();
    assert_parity(&compiled);
    assert!(compiled
        .sql
        .contains("\nINNER JOIN farm.v_animal t1 ON t1.\"parent_id\" = t0.\"object_id\""));
    assert!(compiled
        .sql
        .ends_with("\nWHERE (? BETWEEN t0.\"dt_insert\" AND t0.\"dt_delete\")"));
    assert_eq!(compiled.params.len(), 1);
    assert_eq!(
        compiled.params[0].to_string(),
        "2021-06-01 12:00:00"
    );
}

#[test]
fn test_missing_query_file() {
    let err = QueryDefinition::from_yaml_file("/nonexistent/query.yaml").unwrap_err();
    assert!(matches!(err, DefinitionError::ReadError { .. }));
}

#[test]
fn test_duplicate_catalog_table() {
    let yaml = r#"
tables:
  - { object_type_id: 1, name: FARMER, schema: farm, table_name: farmer }
  - { object_type_id: 1, name: OWNER, schema: farm, table_name: owner }
"#;
    assert!(matches!(
        StaticCatalog::from_yaml_str(yaml),
        Err(CatalogError::Duplicate(_))
    ));
}
